use std::fmt::Write;

/// An nginx `server` block fronting one application.
///
/// # Example
///
/// ```
/// use dropship::proxy::NginxSite;
///
/// let site = NginxSite::new()
///     .server_name("203.0.113.7")
///     .reverse_proxy("127.0.0.1:3000")
///     .forward_headers();
///
/// assert_eq!(site.listen, 80);
/// assert!(site.render().contains("proxy_pass http://127.0.0.1:3000;"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxSite {
    pub listen: u16,
    pub server_names: Vec<String>,
    pub upstream: Option<String>,
    pub forward_headers: bool,
}

impl Default for NginxSite {
    fn default() -> Self {
        Self {
            listen: 80,
            server_names: Vec::new(),
            upstream: None,
            forward_headers: false,
        }
    }
}

impl NginxSite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_names.push(name.to_string());
        self
    }

    #[must_use]
    pub fn reverse_proxy(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    /// Pass the original host, client address, forwarding chain and
    /// scheme to the upstream.
    #[must_use]
    pub const fn forward_headers(mut self) -> Self {
        self.forward_headers = true;
        self
    }

    /// Site for an application listening on loopback `port`.
    #[must_use]
    pub fn for_app(host: &str, port: u16) -> Self {
        Self::new()
            .server_name(host)
            .reverse_proxy(format!("127.0.0.1:{port}"))
            .forward_headers()
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("server {\n");
        let _ = writeln!(out, "    listen {};", self.listen);
        if !self.server_names.is_empty() {
            let _ = writeln!(out, "    server_name {};", self.server_names.join(" "));
        }
        out.push('\n');
        out.push_str("    location / {\n");

        if let Some(upstream) = &self.upstream {
            let _ = writeln!(out, "        proxy_pass http://{upstream};");
        }
        if self.forward_headers {
            for (header, value) in [
                ("Host", "$host"),
                ("X-Real-IP", "$remote_addr"),
                ("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
                ("X-Forwarded-Proto", "$scheme"),
            ] {
                let _ = writeln!(out, "        proxy_set_header {header} {value};");
            }
        }

        out.push_str("    }\n}\n");
        out
    }
}
