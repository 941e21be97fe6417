use std::time::Duration;

use crate::cmd::{Cmd, Policy, Shell, Target};
use crate::error::{DeployError, DeployResult};
use crate::ssh::RemoteTarget;
use crate::stage::Outcome;

/// Issues one HTTP GET and reports the status code.
pub trait HttpProbe {
    fn get(&self, url: &str, timeout: Duration) -> Result<u16, String>;
}

/// Blocking `reqwest` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestProbe;

impl HttpProbe for ReqwestProbe {
    fn get(&self, url: &str, timeout: Duration) -> Result<u16, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| e.to_string())?;
        let response = client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}s", timeout.as_secs())
            } else {
                e.to_string()
            }
        })?;
        Ok(response.status().as_u16())
    }
}

#[must_use]
pub const fn is_success(status: u16) -> bool {
    matches!(status, 200..=299)
}

/// End-to-end reachability through nginx. The loopback check runs on
/// the host and is fatal. The external check runs from this machine
/// and only degrades the result, since firewalls outside the
/// deployment can block it on a healthy host.
pub struct HealthValidator<'a> {
    shell: Shell<'a>,
    target: &'a RemoteTarget,
    probe: &'a dyn HttpProbe,
    timeout: Duration,
}

impl<'a> HealthValidator<'a> {
    #[must_use]
    pub const fn new(
        shell: Shell<'a>,
        target: &'a RemoteTarget,
        probe: &'a dyn HttpProbe,
        timeout: Duration,
    ) -> Self {
        Self {
            shell,
            target,
            probe,
            timeout,
        }
    }

    /// Loopback first; the external probe only runs once it passed.
    pub fn validate(&self) -> DeployResult<Outcome> {
        self.check_loopback()?;
        Ok(self.check_external())
    }

    /// `curl` port 80 on the host itself, addressed with the public
    /// host name so nginx selects the application's site.
    pub fn check_loopback(&self) -> DeployResult<()> {
        let host_header = format!("Host: {}", self.target.host);
        let max_time = self.timeout.as_secs().max(1).to_string();
        let curl = Cmd::new("curl").args([
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--max-time",
            max_time.as_str(),
            "-H",
            host_header.as_str(),
            "http://127.0.0.1:80/",
        ]);

        let out = self
            .shell
            .run(Target::Remote(self.target), &curl, Policy::Probe)?;
        let status: Option<u16> = out.stdout.trim().parse().ok().filter(|s| *s != 0);

        match status {
            Some(code) if is_success(code) => {
                self.shell
                    .log()
                    .success(format!("Loopback check on {}: HTTP {code}", self.target.host));
                Ok(())
            }
            Some(code) => Err(DeployError::HealthCheckFailed(format!(
                "loopback request on {} returned HTTP {code}",
                self.target.host
            ))),
            None => Err(DeployError::HealthCheckFailed(format!(
                "loopback request on {} failed (curl exit {})",
                self.target.host, out.code
            ))),
        }
    }

    /// Request the public address from this machine. Never fatal.
    pub fn check_external(&self) -> Outcome {
        let url = format!("http://{}/", self.target.host);
        self.shell.log().info(format!("GET {url}"));

        match self.probe.get(&url, self.timeout) {
            Ok(code) if is_success(code) => {
                self.shell
                    .log()
                    .success(format!("External check {url}: HTTP {code}"));
                Outcome::Done
            }
            Ok(code) => self.soft_failure(format!("external check {url} returned HTTP {code}")),
            Err(reason) => self.soft_failure(format!("external check {url} failed: {reason}")),
        }
    }

    fn soft_failure(&self, reason: String) -> Outcome {
        self.shell.log().error(format!(
            "{reason} (the deployment itself passed the loopback check; \
             check firewall/NAT for port 80)"
        ));
        Outcome::Degraded(reason)
    }
}
