pub mod site;

use crate::cmd::{Cmd, Policy, Shell, Target, tail};
use crate::error::{DeployError, DeployResult};
use crate::identity::DeploymentIdentity;
use crate::provision::PackageFamily;
use crate::ssh::RemoteTarget;

pub use site::NginxSite;

/// Where site configurations live and where nginx picks them up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyLayout {
    pub available: &'static str,
    pub enabled: &'static str,
}

impl ProxyLayout {
    pub const DEBIAN: Self = Self {
        available: "/etc/nginx/sites-available",
        enabled: "/etc/nginx/sites-enabled",
    };

    /// Stock RedHat nginx has no sites-enabled but includes conf.d.
    pub const REDHAT: Self = Self {
        available: "/etc/nginx/sites-available",
        enabled: "/etc/nginx/conf.d",
    };

    #[must_use]
    pub const fn for_family(family: PackageFamily) -> Self {
        match family {
            PackageFamily::Debian => Self::DEBIAN,
            PackageFamily::RedHat => Self::REDHAT,
        }
    }

    #[must_use]
    pub fn config_path(&self, identity: &DeploymentIdentity) -> String {
        format!("{}/{}", self.available, identity.proxy_config)
    }

    #[must_use]
    pub fn link_path(&self, identity: &DeploymentIdentity) -> String {
        format!("{}/{}", self.enabled, identity.proxy_config)
    }
}

/// Installs and removes the nginx site of one deployment.
pub struct ProxyConfigurator<'a> {
    shell: Shell<'a>,
    target: &'a RemoteTarget,
    identity: &'a DeploymentIdentity,
}

impl<'a> ProxyConfigurator<'a> {
    #[must_use]
    pub const fn new(
        shell: Shell<'a>,
        target: &'a RemoteTarget,
        identity: &'a DeploymentIdentity,
    ) -> Self {
        Self {
            shell,
            target,
            identity,
        }
    }

    /// Write the site, enable it, and reload nginx only if the full
    /// configuration still passes `nginx -t`.
    pub fn install(&self, site: &NginxSite, layout: ProxyLayout) -> DeployResult<()> {
        let config_path = layout.config_path(self.identity);
        let link_path = layout.link_path(self.identity);

        self.shell.required(
            self.remote(),
            &Cmd::new("mkdir")
                .args(["-p", layout.available, layout.enabled])
                .sudo(),
        )?;

        self.shell
            .log()
            .info(format!("Writing nginx site {config_path}"));
        let write = Cmd::new("tee")
            .arg(config_path.as_str())
            .stdin(site.render())
            .sudo();
        self.shell.required(self.remote(), &write)?;

        if self.is_link(&link_path)? {
            self.shell
                .log()
                .info(format!("{link_path} already enabled"));
        } else {
            let link = Cmd::new("ln")
                .args(["-s", config_path.as_str(), link_path.as_str()])
                .sudo();
            self.shell.required(self.remote(), &link)?;
        }

        self.test_config()?;
        self.reload(Policy::Required)?;
        Ok(())
    }

    /// Remove the site and its link from both layouts. Nginx is
    /// reloaded only when the remaining configuration is valid; an
    /// invalid one is reported but does not fail the removal.
    pub fn remove(&self) -> DeployResult<()> {
        for layout in [ProxyLayout::DEBIAN, ProxyLayout::REDHAT] {
            let link_path = layout.link_path(self.identity);
            // Only ever delete our own symlink, never a regular file.
            if self.is_link(&link_path)? {
                self.shell.best_effort(
                    self.remote(),
                    &Cmd::new("rm").args(["-f", link_path.as_str()]).sudo(),
                )?;
            }
        }

        let config_path = ProxyLayout::DEBIAN.config_path(self.identity);
        self.shell.best_effort(
            self.remote(),
            &Cmd::new("rm").args(["-f", config_path.as_str()]).sudo(),
        )?;

        match self.test_config() {
            Ok(()) => {
                self.reload(Policy::BestEffort)?;
            }
            Err(DeployError::ProxyConfigInvalid(reason)) => {
                self.shell.log().warn(format!(
                    "nginx configuration invalid after removing {}; not reloading: {reason}",
                    self.identity.proxy_config
                ));
            }
            Err(other) => return Err(other),
        }
        Ok(())
    }

    pub fn test_config(&self) -> DeployResult<()> {
        let out = self.shell.run(
            self.remote(),
            &Cmd::new("nginx").arg("-t").sudo(),
            Policy::Probe,
        )?;
        if out.success() {
            return Ok(());
        }
        // nginx -t reports on stderr.
        let detail = tail(&out.stderr, 5);
        self.shell
            .log()
            .error(format!("nginx -t failed (exit {}): {detail}", out.code));
        Err(DeployError::ProxyConfigInvalid(detail))
    }

    fn reload(&self, policy: Policy) -> DeployResult<()> {
        let reload = Cmd::new("systemctl").args(["reload", "nginx"]).sudo();
        self.shell.run(self.remote(), &reload, policy)?;
        Ok(())
    }

    fn is_link(&self, path: &str) -> DeployResult<bool> {
        self.shell
            .check(self.remote(), &Cmd::new("test").args(["-L", path]))
    }

    const fn remote(&self) -> Target<'a> {
        Target::Remote(self.target)
    }
}
