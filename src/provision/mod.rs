pub mod package;

use serde::Deserialize;

use crate::cmd::{Cmd, CommandOutput, Policy, Shell, Target};
use crate::error::{DeployError, DeployResult};
use crate::ssh::RemoteTarget;

pub use package::{PackageFamily, PackageManager, Tool};

/// Versions of the tools found on the host once provisioning is
/// done. Logged, not otherwise used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub manager: PackageManager,
    pub docker: String,
    pub compose: String,
    pub nginx: String,
}

impl ProvisionReport {
    #[must_use]
    pub const fn family(&self) -> PackageFamily {
        self.manager.family()
    }
}

/// Brings the deployment host to a state where it can build and run
/// containers behind nginx. Every step checks before it acts, so
/// running it against a ready host changes nothing.
pub struct Provisioner<'a> {
    shell: Shell<'a>,
    target: &'a RemoteTarget,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub const fn new(shell: Shell<'a>, target: &'a RemoteTarget) -> Self {
        Self { shell, target }
    }

    pub fn run(&self) -> DeployResult<ProvisionReport> {
        let manager = self.detect_manager()?;
        self.install_missing(manager)?;
        self.ensure_docker_group()?;
        self.start_services()?;

        let report = self.report(manager);
        self.shell.log().info(format!(
            "Host ready: {} | docker {} | compose {} | nginx {}",
            report.manager, report.docker, report.compose, report.nginx
        ));
        Ok(report)
    }

    pub fn detect_manager(&self) -> DeployResult<PackageManager> {
        for manager in PackageManager::ALL {
            let probe = Cmd::new("command").args(["-v", manager.binary()]);
            if self.shell.check(self.remote(), &probe)? {
                self.shell
                    .log()
                    .info(format!("Package manager: {manager} ({:?})", manager.family()));
                return Ok(manager);
            }
        }

        let uname = self
            .shell
            .run(self.remote(), &Cmd::new("uname").arg("-sr"), Policy::Probe)?;
        Err(DeployError::UnsupportedPlatform(format!(
            "no apt-get, dnf or yum on {} ({})",
            self.target.host,
            uname.stdout.trim()
        )))
    }

    pub fn is_present(&self, tool: Tool) -> DeployResult<bool> {
        if self.shell.check(self.remote(), &tool.presence_check())? {
            return Ok(true);
        }
        match tool.alternate_check() {
            Some(alt) => self.shell.check(self.remote(), &alt),
            None => Ok(false),
        }
    }

    fn install_missing(&self, manager: PackageManager) -> DeployResult<()> {
        let mut missing = Vec::new();
        for tool in Tool::ALL {
            if !self.is_present(tool)? {
                missing.push(tool.package(manager.family()));
            }
        }

        if missing.is_empty() {
            self.shell.log().info("All required packages already installed");
            return Ok(());
        }

        self.shell
            .log()
            .info(format!("Installing: {}", missing.join(" ")));
        if let Some(refresh) = manager.refresh() {
            self.shell.required(self.remote(), &refresh)?;
        }
        self.shell
            .required(self.remote(), &manager.install(&missing))?;
        Ok(())
    }

    fn ensure_docker_group(&self) -> DeployResult<()> {
        if !self.target.needs_sudo() {
            return Ok(());
        }

        let groups = self.shell.run(
            self.remote(),
            &Cmd::new("id").args(["-nG", self.target.user.as_str()]),
            Policy::Probe,
        )?;
        if groups.stdout.split_whitespace().any(|g| g == "docker") {
            self.shell
                .log()
                .info(format!("{} already in group docker", self.target.user));
            return Ok(());
        }

        let add = Cmd::new("usermod")
            .args(["-aG", "docker", self.target.user.as_str()])
            .sudo();
        self.shell.required(self.remote(), &add)?;
        Ok(())
    }

    // The services may be supervised by something other than
    // systemd, so a failed start is only a warning.
    fn start_services(&self) -> DeployResult<()> {
        for service in ["docker", "nginx"] {
            let enable = Cmd::new("systemctl")
                .args(["enable", "--now", service])
                .sudo();
            let started = self.shell.check(self.remote(), &enable)?;
            if !started {
                self.shell
                    .log()
                    .warn(format!("Could not enable/start {service}; continuing"));
            }
        }
        Ok(())
    }

    fn report(&self, manager: PackageManager) -> ProvisionReport {
        let docker = self
            .probe_stdout(
                &Cmd::new("docker")
                    .args(["version", "--format", "{{json .Client}}"])
                    .sudo(),
            )
            .and_then(|out| parse_docker_version(&out).ok());

        let compose = self.probe_stdout(
            &Cmd::new("docker")
                .args(["compose", "version", "--short"])
                .sudo(),
        );

        // nginx -v prints to stderr.
        let nginx = self
            .shell
            .run(self.remote(), &Cmd::new("nginx").arg("-v").sudo(), Policy::Probe)
            .ok()
            .filter(CommandOutput::success)
            .and_then(|out| parse_nginx_version(&format!("{}{}", out.stdout, out.stderr)));

        let unknown = || "unknown".to_string();
        ProvisionReport {
            manager,
            docker: docker.unwrap_or_else(unknown),
            compose: compose.unwrap_or_else(unknown),
            nginx: nginx.unwrap_or_else(unknown),
        }
    }

    fn probe_stdout(&self, cmd: &Cmd) -> Option<String> {
        self.shell
            .run(self.remote(), cmd, Policy::Probe)
            .ok()
            .filter(CommandOutput::success)
            .map(|out| out.stdout.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    const fn remote(&self) -> Target<'a> {
        Target::Remote(self.target)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ClientVersion {
    version: String,
}

/// Version from `docker version --format '{{json .Client}}'`.
pub fn parse_docker_version(json: &str) -> DeployResult<String> {
    let client: ClientVersion = serde_json::from_str(json)?;
    Ok(client.version)
}

/// Version from `nginx -v` output, e.g. `nginx version: nginx/1.24.0 (Ubuntu)`.
#[must_use]
pub fn parse_nginx_version(output: &str) -> Option<String> {
    let (_, rest) = output.split_once("nginx/")?;
    rest.split_whitespace().next().map(ToString::to_string)
}
