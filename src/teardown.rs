use std::io::ErrorKind;

use crate::cmd::{Cmd, Shell, Target};
use crate::config::DeploymentConfig;
use crate::deploy::{ComposeCommand, docker, project_containers};
use crate::error::DeployResult;
use crate::identity::DeploymentIdentity;
use crate::proxy::ProxyConfigurator;
use crate::ssh::RemoteTarget;
use crate::sync::COMPOSE_FILES;

/// Undoes a deployment, addressing resources only by the
/// deployment's identity. Every step tolerates the resource being
/// absent, so tearing down nothing succeeds.
pub struct Teardown<'a> {
    shell: Shell<'a>,
    config: &'a DeploymentConfig,
    identity: &'a DeploymentIdentity,
    target: &'a RemoteTarget,
}

impl<'a> Teardown<'a> {
    #[must_use]
    pub const fn new(
        shell: Shell<'a>,
        config: &'a DeploymentConfig,
        identity: &'a DeploymentIdentity,
        target: &'a RemoteTarget,
    ) -> Self {
        Self {
            shell,
            config,
            identity,
            target,
        }
    }

    pub fn run(&self) -> DeployResult<()> {
        self.remove_containers()?;
        self.remove_remote_dir()?;
        ProxyConfigurator::new(self.shell, self.target, self.identity).remove()?;
        self.remove_local_dir();
        Ok(())
    }

    fn remove_containers(&self) -> DeployResult<()> {
        let remote = Target::Remote(self.target);
        let id = self.identity;

        let compose = ComposeCommand::detect(&self.shell, self.target)?;
        let down = match self.remote_compose_file()? {
            Some(file) => compose.with_file(id.project(), &self.config.remote_dir(), file),
            None => compose.project(id.project()),
        }
        .args(["down", "--remove-orphans"]);
        self.shell.best_effort(remote, &down)?;

        // Whatever `down` left behind still carries the project label.
        let leftovers = project_containers(&self.shell, self.target, id)?;
        if !leftovers.is_empty() {
            let rm = docker(["rm", "-f"]).args(leftovers);
            self.shell.best_effort(remote, &rm)?;
        }

        for cmd in [
            docker(["stop", id.container.as_str()]),
            docker(["rm", "-f", id.container.as_str()]),
            docker(["rmi", id.image.as_str()]),
            docker(["network", "rm", id.network.as_str()]),
        ] {
            self.shell.best_effort(remote, &cmd)?;
        }
        Ok(())
    }

    /// Compose file of the remote copy, if one is still there.
    fn remote_compose_file(&self) -> DeployResult<Option<&'static str>> {
        let dir = self.config.remote_dir();
        for file in COMPOSE_FILES {
            let path = format!("{dir}/{file}");
            let test = Cmd::new("test").args(["-f", path.as_str()]);
            if self.shell.check(Target::Remote(self.target), &test)? {
                return Ok(Some(file));
            }
        }
        Ok(None)
    }

    fn remove_remote_dir(&self) -> DeployResult<()> {
        let dir = self.config.remote_dir();
        // Compose builds can leave root-owned files behind.
        let rm = Cmd::new("rm").args(["-rf", dir.as_str()]).sudo();
        self.shell.best_effort(Target::Remote(self.target), &rm)?;
        Ok(())
    }

    fn remove_local_dir(&self) {
        let dir = self.config.local_dir();
        let log = self.shell.log();
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => log.info(format!("Removed {}", dir.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log.info(format!("{} already absent", dir.display()));
            }
            Err(e) => log.warn(format!("Could not remove {}: {e}", dir.display())),
        }
    }
}
