pub mod state;

use std::thread;

use crate::cmd::{Cmd, Policy, Shell, Target};
use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};
use crate::identity::DeploymentIdentity;
use crate::ssh::RemoteTarget;
use crate::sync::{Artifact, BUILD_RECIPE};

pub use state::ContainerState;

const LOG_TAIL_LINES: &str = "50";

/// Which compose front-end the host has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// `docker compose`
    Plugin,
    /// `docker-compose`
    Standalone,
}

impl ComposeCommand {
    pub fn detect(shell: &Shell<'_>, target: &RemoteTarget) -> DeployResult<Self> {
        let plugin = Cmd::new("docker").args(["compose", "version"]).sudo();
        if shell.check(Target::Remote(target), &plugin)? {
            Ok(Self::Plugin)
        } else {
            Ok(Self::Standalone)
        }
    }

    /// Base invocation scoped to one project.
    #[must_use]
    pub fn project(self, project: &str) -> Cmd {
        let base = match self {
            Self::Plugin => Cmd::new("docker").arg("compose"),
            Self::Standalone => Cmd::new("docker-compose"),
        };
        base.args(["-p", project]).sudo()
    }

    /// Project invocation pinned to a compose file under `dir`. The
    /// standalone binary refuses `up` and `down` without one.
    #[must_use]
    pub fn with_file(self, project: &str, dir: &str, file: &str) -> Cmd {
        let path = format!("{dir}/{file}");
        self.project(project)
            .args(["-f", path.as_str(), "--project-directory", dir])
    }
}

/// Ships the checked-out tree to the host and replaces whatever
/// instance of the application ran there before.
pub struct Deployment<'a> {
    shell: Shell<'a>,
    config: &'a DeploymentConfig,
    identity: &'a DeploymentIdentity,
    target: &'a RemoteTarget,
}

impl<'a> Deployment<'a> {
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

    pub fn run(&self, artifact: &Artifact) -> DeployResult<()> {
        self.transfer()?;

        let compose = match artifact {
            Artifact::Compose(_) => Some(ComposeCommand::detect(&self.shell, self.target)?),
            Artifact::Dockerfile => None,
        };

        self.remove_previous(artifact, compose)?;
        self.create_network()?;
        self.launch(artifact, compose)?;

        self.shell.log().info(format!(
            "Waiting {}s for the application to start",
            self.config.startup_grace.as_secs()
        ));
        thread::sleep(self.config.startup_grace);

        self.verify_running(artifact)
    }

    /// Delta-sync the local checkout to the host, skipping VCS
    /// metadata.
    pub fn transfer(&self) -> DeployResult<()> {
        let remote_dir = self.config.remote_dir();
        self.shell.required(
            self.remote(),
            &Cmd::new("mkdir").args(["-p", remote_dir.as_str()]),
        )?;

        let source = format!("{}/", self.config.local_dir().to_string_lossy());
        let dest = format!("{}:{remote_dir}/", self.target.destination());
        let rsync = Cmd::new("rsync")
            .args(["-az", "--delete", "--exclude", ".git", "-e"])
            .arg(self.target.rsync_shell())
            .args([source, dest]);
        self.shell.required(Target::Local, &rsync)?;
        Ok(())
    }

    /// Stop and remove the previous instance. Nothing here is
    /// expected to exist on a first run.
    pub fn remove_previous(
        &self,
        artifact: &Artifact,
        compose: Option<ComposeCommand>,
    ) -> DeployResult<()> {
        if let (Artifact::Compose(file), Some(compose)) = (artifact, compose) {
            let down = self
                .compose_cmd(compose, file)
                .args(["down", "--remove-orphans"]);
            self.shell.best_effort(self.remote(), &down)?;
        }

        let id = self.identity;
        for cmd in [
            docker(["stop", id.container.as_str()]),
            docker(["rm", "-f", id.container.as_str()]),
            docker(["network", "rm", id.network.as_str()]),
        ] {
            self.shell.best_effort(self.remote(), &cmd)?;
        }
        Ok(())
    }

    fn create_network(&self) -> DeployResult<()> {
        let create = docker(["network", "create", self.identity.network.as_str()]);
        self.shell.best_effort(self.remote(), &create)?;
        Ok(())
    }

    fn launch(&self, artifact: &Artifact, compose: Option<ComposeCommand>) -> DeployResult<()> {
        let remote_dir = self.config.remote_dir();

        match (artifact, compose) {
            (Artifact::Compose(file), Some(compose)) => {
                self.shell.log().info(format!(
                    "Starting services from {file} as project {}",
                    self.identity.project()
                ));
                let up = self
                    .compose_cmd(compose, file)
                    .args(["up", "-d", "--build", "--remove-orphans"]);
                self.shell.required(self.remote(), &up)?;
            }
            _ => {
                let recipe = format!("{remote_dir}/{BUILD_RECIPE}");
                let present = self
                    .shell
                    .check(self.remote(), &Cmd::new("test").args(["-f", recipe.as_str()]))?;
                if !present {
                    return Err(DeployError::ArtifactMissing(format!(
                        "{}:{remote_dir}",
                        self.target.host
                    )));
                }

                self.shell
                    .log()
                    .info(format!("Building image {}", self.identity.image));
                let build = docker([
                    "build",
                    "-t",
                    self.identity.image.as_str(),
                    "-f",
                    recipe.as_str(),
                    remote_dir.as_str(),
                ]);
                self.shell.required(self.remote(), &build)?;

                // Host port mirrors the container port.
                let publish = format!("{0}:{0}", self.config.app_port);
                let run = docker([
                    "run",
                    "-d",
                    "--name",
                    self.identity.container.as_str(),
                    "--network",
                    self.identity.network.as_str(),
                    "-p",
                    publish.as_str(),
                    "--restart",
                    "unless-stopped",
                    self.identity.image.as_str(),
                ]);
                self.shell.required(self.remote(), &run)?;
            }
        }
        Ok(())
    }

    /// Every container of the deployment must be in an accepted
    /// state. On failure the container's recent output is logged.
    pub fn verify_running(&self, artifact: &Artifact) -> DeployResult<()> {
        let containers = match artifact {
            Artifact::Dockerfile => vec![self.identity.container.clone()],
            Artifact::Compose(_) => project_containers(&self.shell, self.target, self.identity)?,
        };
        if containers.is_empty() {
            return Err(DeployError::ContainerNotRunning {
                name: self.identity.project().to_string(),
                state: "no containers".into(),
            });
        }

        for container in &containers {
            let state = inspect(&self.shell, self.target, container)?;
            match state {
                Some(state) if state.is_ready(&self.config.accepted_states) => {
                    self.shell
                        .log()
                        .info(format!("{container}: {}", state.label()));
                }
                other => {
                    let label = other.map_or_else(|| "missing".to_string(), |s| s.label());
                    self.capture_logs(container)?;
                    return Err(DeployError::ContainerNotRunning {
                        name: container.clone(),
                        state: label,
                    });
                }
            }
        }
        Ok(())
    }

    fn capture_logs(&self, container: &str) -> DeployResult<()> {
        let logs = docker(["logs", "--tail", LOG_TAIL_LINES, container]);
        let out = self.shell.run(self.remote(), &logs, Policy::Probe)?;
        let text = [out.stdout.trim(), out.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.shell.log().error(format!(
            "Last {LOG_TAIL_LINES} log lines of {container}:\n{}",
            if text.is_empty() { "<empty>" } else { &text }
        ));
        Ok(())
    }

    fn compose_cmd(&self, compose: ComposeCommand, file: &str) -> Cmd {
        compose.with_file(self.identity.project(), &self.config.remote_dir(), file)
    }

    const fn remote(&self) -> Target<'a> {
        Target::Remote(self.target)
    }
}

/// `docker <args>` with privilege escalation when needed.
pub fn docker<I, S>(args: I) -> Cmd
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Cmd::new("docker").args(args).sudo()
}

/// State of one container, `None` when it does not exist.
pub fn inspect(
    shell: &Shell<'_>,
    target: &RemoteTarget,
    container: &str,
) -> DeployResult<Option<ContainerState>> {
    let cmd = docker(["inspect", "--format", "{{json .State}}", container]);
    let out = shell.run(Target::Remote(target), &cmd, Policy::Probe)?;
    if !out.success() {
        return Ok(None);
    }
    ContainerState::parse(&out.stdout).map(Some)
}

/// IDs of the containers a compose project started.
pub fn project_containers(
    shell: &Shell<'_>,
    target: &RemoteTarget,
    identity: &DeploymentIdentity,
) -> DeployResult<Vec<String>> {
    let label = format!("label=com.docker.compose.project={}", identity.project());
    let ps = docker(["ps", "-a", "-q", "--filter", label.as_str()]);
    let out = shell.run(Target::Remote(target), &ps, Policy::Probe)?;
    Ok(out
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect())
}
