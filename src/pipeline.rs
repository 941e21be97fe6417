use std::fmt::Write;

use crate::cmd::{Cmd, Executor, Shell, Target};
use crate::config::DeploymentConfig;
use crate::deploy::{self, Deployment};
use crate::error::{DeployError, DeployResult};
use crate::health::{HealthValidator, HttpProbe};
use crate::identity::DeploymentIdentity;
use crate::log::Logger;
use crate::provision::{PackageFamily, Provisioner};
use crate::proxy::{NginxSite, ProxyConfigurator, ProxyLayout};
use crate::ssh::RemoteTarget;
use crate::stage::{Outcome, StageResult};
use crate::sync::{self, Artifact};
use crate::teardown::Teardown;

/// Entry points into the pipeline. Exactly one per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Deploy,
    Teardown,
    DryRun,
    Status,
}

/// What a finished run reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub soft_failures: Vec<String>,
}

/// Top-level controller: runs the stages in order and stops at the
/// first fatal one.
pub struct Pipeline<'a> {
    config: DeploymentConfig,
    identity: DeploymentIdentity,
    target: RemoteTarget,
    shell: Shell<'a>,
    probe: &'a dyn HttpProbe,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(
        config: DeploymentConfig,
        executor: &'a dyn Executor,
        log: &'a Logger,
        probe: &'a dyn HttpProbe,
    ) -> Self {
        log.redact(config.credential.expose());
        Self {
            identity: DeploymentIdentity::new(&config.app_name),
            target: config.remote_target(),
            shell: Shell::new(executor, log),
            probe,
            config,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &DeploymentIdentity {
        &self.identity
    }

    #[must_use]
    pub const fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn run(&self, mode: Mode) -> DeployResult<Report> {
        match mode {
            Mode::Deploy => self.deploy(),
            Mode::Teardown => self.teardown().map(|()| Report::default()),
            Mode::Status => self.status().map(|()| Report::default()),
            Mode::DryRun => {
                eprintln!("=== Dry run: no changes will be made ===");
                eprintln!();
                println!("{}", self.dry_run());
                Ok(Report::default())
            }
        }
    }

    pub fn deploy(&self) -> DeployResult<Report> {
        let log = self.shell.log();
        log.info(format!(
            "Deploying {} ({}) to {} on port {}",
            self.config.app_name, self.config.branch, self.target, self.config.app_port
        ));

        let mut report = Report::default();
        let mut artifact = Artifact::Dockerfile;
        let mut family = PackageFamily::Debian;

        self.stage("sync", || {
            artifact = sync::synchronize(&self.shell, &self.config)?;
            Ok(Outcome::Done)
        })?;
        self.stage("preflight", || self.preflight().map(|()| Outcome::Done))?;
        self.stage("provision", || {
            family = Provisioner::new(self.shell, &self.target).run()?.family();
            Ok(Outcome::Done)
        })?;
        self.stage("deploy", || {
            Deployment::new(self.shell, &self.config, &self.identity, &self.target)
                .run(&artifact)
                .map(|()| Outcome::Done)
        })?;
        self.stage("proxy", || {
            let site = NginxSite::for_app(&self.target.host, self.config.app_port);
            ProxyConfigurator::new(self.shell, &self.target, &self.identity)
                .install(&site, ProxyLayout::for_family(family))
                .map(|()| Outcome::Done)
        })?;
        if let Some(reason) = self.stage("validate", || {
            HealthValidator::new(
                self.shell,
                &self.target,
                self.probe,
                self.config.probe_timeout,
            )
            .validate()
        })? {
            report.soft_failures.push(reason);
        }

        if report.soft_failures.is_empty() {
            log.success(format!(
                "Deployment of {} complete: http://{}/",
                self.config.app_name, self.target.host
            ));
        } else {
            log.success(format!(
                "Deployment of {} complete with {} soft error(s): http://{}/",
                self.config.app_name,
                report.soft_failures.len(),
                self.target.host
            ));
        }
        Ok(report)
    }

    pub fn teardown(&self) -> DeployResult<()> {
        self.shell.log().info(format!(
            "Tearing down {} on {}",
            self.config.app_name, self.target
        ));

        self.stage("preflight", || self.preflight().map(|()| Outcome::Done))?;
        self.stage("teardown", || {
            Teardown::new(self.shell, &self.config, &self.identity, &self.target)
                .run()
                .map(|()| Outcome::Done)
        })?;

        self.shell
            .log()
            .success(format!("Teardown of {} complete", self.config.app_name));
        Ok(())
    }

    /// Print the state of every container the deployment owns.
    pub fn status(&self) -> DeployResult<()> {
        self.stage("preflight", || self.preflight().map(|()| Outcome::Done))?;

        let mut containers = vec![self.identity.container.clone()];
        for id in deploy::project_containers(&self.shell, &self.target, &self.identity)? {
            if !containers.contains(&id) {
                containers.push(id);
            }
        }

        let mut found = false;
        for container in &containers {
            if let Some(state) = deploy::inspect(&self.shell, &self.target, container)? {
                found = true;
                println!("{container}: {}", state.label());
            }
        }
        if !found {
            println!("{}: not deployed on {}", self.config.app_name, self.target.host);
        }
        Ok(())
    }

    /// The generated nginx site and the ordered list of actions a
    /// deployment would perform.
    #[must_use]
    pub fn dry_run(&self) -> String {
        let c = &self.config;
        let id = &self.identity;
        let site = NginxSite::for_app(&self.target.host, c.app_port);

        let mut out = String::new();
        let _ = writeln!(out, "--- {} ---", id.proxy_config);
        out.push_str(&site.render());
        out.push('\n');
        let _ = writeln!(out, "--- Actions that would be performed ---");

        let steps = [
            format!(
                "Clone or update {} ({}) in {}",
                c.repo_url,
                c.branch,
                c.local_dir().display()
            ),
            format!("Check SSH connectivity to {}", self.target),
            "Install docker, docker compose, nginx, rsync, curl if missing".to_string(),
            format!("Sync the checkout to {}:{}", self.target.host, c.remote_dir()),
            format!(
                "Replace container {} on network {} (image {}, port {p}:{p})",
                id.container,
                id.network,
                id.image,
                p = c.app_port
            ),
            format!("Install nginx site {} and reload nginx", id.proxy_config),
            format!(
                "Check http://127.0.0.1/ on the host and http://{}/ from here",
                self.target.host
            ),
        ];
        for (n, step) in steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {step}", n + 1);
        }
        out
    }

    fn preflight(&self) -> DeployResult<()> {
        self.shell
            .required(Target::Remote(&self.target), &Cmd::new("echo").arg("ok"))
            .map(|_| ())
            .map_err(|e| match e {
                DeployError::CommandNotFound(p) => DeployError::PrerequisiteMissing(p),
                other => DeployError::SshFailed(format!("cannot reach {}: {other}", self.target)),
            })
    }

    /// Run one stage and turn its result into continue or abort.
    /// Returns the reason when the stage finished degraded.
    fn stage(
        &self,
        name: &'static str,
        f: impl FnOnce() -> DeployResult<Outcome>,
    ) -> DeployResult<Option<String>> {
        let log = self.shell.log();
        log.info(format!("==> {name}"));

        match StageResult::from(f()) {
            StageResult::Success => {
                log.success(format!("{name}: done"));
                Ok(None)
            }
            StageResult::SoftFailure(reason) => {
                log.warn(format!("{name}: done with a soft failure"));
                Ok(Some(reason))
            }
            StageResult::Fatal(e) => {
                let e = e.in_stage(name);
                log.fatal(e.to_string());
                Err(e)
            }
        }
    }
}
