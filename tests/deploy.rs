mod common;

use common::{EXITED, Fixture, HOST, RUNNING, ScriptedExecutor};
use dropship::cmd::{CommandOutput, Shell};
use dropship::deploy::{ComposeCommand, ContainerState, Deployment};
use dropship::error::DeployError;
use dropship::identity::DeploymentIdentity;
use dropship::log::Logger;
use dropship::sync::Artifact;

#[test]
fn transfer_syncs_checkout_without_vcs_metadata() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new();
    let log = Logger::memory();

    Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .transfer()
        .unwrap();

    let mkdir = exec.find("mkdir");
    assert_eq!(mkdir.target, HOST);
    assert_eq!(mkdir.args, ["-p", "deployments/widget"]);

    let rsync = exec.find("rsync");
    assert_eq!(rsync.target, "local");
    assert_eq!(&rsync.args[..4], ["-az", "--delete", "--exclude", ".git"]);
    assert_eq!(rsync.args[4], "-e");
    assert!(rsync.args[5].starts_with("ssh "));
    assert!(rsync.args[5].contains("ControlMaster=auto"));
    assert_eq!(
        rsync.args[6],
        format!("{}/", fx.checkout().to_string_lossy())
    );
    assert_eq!(rsync.args[7], format!("deploy@{HOST}:deployments/widget/"));
}

#[test]
fn missing_remote_recipe_is_reported() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new().on("test -f", CommandOutput::failed(1, ""));
    let log = Logger::memory();

    let err = Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .run(&Artifact::Dockerfile)
        .unwrap_err();

    assert!(matches!(err, DeployError::ArtifactMissing(_)));
    assert!(!exec.ran("docker build"));
}

#[test]
fn failed_build_aborts_before_run() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new().on(
        "docker build",
        CommandOutput::failed(1, "failed to solve: process \"/bin/sh -c make\" did not complete"),
    );
    let log = Logger::memory();

    let err = Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .run(&Artifact::Dockerfile)
        .unwrap_err();

    assert_eq!(err.exit_code(), Some(1));
    assert!(!exec.ran("docker run"));
}

#[test]
fn compose_project_is_started_under_the_app_name() {
    let fx = Fixture::new();
    fx.write("docker-compose.yml", "services: {}\n");
    let config = fx.config("root");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new()
        .on("docker ps", CommandOutput::ok("4f1c2a\n9b8e7d\n"))
        .on("docker inspect", CommandOutput::ok(RUNNING));
    let log = Logger::memory();

    Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .run(&Artifact::Compose("docker-compose.yml".into()))
        .unwrap();

    let project = [
        "docker compose -p widget",
        "-f deployments/widget/docker-compose.yml",
        "--project-directory deployments/widget",
    ]
    .join(" ");
    let down = exec.index_of(&format!("{project} down --remove-orphans"));
    let up = exec.index_of(&format!("{project} up -d --build --remove-orphans"));
    assert!(down < up);
    assert!(!exec.ran("docker build"));
    assert!(exec.ran("docker inspect --format {{json .State}} 4f1c2a"));
    assert!(exec.ran("docker inspect --format {{json .State}} 9b8e7d"));
}

#[test]
fn compose_without_containers_fails() {
    let fx = Fixture::new();
    let config = fx.config("root");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new();
    let log = Logger::memory();

    let err = Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .run(&Artifact::Compose("compose.yaml".into()))
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::ContainerNotRunning { ref name, .. } if name == "widget"
    ));
}

#[test]
fn one_unhealthy_service_fails_the_deployment() {
    let fx = Fixture::new();
    let config = fx.config("root");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new()
        .on("docker ps", CommandOutput::ok("aaa\nbbb"))
        .on("docker inspect", CommandOutput::ok(RUNNING))
        .on("docker inspect --format {{json .State}} bbb", CommandOutput::ok(EXITED));
    let log = Logger::memory();

    let err = Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .verify_running(&Artifact::Compose("compose.yml".into()))
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::ContainerNotRunning { ref name, ref state } if name == "bbb" && state == "exited"
    ));
    assert!(exec.ran("docker logs --tail 50 bbb"));
}

#[test]
fn healthcheck_status_counts_as_ready() {
    let fx = Fixture::new();
    let mut inputs = fx.inputs("root");
    inputs.accepted_states = vec!["healthy".into()];
    let config = dropship::config::DeploymentConfig::resolve(inputs).unwrap();
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new().on(
        "docker inspect",
        CommandOutput::ok(r#"{"Status":"running","Running":true,"Health":{"Status":"healthy"}}"#),
    );
    let log = Logger::memory();

    Deployment::new(Shell::new(&exec, &log), &config, &id, &target)
        .verify_running(&Artifact::Dockerfile)
        .unwrap();
}

#[test]
fn standalone_compose_when_plugin_missing() {
    let exec = ScriptedExecutor::new().on("docker compose version", CommandOutput::failed(1, ""));
    let log = Logger::memory();
    let target = dropship::ssh::RemoteTarget::new("root", HOST, "/keys/id");

    let compose = ComposeCommand::detect(&Shell::new(&exec, &log), &target).unwrap();

    assert_eq!(compose, ComposeCommand::Standalone);
    assert_eq!(
        compose.project("widget").get_args(),
        ["-p", "widget"]
    );
    assert_eq!(compose.project("widget").program(), "docker-compose");
}

#[test]
fn container_state_readiness() {
    let accepted = vec!["running".to_string(), "healthy".to_string()];

    let plain = ContainerState::parse(
        r#"{"Status":"running","Running":true,"Paused":false,"ExitCode":0}"#,
    )
    .unwrap();
    assert!(plain.health.is_none());
    assert!(plain.is_ready(&accepted));
    assert_eq!(plain.label(), "running");

    let exited = ContainerState::parse(EXITED).unwrap();
    assert!(!exited.is_ready(&accepted));

    let restarting = ContainerState::parse(r#"{"Status":"restarting","Running":true}"#).unwrap();
    assert!(!restarting.is_ready(&accepted));
}

#[test]
fn healthy_counts_even_when_status_is_not_accepted() {
    let state = ContainerState::parse(
        r#"{"Status":"running","Running":true,"Health":{"Status":"healthy","FailingStreak":0}}"#,
    )
    .unwrap();

    assert!(state.is_ready(&["healthy".to_string()]));
    assert_eq!(state.label(), "running (healthy)");
}
