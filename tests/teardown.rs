mod common;

use common::{Fixture, ScriptedExecutor};
use dropship::cmd::{CommandOutput, Shell};
use dropship::identity::DeploymentIdentity;
use dropship::log::{Logger, Severity};
use dropship::teardown::Teardown;

/// A host where nothing was ever deployed: every docker command
/// reports a missing object and no nginx link exists.
fn pristine_host() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on("docker ", CommandOutput::failed(1, "Error: No such object"))
        .on("docker-compose", CommandOutput::failed(1, "no such project"))
        .on("test -L", CommandOutput::failed(1, ""))
        .on("test -f", CommandOutput::failed(1, ""))
}

#[test]
fn removes_resources_in_order() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new();
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    let order = [
        "--project-directory deployments/widget down --remove-orphans",
        "docker stop app-container-widget",
        "docker rm -f app-container-widget",
        "docker rmi widget:latest",
        "docker network rm app-network-widget",
        "rm -rf deployments/widget",
        "rm -f /etc/nginx/sites-available/widget.conf",
        "nginx -t",
        "systemctl reload nginx",
    ];
    let positions: Vec<usize> = order.iter().map(|s| exec.index_of(s)).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "out of order: {positions:?}"
    );
    assert!(exec.ran("rm -f /etc/nginx/sites-enabled/widget.conf"));
    assert!(!fx.checkout().exists());
}

#[test]
fn standalone_compose_is_pointed_at_the_remote_file() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new()
        .on("docker compose version", CommandOutput::failed(1, ""))
        .on("test -f", CommandOutput::failed(1, ""))
        .on("test -f deployments/widget/compose.yaml", CommandOutput::ok(""));
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    let down = exec.find("docker-compose");
    assert_eq!(
        down.args,
        [
            "-p",
            "widget",
            "-f",
            "deployments/widget/compose.yaml",
            "--project-directory",
            "deployments/widget",
            "down",
            "--remove-orphans"
        ]
    );
    assert!(exec.index_of("docker-compose") < exec.index_of("rm -rf deployments/widget"));
}

#[test]
fn leftover_project_containers_are_force_removed() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new()
        .on("docker compose version", CommandOutput::failed(1, ""))
        .on("test -f", CommandOutput::failed(1, ""))
        .on(
            "docker-compose",
            CommandOutput::failed(1, "Can't find a suitable configuration file"),
        )
        .on("docker ps", CommandOutput::ok("4f1c2a\n9b8e7d\n"));
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    let ps = exec.find("docker ps");
    assert_eq!(
        ps.args,
        ["ps", "-a", "-q", "--filter", "label=com.docker.compose.project=widget"]
    );
    let rm = exec.find("docker rm -f 4f1c2a");
    assert_eq!(rm.args, ["rm", "-f", "4f1c2a", "9b8e7d"]);
    assert!(exec.index_of("docker-compose") < exec.index_of("docker rm -f 4f1c2a"));
}

#[test]
fn nothing_deployed_still_succeeds() {
    let fx = Fixture::empty();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = pristine_host();
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    // Standalone compose is used when the plugin is missing.
    assert!(exec.ran("docker-compose -p widget down"));
    assert!(exec.ran("docker rmi widget:latest"));
    assert_eq!(log.count(Severity::Error), 0);
    assert_eq!(log.count(Severity::Fatal), 0);
}

#[test]
fn only_symlinks_are_unlinked() {
    let fx = Fixture::new();
    let config = fx.config("root");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = pristine_host();
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    assert!(!exec.ran("rm -f /etc/nginx/sites-enabled/widget.conf"));
    assert!(!exec.ran("rm -f /etc/nginx/conf.d/widget.conf"));
    assert!(exec.ran("rm -f /etc/nginx/sites-available/widget.conf"));
}

#[test]
fn invalid_remaining_config_is_not_reloaded() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new().on(
        "nginx -t",
        CommandOutput::failed(1, "nginx: [emerg] host not found in upstream"),
    );
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    assert!(!exec.ran("systemctl reload nginx"));
    assert_eq!(log.count(Severity::Warn), 1);
    // The local checkout is removed even so.
    assert!(!fx.checkout().exists());
}

#[test]
fn privileged_commands_use_sudo_for_non_root() {
    let fx = Fixture::new();
    let config = fx.config("deploy");
    let id = DeploymentIdentity::new(&config.app_name);
    let target = config.remote_target();
    let exec = ScriptedExecutor::new();
    let log = Logger::memory();

    Teardown::new(Shell::new(&exec, &log), &config, &id, &target)
        .run()
        .unwrap();

    let rm = exec.find("rm -rf deployments/widget");
    assert!(rm.rendered.starts_with("sudo -n rm -rf"));
    assert_eq!(rm.target, common::HOST);
    assert!(exec.find("docker stop").rendered.starts_with("sudo -n docker"));
}
