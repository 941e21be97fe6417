use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use dropship::cli::Cli;
use dropship::cmd::SystemExecutor;
use dropship::config::DeploymentConfig;
use dropship::health::ReqwestProbe;
use dropship::log::{Logger, Severity};
use dropship::pipeline::Pipeline;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log = match Logger::daily(&cli.log_dir) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Cannot open log file in {}: {e}", cli.log_dir.display());
            return ExitCode::FAILURE;
        }
    };
    log.redact(&cli.token);

    match run(cli, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Stage failures are already logged by the pipeline.
            if log.count(Severity::Fatal) == 0 {
                log.fatal(format!("{e:#}"));
            }
            if let Some(path) = log.path() {
                log.error(format!("Aborted. Full log: {}", path.display()));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, log: &Logger) -> anyhow::Result<()> {
    let mode = cli.mode();
    let config =
        DeploymentConfig::resolve(cli.into_inputs()).context("invalid deployment settings")?;

    let pipeline = Pipeline::new(config, &SystemExecutor, log, &ReqwestProbe);
    let report = pipeline.run(mode)?;
    for reason in &report.soft_failures {
        log.warn(format!("Soft failure: {reason}"));
    }
    Ok(())
}
