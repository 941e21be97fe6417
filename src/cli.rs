use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use crate::config::ConfigInputs;
use crate::pipeline::Mode;

#[derive(Parser, Debug)]
#[command(name = "dropship")]
#[command(about = "Deploy a containerized application from Git to a single host behind nginx")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["teardown", "dry_run", "status"]).multiple(false)))]
pub struct Cli {
    /// HTTP(S) URL of the Git repository
    #[arg(long, env = "DROPSHIP_REPO")]
    pub repo: String,

    /// Access token for the repository
    #[arg(long, env = "DROPSHIP_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Branch to deploy
    #[arg(long, env = "DROPSHIP_BRANCH", default_value = crate::config::DEFAULT_BRANCH)]
    pub branch: String,

    /// Remote user
    #[arg(long, env = "DROPSHIP_USER")]
    pub user: String,

    /// Remote host name or IP address
    #[arg(long, env = "DROPSHIP_HOST")]
    pub host: String,

    /// Private key used for SSH
    #[arg(long, env = "DROPSHIP_KEY")]
    pub key: PathBuf,

    /// Port the application listens on inside the container
    #[arg(long, env = "DROPSHIP_PORT", allow_negative_numbers = true)]
    pub port: i64,

    /// Directory holding local checkouts
    #[arg(long, env = "DROPSHIP_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Directory for the daily log file
    #[arg(long, env = "DROPSHIP_LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Remote directory holding deployments; relative paths start at the user's home
    #[arg(long)]
    pub remote_root: Option<String>,

    /// Seconds to wait after starting containers before checking them
    #[arg(long, value_name = "SECS")]
    pub startup_grace: Option<u64>,

    /// Timeout in seconds for each HTTP check
    #[arg(long, value_name = "SECS")]
    pub probe_timeout: Option<u64>,

    /// Container states accepted as ready (comma separated)
    #[arg(long = "ready-state", value_delimiter = ',')]
    pub ready_states: Vec<String>,

    /// Remove everything a deployment created instead of deploying
    #[arg(long)]
    pub teardown: bool,

    /// Print the nginx site and planned actions without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Show container status on the host
    #[arg(long)]
    pub status: bool,
}

impl Cli {
    #[must_use]
    pub const fn mode(&self) -> Mode {
        if self.teardown {
            Mode::Teardown
        } else if self.dry_run {
            Mode::DryRun
        } else if self.status {
            Mode::Status
        } else {
            Mode::Deploy
        }
    }

    #[must_use]
    pub fn into_inputs(self) -> ConfigInputs {
        ConfigInputs {
            repo_url: self.repo,
            credential: self.token,
            branch: Some(self.branch),
            user: self.user,
            host: self.host,
            key_path: self.key,
            port: self.port,
            work_root: self.workdir,
            remote_root: self.remote_root,
            startup_grace: self.startup_grace.map(Duration::from_secs),
            probe_timeout: self.probe_timeout.map(Duration::from_secs),
            accepted_states: self.ready_states,
        }
    }
}
