//! Idempotent single-host deployment of a containerized application.
//!
//! Dropship takes an application from a Git repository to a running
//! container on one remote Linux host, fronted by nginx on port 80.
//! Every run converges the host to the same state: re-running a
//! deployment replaces the previous one instead of stacking on top of
//! it, and a teardown removes exactly what a deployment created.
//!
//! # Overview
//!
//! A run is driven by a [`Pipeline`] built from a validated
//! [`DeploymentConfig`]. Every resource on the host is named after
//! the application through a [`DeploymentIdentity`], so later runs
//! and teardowns find it again without any state file.
//!
//! # Architecture
//!
//! A deployment runs these stages in order and stops at the first
//! fatal one:
//!
//! 1. **sync** - clone or update the repository locally and detect a
//!    `Dockerfile` or compose file
//! 2. **preflight** - confirm the host is reachable over SSH
//! 3. **provision** - install Docker, Compose, nginx, rsync and curl
//!    through the host's package manager
//! 4. **deploy** - transfer the checkout, remove the previous
//!    deployment, build and start the container
//! 5. **proxy** - write the nginx site, validate it with `nginx -t`,
//!    reload
//! 6. **validate** - request the site on the host (fatal) and from
//!    this machine (soft)
//!
//! All commands go through an [`Executor`](cmd::Executor), so a
//! scripted executor can stand in for a real host.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use dropship::cmd::SystemExecutor;
//! use dropship::config::{ConfigInputs, DeploymentConfig};
//! use dropship::health::ReqwestProbe;
//! use dropship::log::Logger;
//! use dropship::pipeline::{Mode, Pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let inputs = ConfigInputs::new(
//!         "https://git.example.com/acme/widget.git",
//!         "access-token",
//!         "deploy",
//!         "203.0.113.7",
//!         Path::new("/home/me/.ssh/id_ed25519"),
//!         3000,
//!     );
//!     let config = DeploymentConfig::resolve(inputs)?;
//!     let log = Logger::daily(Path::new("."))?;
//!
//!     let pipeline = Pipeline::new(config, &SystemExecutor, &log, &ReqwestProbe);
//!     pipeline.run(Mode::Deploy)?;
//!     Ok(())
//! }
//! ```
//!
//! Or from the command line:
//!
//! ```sh
//! export DROPSHIP_TOKEN=...
//! dropship --repo https://git.example.com/acme/widget.git \
//!     --user deploy --host 203.0.113.7 \
//!     --key ~/.ssh/id_ed25519 --port 3000
//!
//! # Preview the nginx site and the planned actions
//! dropship ... --dry-run
//!
//! # Remove everything the deployment created
//! dropship ... --teardown
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod identity;
pub mod log;
pub mod pipeline;
pub mod provision;
pub mod proxy;
pub mod ssh;
pub mod stage;
pub mod sync;
pub mod teardown;

pub use config::{ConfigInputs, DeploymentConfig};
pub use error::{DeployError, DeployResult};
pub use identity::DeploymentIdentity;
pub use pipeline::{Mode, Pipeline};
