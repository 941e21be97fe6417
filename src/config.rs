use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeployError, DeployResult};
use crate::ssh::RemoteTarget;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REMOTE_ROOT: &str = "deployments";
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACCEPTED_STATES: [&str; 2] = ["running", "healthy"];

/// Repository access token. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Unvalidated inputs, as collected from flags, environment, or a
/// caller.
#[derive(Debug, Clone)]
pub struct ConfigInputs {
    pub repo_url: String,
    pub credential: String,
    pub branch: Option<String>,
    pub user: String,
    pub host: String,
    pub key_path: PathBuf,
    pub port: i64,
    pub work_root: PathBuf,
    pub remote_root: Option<String>,
    pub startup_grace: Option<Duration>,
    pub probe_timeout: Option<Duration>,
    pub accepted_states: Vec<String>,
}

impl ConfigInputs {
    /// Inputs with every tunable left at its default.
    #[must_use]
    pub fn new(repo_url: &str, credential: &str, user: &str, host: &str, key_path: &Path, port: i64) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            credential: credential.to_string(),
            branch: None,
            user: user.to_string(),
            host: host.to_string(),
            key_path: key_path.to_path_buf(),
            port,
            work_root: PathBuf::from("."),
            remote_root: None,
            startup_grace: None,
            probe_timeout: None,
            accepted_states: Vec::new(),
        }
    }
}

/// Fully validated deployment parameters. Built once, then only
/// read.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub repo_url: String,
    pub credential: Credential,
    pub branch: String,
    pub user: String,
    pub host: String,
    pub key_path: PathBuf,
    pub app_name: String,
    pub app_port: u16,
    pub work_root: PathBuf,
    pub remote_root: String,
    pub startup_grace: Duration,
    pub probe_timeout: Duration,
    pub accepted_states: Vec<String>,
}

impl DeploymentConfig {
    /// Validate every input. Runs before any local or remote command.
    pub fn resolve(inputs: ConfigInputs) -> DeployResult<Self> {
        let repo_url = required("repository URL", &inputs.repo_url)?;
        if !(repo_url.starts_with("https://") || repo_url.starts_with("http://")) {
            return Err(DeployError::InvalidInput(format!(
                "repository URL must use http(s): {repo_url}"
            )));
        }
        let credential = required("access credential", &inputs.credential)?;
        let user = required("remote user", &inputs.user)?;
        let host = required("remote host", &inputs.host)?;
        let app_port = validate_port(inputs.port)?;

        if !inputs.key_path.is_file() {
            return Err(DeployError::FileNotFound(format!(
                "private key {}",
                inputs.key_path.display()
            )));
        }

        let branch = match inputs.branch.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_BRANCH.to_string(),
            Some(b) => b.to_string(),
        };

        let accepted_states = if inputs.accepted_states.is_empty() {
            DEFAULT_ACCEPTED_STATES.iter().map(ToString::to_string).collect()
        } else {
            inputs.accepted_states
        };

        Ok(Self {
            app_name: derive_app_name(&repo_url)?,
            repo_url,
            credential: Credential::new(&credential),
            branch,
            user,
            host,
            key_path: inputs.key_path,
            app_port,
            work_root: inputs.work_root,
            remote_root: inputs
                .remote_root
                .as_deref()
                .map_or_else(|| Ok(DEFAULT_REMOTE_ROOT.to_string()), validate_remote_root)?,
            startup_grace: inputs.startup_grace.unwrap_or(DEFAULT_STARTUP_GRACE),
            probe_timeout: inputs.probe_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT),
            accepted_states,
        })
    }

    #[must_use]
    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget::new(&self.user, &self.host, &self.key_path.to_string_lossy())
    }

    /// Local checkout of the repository.
    #[must_use]
    pub fn local_dir(&self) -> PathBuf {
        self.work_root.join(&self.app_name)
    }

    /// Remote copy of the checkout, relative to the remote user's
    /// home directory.
    #[must_use]
    pub fn remote_dir(&self) -> String {
        format!("{}/{}", self.remote_root.trim_end_matches('/'), self.app_name)
    }
}

fn required(what: &str, value: &str) -> DeployResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeployError::InvalidInput(format!("{what} is required")));
    }
    Ok(value.to_string())
}

/// Accept only TCP ports usable by the application.
pub fn validate_port(port: i64) -> DeployResult<u16> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| DeployError::InvalidInput(format!("port {port} is outside 1-65535")))
}

/// Directory under which each application gets its remote copy.
/// Relative roots resolve against the remote user's home directory.
/// `~` is rejected because the remote commands receive it quoted.
pub fn validate_remote_root(root: &str) -> DeployResult<String> {
    let trimmed = root.trim().trim_end_matches('/');
    let invalid = trimmed.is_empty()
        || trimmed.starts_with('~')
        || trimmed.split('/').any(|segment| segment == "..");
    if invalid {
        return Err(DeployError::InvalidInput(format!(
            "remote root {root:?} must name a directory other than /, without ~ or .."
        )));
    }
    Ok(trimmed.to_string())
}

/// Application name from the repository URL: last path segment,
/// extension stripped.
pub fn derive_app_name(repo_url: &str) -> DeployResult<String> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(DeployError::InvalidInput(format!(
            "cannot derive an application name from {repo_url}"
        )));
    }
    Ok(name.to_string())
}
