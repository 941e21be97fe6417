use std::fmt;
use std::path::Path;

use crate::cmd::{Cmd, Shell, Target};
use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};

pub const BUILD_RECIPE: &str = "Dockerfile";

/// Composition descriptors, in lookup order.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// How the checked-out tree is turned into running containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A single image built from `Dockerfile`.
    Dockerfile,
    /// A multi-service composition file, by name.
    Compose(String),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dockerfile => f.write_str(BUILD_RECIPE),
            Self::Compose(file) => f.write_str(file),
        }
    }
}

/// Find the deployable artifact at the root of `dir`. A composition
/// file wins over a lone build recipe.
pub fn detect_artifact(dir: &Path) -> DeployResult<Artifact> {
    if let Some(file) = COMPOSE_FILES.iter().find(|f| dir.join(f).is_file()) {
        return Ok(Artifact::Compose((*file).to_string()));
    }
    if dir.join(BUILD_RECIPE).is_file() {
        return Ok(Artifact::Dockerfile);
    }
    Err(DeployError::ArtifactMissing(dir.display().to_string()))
}

/// Repository URL with the credential placed at the scheme
/// boundary. The result must never be logged or written to disk.
pub fn authenticated_url(repo_url: &str, credential: &str) -> DeployResult<String> {
    let (scheme, rest) = repo_url
        .split_once("://")
        .ok_or_else(|| DeployError::InvalidInput(format!("repository URL has no scheme: {repo_url}")))?;
    // Drop any userinfo already present in the authority.
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let rest = rest[..authority_end]
        .rfind('@')
        .map_or(rest, |at| &rest[at + 1..]);
    Ok(format!("{scheme}://{credential}@{rest}"))
}

/// Clone the repository, or fast-forward an existing checkout onto
/// the remote branch tip, then locate the deployable artifact.
pub fn synchronize(shell: &Shell<'_>, config: &DeploymentConfig) -> DeployResult<Artifact> {
    let dir = config.local_dir();
    let dir_str = dir.to_string_lossy().to_string();
    let secret = config.credential.expose();
    let auth_url = authenticated_url(&config.repo_url, secret)?;
    let log = shell.log();

    if dir.exists() {
        log.info(format!("Updating {dir_str} from {} ({})", config.repo_url, config.branch));

        let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", config.branch);
        let fetch = Cmd::new("git")
            .args(["fetch", "--prune", auth_url.as_str(), refspec.as_str()])
            .current_dir(&dir)
            .redacted(&format!("git fetch --prune {} {refspec}", config.repo_url));
        shell
            .required(Target::Local, &fetch)
            .map_err(|e| scrub(e, secret))?;

        let upstream = format!("origin/{}", config.branch);
        switch_branch(shell, &dir, &config.branch, &upstream)?;

        let rebase = Cmd::new("git")
            .args(["rebase", upstream.as_str()])
            .current_dir(&dir);
        shell.required(Target::Local, &rebase)?;
    } else {
        log.info(format!("Cloning {} ({}) into {dir_str}", config.repo_url, config.branch));

        let clone = Cmd::new("git")
            .args([
                "clone",
                "--branch",
                config.branch.as_str(),
                auth_url.as_str(),
                dir_str.as_str(),
            ])
            .redacted(&format!(
                "git clone --branch {} {} {dir_str}",
                config.branch, config.repo_url
            ));
        shell
            .required(Target::Local, &clone)
            .map_err(|e| scrub(e, secret))?;

        // git stores the clone URL in .git/config; put the plain one back.
        let reset_remote = Cmd::new("git")
            .args(["remote", "set-url", "origin", config.repo_url.as_str()])
            .current_dir(&dir);
        shell.required(Target::Local, &reset_remote)?;
    }

    let artifact = detect_artifact(&dir)?;
    log.info(format!("Deployable artifact: {artifact}"));
    Ok(artifact)
}

/// Put the checkout on `branch`, creating it from `upstream` when
/// the checkout has never been on it.
fn switch_branch(shell: &Shell<'_>, dir: &Path, branch: &str, upstream: &str) -> DeployResult<()> {
    let local_ref = format!("refs/heads/{branch}");
    let exists = Cmd::new("git")
        .args(["rev-parse", "--verify", "--quiet", local_ref.as_str()])
        .current_dir(dir);
    let checkout = if shell.check(Target::Local, &exists)? {
        Cmd::new("git").args(["checkout", branch])
    } else {
        Cmd::new("git").args(["checkout", "-b", branch, "--track", upstream])
    };
    shell.required(Target::Local, &checkout.current_dir(dir))?;
    Ok(())
}

fn scrub(err: DeployError, secret: &str) -> DeployError {
    match err {
        DeployError::CommandFailed {
            command,
            code,
            stderr,
        } => DeployError::CommandFailed {
            command,
            code,
            stderr: stderr.replace(secret, "***"),
        },
        other => other,
    }
}
