pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("command failed (exit {code}): {command}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no deployable artifact found in {0}")]
    ArtifactMissing(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("container '{name}' is not running (state: {state})")]
    ContainerNotRunning { name: String, state: String },

    #[error("nginx configuration test failed: {0}")]
    ProxyConfigInvalid(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<DeployError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Attach the name of the pipeline stage that raised this error.
    #[must_use]
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Exit code of the underlying command, when there is one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => Some(*code),
            Self::Stage { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}
