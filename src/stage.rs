use crate::error::{DeployError, DeployResult};

/// What a stage reports when it did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Finished, but a non-essential check failed.
    Degraded(String),
}

/// Result of one pipeline stage, as seen by the controller.
#[derive(Debug)]
pub enum StageResult {
    Success,
    SoftFailure(String),
    Fatal(DeployError),
}

impl From<DeployResult<Outcome>> for StageResult {
    fn from(result: DeployResult<Outcome>) -> Self {
        match result {
            Ok(Outcome::Done) => Self::Success,
            Ok(Outcome::Degraded(reason)) => Self::SoftFailure(reason),
            Err(e) => Self::Fatal(e),
        }
    }
}
