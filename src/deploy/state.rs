use serde::Deserialize;

use crate::error::DeployResult;

/// `.State` of `docker inspect`, reduced to what readiness needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub health: Option<HealthState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthState {
    pub status: String,
}

impl ContainerState {
    /// Parse the output of `docker inspect --format '{{json .State}}'`.
    pub fn parse(json: &str) -> DeployResult<Self> {
        Ok(serde_json::from_str(json.trim())?)
    }

    /// Ready when either the lifecycle status or the healthcheck
    /// status is one of `accepted`.
    #[must_use]
    pub fn is_ready(&self, accepted: &[String]) -> bool {
        let matches = |s: &str| accepted.iter().any(|a| a.eq_ignore_ascii_case(s));
        matches(&self.status) || self.health.as_ref().is_some_and(|h| matches(&h.status))
    }

    /// Short human-readable form, e.g. `running (healthy)`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.health {
            Some(h) => format!("{} ({})", self.status, h.status),
            None => self.status.clone(),
        }
    }
}
