use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live state of a service's container, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    RunningHealthy,
    RunningStarting,
    RunningUnhealthy,
    NotRunning,
    NotFound,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    restarting: bool,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

impl ContainerStatus {
    /// Classify the `.State` object of `docker inspect`.
    ///
    /// A running container without a health check counts as healthy.
    pub fn from_inspect_state(json: &str) -> Result<Self, RuntimeError> {
        let state: InspectState =
            serde_json::from_str(json.trim()).map_err(|e| RuntimeError::InvalidOutput {
                command: "docker inspect".to_owned(),
                detail: e.to_string(),
            })?;

        if !state.running {
            return Ok(Self::NotRunning);
        }
        if state.restarting {
            return Ok(Self::RunningStarting);
        }
        Ok(match state.health.as_ref().map(|h| h.status.as_str()) {
            Some("starting") => Self::RunningStarting,
            Some("unhealthy") => Self::RunningUnhealthy,
            _ => Self::RunningHealthy,
        })
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RunningHealthy => "running (healthy)",
            Self::RunningStarting => "running (starting)",
            Self::RunningUnhealthy => "running (unhealthy)",
            Self::NotRunning => "not running",
            Self::NotFound => "not found",
        })
    }
}
