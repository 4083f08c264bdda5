use bentoctl_runtime::{ContainerStatus, NetworkOutcome};
use bentoctl_schema::{BaseMode, BuildVariant};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceFailure {
    pub service: String,
    /// The step that failed (`stop`, `clean`, `pull`, `run`, ...).
    pub step: String,
    pub error: String,
}

/// Per-service outcome of an operation over one or more services.
///
/// Fan-out operations keep going after a failure, so a report can hold
/// both successes and failures. A failed service's remaining steps were
/// skipped; nothing was rolled back.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FanOutReport {
    pub operation: String,
    pub target: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<ServiceFailure>,
}

impl FanOutReport {
    pub fn new(operation: &str, target: &str) -> Self {
        Self {
            operation: operation.to_owned(),
            target: target.to_owned(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeed(&mut self, service: &str) {
        self.succeeded.push(service.to_owned());
    }

    pub fn fail(&mut self, service: &str, step: &str, error: impl ToString) {
        self.failed.push(ServiceFailure {
            service: service.to_owned(),
            step: step.to_owned(),
            error: error.to_string(),
        });
    }

    pub fn is_failed(&self, service: &str) -> bool {
        self.failed.iter().any(|f| f.service == service)
    }
}

/// Recorded mode of one service, seen against the process's base mode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModeReport {
    pub service: String,
    pub mode: BuildVariant,
    pub base_mode: BaseMode,
    /// A local build inside a prod base run.
    pub mixed: bool,
}

impl ModeReport {
    pub fn new(service: &str, mode: BuildVariant, base_mode: BaseMode) -> Self {
        Self {
            service: service.to_owned(),
            mode,
            base_mode,
            mixed: mode == BuildVariant::Local && base_mode == BaseMode::Prod,
        }
    }
}

/// Live container status next to the recorded mode. Mismatches are shown,
/// never corrected.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub service: String,
    pub container: String,
    pub mode: BuildVariant,
    /// `None` when the container could not be inspected.
    pub status: Option<ContainerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NetworkReport {
    pub network: String,
    pub outcome: NetworkOutcome,
}
