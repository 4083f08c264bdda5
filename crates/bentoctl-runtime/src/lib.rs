//! Process-level collaborators for bentoctl.
//!
//! This crate owns everything that shells out: the compose tool invocation
//! model (`ComposeInvocation` + `ComposeCommand`), the pluggable
//! `RuntimeBackend` trait with a `docker` CLI backend and a recording `mock`
//! backend, git access through `SourceControl`, live container status
//! classification, and prerequisite checking.

pub mod backend;
pub mod compose;
pub mod docker;
pub mod git;
pub mod mock;
pub mod prereq;
pub mod status;

pub use backend::{select_backend, select_source_control, NetworkOutcome, RuntimeBackend};
pub use compose::{ComposeCommand, ComposeInvocation};
pub use git::{clone_url, GitCli, SourceControl};
pub use mock::{MockBackend, MockCall, MockSourceControl};
pub use prereq::{check_git_prereqs, check_runtime_prereqs, format_missing, MissingPrereq};
pub use status::ContainerStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command '{command}' failed: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("unexpected output from '{command}': {detail}")]
    InvalidOutput { command: String, detail: String },
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_names_the_command() {
        let err = RuntimeError::CommandFailed {
            command: "docker compose stop katsu".to_owned(),
            detail: "exit status: 1".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("docker compose stop katsu"));
        assert!(msg.contains("exit status: 1"));
    }

    #[test]
    fn spawn_failure_keeps_source() {
        let err = RuntimeError::Spawn {
            program: "git".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("git"));
    }
}
