use crate::compose::{ComposeCommand, ComposeInvocation};
use crate::git::{GitCli, SourceControl};
use crate::status::ContainerStatus;
use crate::RuntimeError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of making sure a container network exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkOutcome {
    Created,
    AlreadyPresent,
}

/// The compose tool and container runtime, as seen by the engine.
///
/// Every call runs to completion; there is no cancellation or timeout.
pub trait RuntimeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run a compose subcommand with the operator's terminal attached to
    /// its output. A nonzero exit is `CommandFailed`.
    fn compose(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<(), RuntimeError>;

    /// Run a compose subcommand and capture its standard output.
    fn compose_output(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<String, RuntimeError>;

    /// Run an interactive compose subcommand (a shell) and return its exit
    /// code instead of treating nonzero as failure.
    fn compose_interactive(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<i32, RuntimeError>;

    /// Services defined by the merged compose files of `invocation`, or
    /// `None` when the backend cannot enumerate them.
    fn defined_services(
        &self,
        invocation: &ComposeInvocation,
    ) -> Result<Option<BTreeSet<String>>, RuntimeError>;

    /// Fetch `image_ref` (`repository:tag`) into the local image cache.
    fn pull_image(&self, image_ref: &str) -> Result<(), RuntimeError>;

    fn container_status(&self, container: &str) -> Result<ContainerStatus, RuntimeError>;

    /// Look a network up by name and create it if absent.
    fn ensure_network(&self, name: &str) -> Result<NetworkOutcome, RuntimeError>;
}

pub fn select_backend(
    name: &str,
    compose_command: &[String],
) -> Result<Box<dyn RuntimeBackend>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerBackend::new(
            compose_command.to_vec(),
        )?)),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

/// Source control to pair with the named runtime backend.
pub fn select_source_control(runtime: &str) -> Box<dyn SourceControl> {
    match runtime {
        "mock" => Box::new(crate::mock::MockSourceControl::new()),
        _ => Box::new(GitCli::new()),
    }
}
