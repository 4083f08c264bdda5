use crate::backend::{NetworkOutcome, RuntimeBackend};
use crate::compose::{ComposeCommand, ComposeInvocation};
use crate::git::SourceControl;
use crate::status::ContainerStatus;
use crate::RuntimeError;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// One call made against a mock collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Compose {
        invocation: ComposeInvocation,
        command: ComposeCommand,
    },
    PullImage(String),
    Inspect(String),
    EnsureNetwork(String),
    Clone { url: String, dest: PathBuf },
    FetchTags(PathBuf),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    failing_services: BTreeSet<String>,
    failing_images: BTreeSet<String>,
    failing_inspects: BTreeSet<String>,
    statuses: HashMap<String, ContainerStatus>,
    networks: BTreeSet<String>,
    defined: Option<BTreeSet<String>>,
}

/// In-memory runtime that records calls instead of running processes.
///
/// Clones share state, so a test can keep one handle and give another to
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

fn poisoned<T>(e: &std::sync::PoisonError<T>) -> RuntimeError {
    RuntimeError::ExecFailed(format!("mutex poisoned: {e}"))
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state.lock().map_err(|e| poisoned(&e))
    }

    /// Make every compose call addressing `service` exit nonzero.
    pub fn fail_service(&self, service: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_services.insert(service.to_owned());
        }
    }

    pub fn fail_image(&self, image_ref: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_images.insert(image_ref.to_owned());
        }
    }

    /// Make inspecting `container` fail the way an unreachable daemon does.
    pub fn fail_inspect(&self, container: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_inspects.insert(container.to_owned());
        }
    }

    pub fn set_status(&self, container: &str, status: ContainerStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.statuses.insert(container.to_owned(), status);
        }
    }

    /// Restrict the services the compose files define. Without this every
    /// catalog service counts as defined.
    pub fn define_services(&self, services: &[&str]) {
        if let Ok(mut state) = self.state.lock() {
            state.defined = Some(services.iter().map(|s| (*s).to_owned()).collect());
        }
    }

    pub fn add_network(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.networks.insert(name.to_owned());
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Only the compose calls, in order.
    pub fn compose_calls(&self) -> Vec<(ComposeInvocation, ComposeCommand)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Compose {
                    invocation,
                    command,
                } => Some((invocation, command)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    fn record_compose(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::Compose {
            invocation: invocation.clone(),
            command: command.clone(),
        });
        if let Some(failing) = command
            .services()
            .into_iter()
            .find(|s| state.failing_services.contains(*s))
        {
            return Err(RuntimeError::CommandFailed {
                command: format!("mock compose {}", command.args().join(" ")),
                detail: format!("service '{failing}' is set to fail"),
            });
        }
        Ok(())
    }
}

impl RuntimeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn compose(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<(), RuntimeError> {
        self.record_compose(invocation, command)
    }

    fn compose_output(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<String, RuntimeError> {
        self.record_compose(invocation, command)?;
        Ok(format!("mock-compose: {}\n", invocation.args(command).join(" ")))
    }

    fn compose_interactive(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<i32, RuntimeError> {
        self.record_compose(invocation, command)?;
        Ok(0)
    }

    fn pull_image(&self, image_ref: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::PullImage(image_ref.to_owned()));
        if state.failing_images.contains(image_ref) {
            return Err(RuntimeError::CommandFailed {
                command: format!("mock pull {image_ref}"),
                detail: "manifest unknown".to_owned(),
            });
        }
        Ok(())
    }

    fn defined_services(
        &self,
        _invocation: &ComposeInvocation,
    ) -> Result<Option<BTreeSet<String>>, RuntimeError> {
        Ok(self.lock()?.defined.clone())
    }

    fn container_status(&self, container: &str) -> Result<ContainerStatus, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::Inspect(container.to_owned()));
        if state.failing_inspects.contains(container) {
            return Err(RuntimeError::CommandFailed {
                command: format!("mock inspect {container}"),
                detail: "cannot connect to the container daemon".to_owned(),
            });
        }
        Ok(state
            .statuses
            .get(container)
            .copied()
            .unwrap_or(ContainerStatus::NotFound))
    }

    fn ensure_network(&self, name: &str) -> Result<NetworkOutcome, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::EnsureNetwork(name.to_owned()));
        if state.networks.insert(name.to_owned()) {
            Ok(NetworkOutcome::Created)
        } else {
            Ok(NetworkOutcome::AlreadyPresent)
        }
    }
}

/// Source control that materializes an empty checkout directory on clone.
#[derive(Debug, Clone, Default)]
pub struct MockSourceControl {
    calls: Arc<Mutex<Vec<MockCall>>>,
    fail: bool,
}

impl MockSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source control whose every operation fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: MockCall) -> Result<(), RuntimeError> {
        self.calls.lock().map_err(|e| poisoned(&e))?.push(call);
        if self.fail {
            return Err(RuntimeError::CommandFailed {
                command: "mock git".to_owned(),
                detail: "set to fail".to_owned(),
            });
        }
        Ok(())
    }
}

impl SourceControl for MockSourceControl {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RuntimeError> {
        self.record(MockCall::Clone {
            url: url.to_owned(),
            dest: dest.to_path_buf(),
        })?;
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(".bentoctl-mock-clone"), url)?;
        Ok(())
    }

    fn fetch_tags(&self, repo: &Path) -> Result<(), RuntimeError> {
        self.record(MockCall::FetchTags(repo.to_path_buf()))
    }
}
