use crate::backend::{NetworkOutcome, RuntimeBackend};
use crate::compose::{ComposeCommand, ComposeInvocation};
use crate::status::ContainerStatus;
use crate::RuntimeError;
use std::collections::BTreeSet;
use std::process::{Command, Output};
use tracing::debug;

/// Drives the `docker` CLI and the configured compose command.
pub struct DockerBackend {
    compose_program: String,
    compose_prefix: Vec<String>,
    docker: String,
}

impl DockerBackend {
    /// `compose_command` is the compose tool's argv prefix, e.g.
    /// `["docker", "compose"]` or `["docker-compose"]`.
    pub fn new(compose_command: Vec<String>) -> Result<Self, RuntimeError> {
        let mut parts = compose_command.into_iter();
        let compose_program = parts
            .next()
            .ok_or_else(|| RuntimeError::BackendUnavailable("empty compose command".to_owned()))?;
        Ok(Self {
            compose_program,
            compose_prefix: parts.collect(),
            docker: "docker".to_owned(),
        })
    }

    fn compose_cmd(&self, invocation: &ComposeInvocation, command: &ComposeCommand) -> Command {
        let mut cmd = Command::new(&self.compose_program);
        cmd.args(&self.compose_prefix);
        cmd.args(invocation.args(command));
        debug!("exec: {}", display_command(&cmd));
        cmd
    }

    fn docker_cmd<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.docker);
        cmd.args(args);
        debug!("exec: {}", display_command(&cmd));
        cmd
    }
}

fn display_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn spawn_error(cmd: &Command, source: std::io::Error) -> RuntimeError {
    RuntimeError::Spawn {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    }
}

/// Run with inherited stdio so the tool's own progress output reaches the
/// operator verbatim.
fn run_attached(mut cmd: Command) -> Result<(), RuntimeError> {
    let status = cmd.status().map_err(|e| spawn_error(&cmd, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(RuntimeError::CommandFailed {
            command: display_command(&cmd),
            detail: status.to_string(),
        })
    }
}

fn run_captured(mut cmd: Command) -> Result<Output, RuntimeError> {
    cmd.output().map_err(|e| spawn_error(&cmd, e))
}

/// `compose config --services` prints one service name per line.
fn parse_service_list(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {stderr}", output.status)
    }
}

impl RuntimeBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn compose(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<(), RuntimeError> {
        run_attached(self.compose_cmd(invocation, command))
    }

    fn compose_output(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<String, RuntimeError> {
        let cmd = self.compose_cmd(invocation, command);
        let display = display_command(&cmd);
        let output = run_captured(cmd)?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: display,
                detail: failure_detail(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn compose_interactive(
        &self,
        invocation: &ComposeInvocation,
        command: &ComposeCommand,
    ) -> Result<i32, RuntimeError> {
        let mut cmd = self.compose_cmd(invocation, command);
        let status = cmd.status().map_err(|e| spawn_error(&cmd, e))?;
        // Killed by a signal: report the conventional shell code.
        Ok(status.code().unwrap_or(128))
    }

    fn defined_services(
        &self,
        invocation: &ComposeInvocation,
    ) -> Result<Option<BTreeSet<String>>, RuntimeError> {
        let listing = self.compose_output(
            invocation,
            &ComposeCommand::Config {
                services_only: true,
            },
        )?;
        Ok(Some(parse_service_list(&listing)))
    }

    fn pull_image(&self, image_ref: &str) -> Result<(), RuntimeError> {
        run_attached(self.docker_cmd(["pull", image_ref]))
    }

    fn container_status(&self, container: &str) -> Result<ContainerStatus, RuntimeError> {
        let cmd = self.docker_cmd(["inspect", "--format", "{{json .State}}", container]);
        let display = display_command(&cmd);
        let output = run_captured(cmd)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_ascii_lowercase();
            if stderr.contains("no such") {
                return Ok(ContainerStatus::NotFound);
            }
            return Err(RuntimeError::CommandFailed {
                command: display,
                detail: failure_detail(&output),
            });
        }
        ContainerStatus::from_inspect_state(&String::from_utf8_lossy(&output.stdout))
    }

    fn ensure_network(&self, name: &str) -> Result<NetworkOutcome, RuntimeError> {
        let probe = run_captured(self.docker_cmd(["network", "inspect", name]))?;
        if probe.status.success() {
            return Ok(NetworkOutcome::AlreadyPresent);
        }
        let cmd = self.docker_cmd(["network", "create", name]);
        let display = display_command(&cmd);
        let created = run_captured(cmd)?;
        if !created.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: display,
                detail: failure_detail(&created),
            });
        }
        Ok(NetworkOutcome::Created)
    }
}
