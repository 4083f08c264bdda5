use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn docker_compose_plugin_works() -> bool {
    Command::new("docker")
        .args(["compose", "version"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the container runtime and the configured compose command.
/// Empty list means all prerequisites are met.
pub fn check_runtime_prereqs(compose_command: &[String]) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("docker") {
        missing.push(MissingPrereq {
            name: "docker".to_owned(),
            purpose: "container runtime",
            install_hint: "https://docs.docker.com/engine/install/",
        });
    }

    match compose_command {
        [program, sub, ..] if program == "docker" && sub == "compose" => {
            if missing.is_empty() && !docker_compose_plugin_works() {
                missing.push(MissingPrereq {
                    name: "docker compose".to_owned(),
                    purpose: "multi-service deployment",
                    install_hint: "install the Docker Compose v2 plugin",
                });
            }
        }
        [program, ..] if program != "docker" && !command_exists(program) => {
            missing.push(MissingPrereq {
                name: program.clone(),
                purpose: "multi-service deployment (BENTOCTL_COMPOSE)",
                install_hint: "install it or point BENTOCTL_COMPOSE at an installed tool",
            });
        }
        _ => {}
    }

    missing
}

/// Check what `work-on` needs to clone service sources.
pub fn check_git_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists("git") {
        missing.push(MissingPrereq {
            name: "git".to_owned(),
            purpose: "cloning service repositories",
            install_hint: "apt install git | dnf install git | brew install git",
        });
    }
    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nbentoctl drives these tools; set BENTOCTL_SKIP_PREREQS=1 to bypass this check.");
    msg
}
