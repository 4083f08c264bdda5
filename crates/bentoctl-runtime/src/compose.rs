use bentoctl_schema::BaseMode;
use serde::Serialize;
use std::path::PathBuf;

/// The file and profile flags handed to the compose tool for one operation.
///
/// Built fresh for every call from the enabled features, the base mode and
/// whether the local overlay applies; never cached or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeInvocation {
    pub fragments: Vec<PathBuf>,
    pub profiles: Vec<String>,
    pub base_mode: BaseMode,
    pub local_overlay: bool,
}

impl ComposeInvocation {
    /// `-f <fragment>...` followed by `--profile <name>...`.
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2 * (self.fragments.len() + self.profiles.len()));
        for fragment in &self.fragments {
            args.push("-f".to_owned());
            args.push(fragment.display().to_string());
        }
        for profile in &self.profiles {
            args.push("--profile".to_owned());
            args.push(profile.clone());
        }
        args
    }

    /// Full argument list (after the compose program) for `command`.
    pub fn args(&self, command: &ComposeCommand) -> Vec<String> {
        let mut args = self.global_args();
        args.extend(command.args());
        args
    }
}

/// A compose subcommand. Empty service lists address every service in
/// the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "subcommand", rename_all = "kebab-case")]
pub enum ComposeCommand {
    Up {
        services: Vec<String>,
        force_recreate: bool,
    },
    Down,
    Stop {
        services: Vec<String>,
    },
    /// `rm -svf`: stop, remove anonymous volumes, no prompt.
    Remove {
        services: Vec<String>,
    },
    Pull {
        services: Vec<String>,
    },
    Logs {
        services: Vec<String>,
        follow: bool,
    },
    Config {
        services_only: bool,
    },
    Exec {
        service: String,
        command: Vec<String>,
    },
    Run {
        service: String,
        command: Vec<String>,
    },
}

impl ComposeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Up { .. } => "up",
            Self::Down => "down",
            Self::Stop { .. } => "stop",
            Self::Remove { .. } => "rm",
            Self::Pull { .. } => "pull",
            Self::Logs { .. } => "logs",
            Self::Config { .. } => "config",
            Self::Exec { .. } => "exec",
            Self::Run { .. } => "run",
        }
    }

    /// Services this command addresses explicitly.
    pub fn services(&self) -> Vec<&str> {
        match self {
            Self::Up { services, .. }
            | Self::Stop { services }
            | Self::Remove { services }
            | Self::Pull { services }
            | Self::Logs { services, .. } => services.iter().map(String::as_str).collect(),
            Self::Exec { service, .. } | Self::Run { service, .. } => vec![service.as_str()],
            Self::Down | Self::Config { .. } => Vec::new(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_owned()];
        match self {
            Self::Up {
                services,
                force_recreate,
            } => {
                args.push("-d".to_owned());
                if *force_recreate {
                    args.push("--force-recreate".to_owned());
                }
                args.extend(services.iter().cloned());
            }
            Self::Down => {}
            Self::Stop { services } | Self::Pull { services } => {
                args.extend(services.iter().cloned());
            }
            Self::Remove { services } => {
                args.push("-svf".to_owned());
                args.extend(services.iter().cloned());
            }
            Self::Logs { services, follow } => {
                if *follow {
                    args.push("-f".to_owned());
                }
                args.extend(services.iter().cloned());
            }
            Self::Config { services_only } => {
                if *services_only {
                    args.push("--services".to_owned());
                }
            }
            Self::Exec { service, command } => {
                args.push("-it".to_owned());
                args.push(service.clone());
                args.extend(command.iter().cloned());
            }
            Self::Run { service, command } => {
                args.push(service.clone());
                args.extend(command.iter().cloned());
            }
        }
        args
    }
}
