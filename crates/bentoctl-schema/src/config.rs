use crate::features::FeatureSet;
use crate::types::BaseMode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub const VAR_MODE: &str = "MODE";
pub const VAR_SERVICES: &str = "BENTO_SERVICES";
pub const VAR_STATE_DB: &str = "BENTO_ORCHESTRATION_STATE_DB";
pub const VAR_COMPOSE_FILE_BASE: &str = "BENTO_COMPOSE_FILE_BASE";
pub const VAR_COMPOSE_FILE_DEV: &str = "BENTO_COMPOSE_FILE_DEV";
pub const VAR_COMPOSE_FILE_PROD: &str = "BENTO_COMPOSE_FILE_PROD";
pub const VAR_COMPOSE_FILE_LOCAL: &str = "BENTO_COMPOSE_FILE_LOCAL";
pub const VAR_REPOS_DIR: &str = "BENTO_REPOS_DIR";
pub const VAR_GIT_CLONE_HTTPS: &str = "BENTO_GIT_CLONE_HTTPS";
pub const VAR_DOCKER_NETWORKS: &str = "BENTO_DOCKER_NETWORKS";
pub const VAR_COMPOSE_COMMAND: &str = "BENTOCTL_COMPOSE";
pub const VAR_RUNTIME: &str = "BENTOCTL_RUNTIME";
pub const VAR_SKIP_PREREQS: &str = "BENTOCTL_SKIP_PREREQS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVariable(String),
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
}

/// Snapshot of environment variables, taken once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.vars.get(var).map(String::as_str)
    }

    /// Look up a variable that an operation cannot proceed without.
    /// Empty values count as missing.
    pub fn require(&self, var: &str) -> Result<&str, ConfigError> {
        match self.get(var) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingVariable(var.to_owned())),
        }
    }

    pub fn get_bool(&self, var: &str, default: bool) -> bool {
        match self.get(var) {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"),
            None => default,
        }
    }

    fn path_or(&self, var: &str, default: &str) -> PathBuf {
        PathBuf::from(
            self.get(var)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default),
        )
    }
}

/// Compose files that are always present or selected by base mode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComposeFragments {
    pub base: PathBuf,
    pub dev: PathBuf,
    pub prod: PathBuf,
    pub local: PathBuf,
}

/// Immutable deployment configuration, built once and passed into every
/// component constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_mode: BaseMode,
    pub catalog_path: PathBuf,
    pub state_path: PathBuf,
    pub fragments: ComposeFragments,
    pub features: FeatureSet,
    pub repos_dir: PathBuf,
    pub git_clone_https: bool,
    pub networks: Vec<String>,
    pub compose_command: Vec<String>,
    pub runtime_backend: String,
    pub skip_prereqs: bool,
    env: Environment,
}

impl Config {
    pub fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let compose_command: Vec<String> = match env.get(VAR_COMPOSE_COMMAND) {
            Some(raw) => {
                let parts: Vec<String> = raw.split_whitespace().map(str::to_owned).collect();
                if parts.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        var: VAR_COMPOSE_COMMAND.to_owned(),
                        value: raw.to_owned(),
                        reason: "compose command must not be empty".to_owned(),
                    });
                }
                parts
            }
            None => vec!["docker".to_owned(), "compose".to_owned()],
        };

        let runtime_backend = env
            .get(VAR_RUNTIME)
            .map_or("docker", str::trim)
            .to_owned();

        Ok(Self {
            base_mode: BaseMode::from_mode_var(env.get(VAR_MODE)),
            catalog_path: env.path_or(VAR_SERVICES, "./etc/bento_services.json"),
            state_path: env.path_or(VAR_STATE_DB, "./.bentoctl.state.db"),
            fragments: ComposeFragments {
                base: env.path_or(VAR_COMPOSE_FILE_BASE, "./docker-compose.yaml"),
                dev: env.path_or(VAR_COMPOSE_FILE_DEV, "./docker-compose.dev.yaml"),
                prod: env.path_or(VAR_COMPOSE_FILE_PROD, "./docker-compose.prod.yaml"),
                local: env.path_or(VAR_COMPOSE_FILE_LOCAL, "./docker-compose.local.yaml"),
            },
            features: FeatureSet::from_environment(&env),
            repos_dir: env.path_or(VAR_REPOS_DIR, "./repos"),
            git_clone_https: env.get_bool(VAR_GIT_CLONE_HTTPS, false),
            networks: env
                .get(VAR_DOCKER_NETWORKS)
                .map(|v| v.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
            compose_command,
            runtime_backend,
            skip_prereqs: env.get_bool(VAR_SKIP_PREREQS, false),
            env,
        })
    }

    /// The environment snapshot this configuration was built from; image
    /// repository and tag variables are resolved against it.
    pub fn env(&self) -> &Environment {
        &self.env
    }
}
