//! Core orchestration engine for bentoctl.
//!
//! This crate ties together the service catalog, the deployment state store,
//! and the runtime backends into the `Engine`, the API for running, stopping,
//! cleaning, pulling, and switching services between prebuilt and local
//! builds. It also provides the `ManifestComposer` that turns the enabled
//! features and base mode into a compose invocation.

pub mod composer;
pub mod engine;
pub mod lifecycle;
pub mod report;

pub use composer::ManifestComposer;
pub use engine::{Engine, RunOptions};
pub use lifecycle::{validate_transition, Transition};
pub use report::{FanOutReport, ModeReport, NetworkReport, ServiceFailure, StatusReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("catalog error: {0}")]
    Catalog(#[from] bentoctl_schema::CatalogError),
    #[error("configuration error: {0}")]
    Config(#[from] bentoctl_schema::ConfigError),
    #[error("state error: {0}")]
    Store(#[from] bentoctl_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] bentoctl_runtime::RuntimeError),
    #[error("'{target}' cannot be used with {operation}: it names {detail}")]
    InvalidTarget {
        operation: String,
        target: String,
        detail: String,
    },
    #[error("service '{0}' has no source repository configured")]
    NoRepository(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`CoreError`], used to pick exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownService,
    NoDevVariant,
    /// Configuration absent or malformed: environment variables and the
    /// catalog document.
    MissingConfiguration,
    ExternalProcess,
    StateCorruption,
    InvalidTarget,
    Io,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        use bentoctl_runtime::RuntimeError;
        use bentoctl_schema::CatalogError;

        match self {
            CoreError::Catalog(
                CatalogError::UnknownService { .. }
                | CatalogError::NotEnabled { .. }
                | CatalogError::NotDefined(_),
            ) => ErrorKind::UnknownService,
            CoreError::Catalog(CatalogError::NoDevVariant(_)) => ErrorKind::NoDevVariant,
            CoreError::Catalog(_) | CoreError::Config(_) | CoreError::NoRepository(_) => {
                ErrorKind::MissingConfiguration
            }
            CoreError::Store(e) if e.is_corruption() => ErrorKind::StateCorruption,
            CoreError::Store(_) | CoreError::Runtime(RuntimeError::Io(_)) | CoreError::Io(_) => {
                ErrorKind::Io
            }
            CoreError::Runtime(_) => ErrorKind::ExternalProcess,
            CoreError::InvalidTarget { .. } => ErrorKind::InvalidTarget,
        }
    }
}
