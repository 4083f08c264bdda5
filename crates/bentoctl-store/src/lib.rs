//! Durable deployment state for bentoctl.
//!
//! The `StateStore` keeps one SQLite row holding the JSON-encoded map of
//! service id to `ServiceState`. Every open and every write is a single
//! read-modify-write transaction that reconciles the map against the current
//! service catalog and migrates the legacy `dev`/`prod` mode vocabulary, so the
//! persisted map never contains orphaned or missing services.

pub mod migration;
pub mod reconcile;
pub mod state;
pub mod store;

pub use migration::{migrate_legacy_modes, LEGACY_MODE_DEV, LEGACY_MODE_PROD};
pub use reconcile::{reconcile, Reconciliation};
pub use state::{ServiceState, ServiceStateMap};
pub use store::{StateStore, SERVICES_KEY};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("state is corrupted: {0}")]
    Corrupt(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// The state file exists but its contents are unusable, as opposed to
    /// the file being unreachable.
    pub fn is_corruption(&self) -> bool {
        match self {
            StoreError::Corrupt(_) | StoreError::Serialization(_) => true,
            StoreError::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::NotADatabase | rusqlite::ErrorCode::DatabaseCorrupt)
            ),
            StoreError::Io(_) => false,
        }
    }
}
