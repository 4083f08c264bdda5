use crate::migration::migrate_legacy_modes;
use crate::reconcile::{reconcile, Reconciliation};
use crate::state::ServiceStateMap;
use crate::StoreError;
use bentoctl_schema::ServiceCatalog;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key of the row holding the JSON-encoded service state map.
pub const SERVICES_KEY: &str = "services";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kvstore (k TEXT PRIMARY KEY, v TEXT);";

/// File-backed store of per-service deployment modes.
///
/// There is no advisory locking. Two invocations running at once each get
/// an atomic read-modify-write, but whichever commits last wins.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    catalog_ids: BTreeSet<String>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, catalog: &ServiceCatalog) -> Self {
        Self::with_ids(path, catalog.ids())
    }

    pub fn with_ids<I, S>(path: impl Into<PathBuf>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            catalog_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store, creating it if absent, and return the reconciled map.
    pub fn open(&self) -> Result<ServiceStateMap, StoreError> {
        self.open_with_report().map(|(map, _)| map)
    }

    /// Like [`open`](Self::open), also reporting what was reconciled or
    /// migrated. Any change is persisted before returning.
    pub fn open_with_report(&self) -> Result<(ServiceStateMap, Reconciliation), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA)?;

        let raw = get_value(&tx, SERVICES_KEY)?;
        let mut services = match raw.as_deref() {
            Some(encoded) => decode(encoded)?,
            None => Map::new(),
        };

        let migrated = migrate_legacy_modes(&mut services)?;
        if migrated > 0 {
            if let Some(original) = raw.as_deref() {
                let backup_key = format!(
                    "{SERVICES_KEY}.legacy-backup.{}",
                    chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
                );
                put_value(&tx, &backup_key, original)?;
                info!("migrated {migrated} legacy service modes (backup in '{backup_key}')");
            }
        }

        let mut map: ServiceStateMap = serde_json::from_value(Value::Object(services))
            .map_err(|e| StoreError::Corrupt(format!("invalid service state: {e}")))?;
        let mut report = reconcile(&mut map, &self.catalog_ids);
        report.migrated = migrated;

        let encoded = serde_json::to_string(&map)?;
        if raw.as_deref() != Some(encoded.as_str()) {
            put_value(&tx, SERVICES_KEY, &encoded)?;
            debug!(
                "persisted reconciled state ({} added, {} removed)",
                report.added.len(),
                report.removed.len()
            );
        }
        tx.commit()?;

        Ok((map, report))
    }

    /// Replace the persisted map in one transaction and return it after the
    /// same reconciliation `open` performs.
    pub fn write(&self, map: &ServiceStateMap) -> Result<ServiceStateMap, StoreError> {
        let mut reconciled = map.clone();
        let report = reconcile(&mut reconciled, &self.catalog_ids);
        if !report.is_noop() {
            debug!(
                "write reconciled {} added, {} removed",
                report.added.len(),
                report.removed.len()
            );
        }
        let encoded = serde_json::to_string(&reconciled)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA)?;
        put_value(&tx, SERVICES_KEY, &encoded)?;
        tx.commit()?;

        Ok(reconciled)
    }

    /// The encoded services row exactly as stored, if any.
    pub fn raw_services(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        let raw = get_value(&tx, SERVICES_KEY)?;
        tx.commit()?;
        Ok(raw)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Connection::open(&self.path)?)
    }
}

fn decode(encoded: &str) -> Result<Map<String, Value>, StoreError> {
    let value: Value = serde_json::from_str(encoded)
        .map_err(|e| StoreError::Corrupt(format!("services entry is not valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Corrupt(
            "services entry is not a JSON object".to_owned(),
        )),
    }
}

fn get_value(tx: &Transaction<'_>, key: &str) -> Result<Option<String>, StoreError> {
    let value: Option<Option<String>> = tx
        .query_row(
            "SELECT v FROM kvstore WHERE k = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.flatten())
}

// Older state files created the table without a primary key, so upsert by
// hand instead of relying on ON CONFLICT.
fn put_value(tx: &Transaction<'_>, key: &str, value: &str) -> Result<(), StoreError> {
    let updated = tx.execute("UPDATE kvstore SET v = ?1 WHERE k = ?2", params![value, key])?;
    if updated == 0 {
        tx.execute(
            "INSERT INTO kvstore (k, v) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }
    Ok(())
}
