//! Migration of the legacy two-valued mode vocabulary.
//!
//! Older state files recorded `"dev"` for services running from a local
//! checkout and `"prod"` for prebuilt images. These map one-to-one onto
//! `local` and `prebuilt`; nothing else in an entry is changed.

use crate::StoreError;
use bentoctl_schema::BuildVariant;
use serde_json::{Map, Value};

pub const LEGACY_MODE_DEV: &str = "dev";
pub const LEGACY_MODE_PROD: &str = "prod";

fn translate(mode: &str) -> Option<BuildVariant> {
    match mode {
        LEGACY_MODE_DEV => Some(BuildVariant::Local),
        LEGACY_MODE_PROD => Some(BuildVariant::Prebuilt),
        _ => None,
    }
}

/// Rewrite legacy mode names in place. Returns how many entries changed.
pub fn migrate_legacy_modes(services: &mut Map<String, Value>) -> Result<usize, StoreError> {
    let mut migrated = 0;
    for (service, entry) in services.iter_mut() {
        let obj = entry.as_object_mut().ok_or_else(|| {
            StoreError::Corrupt(format!("state for '{service}' is not a JSON object"))
        })?;
        let Some(mode) = obj.get("mode").and_then(Value::as_str) else {
            return Err(StoreError::Corrupt(format!(
                "state for '{service}' has no mode"
            )));
        };
        if let Some(variant) = translate(mode) {
            obj.insert("mode".to_owned(), Value::String(variant.to_string()));
            migrated += 1;
        }
    }
    Ok(migrated)
}
