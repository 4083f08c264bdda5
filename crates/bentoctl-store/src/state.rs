use bentoctl_schema::BuildVariant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of one service.
///
/// Fields other than `mode` are carried through untouched, so a state map
/// written by another version of the tool survives a round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceState {
    pub mode: BuildVariant,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ServiceState {
    pub fn new(mode: BuildVariant) -> Self {
        Self {
            mode,
            extra: BTreeMap::new(),
        }
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new(BuildVariant::Prebuilt)
    }
}

/// Service id to state, ordered by id so encodings are stable.
pub type ServiceStateMap = BTreeMap<String, ServiceState>;
