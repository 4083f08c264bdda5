use crate::state::{ServiceState, ServiceStateMap};
use bentoctl_schema::BuildVariant;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// What reconciliation and migration changed while opening or writing state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub added: Vec<String>,
    pub removed: Vec<(String, BuildVariant)>,
    pub migrated: usize,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.migrated == 0
    }
}

/// Make the key set of `map` exactly `catalog_ids`: missing services get the
/// default prebuilt state, services no longer in the catalog are dropped.
pub fn reconcile(map: &mut ServiceStateMap, catalog_ids: &BTreeSet<String>) -> Reconciliation {
    let mut report = Reconciliation::default();

    let orphans: Vec<String> = map
        .keys()
        .filter(|id| !catalog_ids.contains(*id))
        .cloned()
        .collect();
    for id in orphans {
        if let Some(state) = map.remove(&id) {
            if state.mode == BuildVariant::Local {
                warn!("dropping local-mode state for '{id}': service is no longer in the catalog");
            } else {
                info!("dropping state for '{id}': service is no longer in the catalog");
            }
            report.removed.push((id, state.mode));
        }
    }

    for id in catalog_ids {
        if !map.contains_key(id) {
            map.insert(id.clone(), ServiceState::default());
            report.added.push(id.clone());
        }
    }

    report
}
