//! Pure diff between what the engine holds and what the store wants.
//!
//! [`plan`] has no side effects; the driver applies its result by calling
//! the factory. Keeping the decision separate makes it testable without any
//! handles at all.

use std::collections::{BTreeMap, HashSet};

use crate::model::{ConnectionParams, InstanceConfig, InstanceId};

/// What one reconciliation pass will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Held ids to release: gone, disabled, or built from stale params.
    pub retire: Vec<InstanceId>,
    /// Enabled records to build, in snapshot order.
    pub create: Vec<InstanceConfig>,
    /// Held ids whose fingerprint still matches.
    pub keep: Vec<InstanceId>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.retire.is_empty() && self.create.is_empty()
    }
}

/// Compute the retire/create/keep sets.
///
/// Disabled records count as absent. If a snapshot lists the same id twice
/// only the first occurrence is considered.
pub fn plan(
    previous: &BTreeMap<InstanceId, ConnectionParams>,
    desired: &[InstanceConfig],
) -> ReconcilePlan {
    let mut seen = HashSet::new();
    let wanted: Vec<&InstanceConfig> = desired
        .iter()
        .filter(|c| c.enabled && seen.insert(&c.id))
        .collect();

    let mut out = ReconcilePlan::default();

    for (id, fingerprint) in previous {
        let still_wanted = wanted
            .iter()
            .any(|c| &c.id == id && &c.params == fingerprint);
        if still_wanted {
            out.keep.push(id.clone());
        } else {
            out.retire.push(id.clone());
        }
    }

    out.create = wanted
        .into_iter()
        .filter(|c| !out.keep.contains(&c.id))
        .cloned()
        .collect();

    out
}
