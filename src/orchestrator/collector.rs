use std::collections::BTreeMap;

use crate::models::{EntityRecord, EntityState};

/// Project the live entity set into a snapshot plus a broken list.
///
/// Entities in `unavailable`/`unknown` state never enter the snapshot;
/// they are tracked separately so the prompt can ask for repairs. When
/// `domains` is non-empty, entities outside the allow-list are skipped
/// entirely. Pure: no I/O, no side effects.
pub fn collect_snapshot(
    states: &[EntityState],
    domains: &[String],
) -> (BTreeMap<String, EntityRecord>, Vec<String>) {
    let mut snapshot = BTreeMap::new();
    let mut broken = Vec::new();

    for state in states {
        if !domains.is_empty() && !domains.iter().any(|d| d == state.domain()) {
            continue;
        }
        if state.state == "unavailable" || state.state == "unknown" {
            broken.push(state.entity_id.clone());
            continue;
        }
        snapshot.insert(state.entity_id.clone(), EntityRecord::from_state(state));
    }

    broken.sort();
    (snapshot, broken)
}
