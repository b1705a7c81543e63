// tests/unit/mod.rs

mod config_test;
mod models_test;
mod prompt_test;

use automation_suggester::models::EntityState;
use chrono::{DateTime, TimeZone, Utc};

// ============================================
// Shared Test Helpers
// ============================================

pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

pub fn entity(
    entity_id: &str,
    state: &str,
    attributes: serde_json::Value,
    updated: DateTime<Utc>,
) -> EntityState {
    EntityState {
        entity_id: entity_id.to_string(),
        state: state.to_string(),
        attributes: attributes.as_object().cloned().unwrap_or_default(),
        last_changed: updated,
        last_updated: updated,
    }
}
