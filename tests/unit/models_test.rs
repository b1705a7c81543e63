use automation_suggester::models::{suggestion_id, EntityState, Suggestion, SUGGESTION_ID_LEN};
use serde_json::json;

use crate::ts;

#[test]
fn suggestion_ids_are_stable_truncated_hex() {
    let id = suggestion_id("Morning lights", ts(0));

    assert_eq!(id.len(), SUGGESTION_ID_LEN);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(id, suggestion_id("Morning lights", ts(0)));
}

#[test]
fn suggestion_ids_vary_with_title_and_time() {
    let base = suggestion_id("Morning lights", ts(0));

    assert_ne!(base, suggestion_id("Evening lights", ts(0)));
    assert_ne!(base, suggestion_id("Morning lights", ts(1)));
}

#[test]
fn blueprint_detection_checks_kind_and_yaml() {
    let mut s = Suggestion {
        suggestion_id: "abc123def0".to_string(),
        title: "Motion light".to_string(),
        description: String::new(),
        kind: "new".to_string(),
        yaml: "alias: Motion light\n".to_string(),
        timestamp: ts(0),
    };
    assert!(!s.is_blueprint());

    s.kind = "blueprint".to_string();
    assert!(s.is_blueprint());

    // yaml content alone marks a blueprint even with a plain kind
    s.kind = "new".to_string();
    s.yaml = "blueprint:\n  name: Motion light\n".to_string();
    assert!(s.is_blueprint());
}

#[test]
fn suggestions_serialize_kind_as_type() {
    let s = Suggestion {
        suggestion_id: "abc123def0".to_string(),
        title: "T".to_string(),
        description: "d".to_string(),
        kind: "fix".to_string(),
        yaml: String::new(),
        timestamp: ts(0),
    };

    let value = serde_json::to_value(&s).unwrap();
    assert_eq!(value["type"], "fix");
    assert!(value.get("kind").is_none());
}

#[test]
fn suggestions_deserialize_with_missing_optional_fields() {
    let raw = json!({
        "suggestion_id": "abc123def0",
        "title": "T",
        "timestamp": "2023-11-14T22:13:20Z"
    });

    let s: Suggestion = serde_json::from_value(raw).unwrap();

    assert_eq!(s.description, "");
    assert_eq!(s.kind, "");
    assert_eq!(s.yaml, "");
}

#[test]
fn entity_state_parses_the_states_api_shape() {
    let raw = json!({
        "entity_id": "light.kitchen",
        "state": "on",
        "attributes": {"friendly_name": "Kitchen", "brightness": 200},
        "last_changed": "2023-11-14T22:13:20Z",
        "last_updated": "2023-11-14T22:13:25Z"
    });

    let state: EntityState = serde_json::from_value(raw).unwrap();

    assert_eq!(state.entity_id, "light.kitchen");
    assert_eq!(state.domain(), "light");
    assert_eq!(state.attributes["brightness"], 200);
    assert!(state.last_updated > state.last_changed);
}

#[test]
fn entity_state_tolerates_missing_attributes() {
    let raw = json!({
        "entity_id": "sun.sun",
        "state": "above_horizon",
        "last_changed": "2023-11-14T22:13:20Z",
        "last_updated": "2023-11-14T22:13:20Z"
    });

    let state: EntityState = serde_json::from_value(raw).unwrap();
    assert!(state.attributes.is_empty());
}
