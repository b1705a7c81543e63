use automation_suggester::models::{Memory, RunRequest};
use automation_suggester::orchestrator::collector::collect_snapshot;
use automation_suggester::orchestrator::prompt::build_prompt;
use serde_json::json;

use crate::{entity, ts};

fn default_request() -> RunRequest {
    RunRequest::default()
}

#[test]
fn building_twice_yields_identical_output() {
    let states = vec![
        entity("light.kitchen", "on", json!({"friendly_name": "Kitchen"}), ts(10)),
        entity("sensor.temp", "21.5", json!({"unit_of_measurement": "°C"}), ts(5)),
        entity("switch.fan", "unavailable", json!({}), ts(0)),
    ];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    let memory = Memory::default();
    let request = default_request();

    let first = build_prompt(&snapshot, &broken, &[], None, &memory, &request);
    let second = build_prompt(&snapshot, &broken, &[], None, &memory, &request);

    assert_eq!(first, second);
}

#[test]
fn broken_entities_never_appear_as_entity_blocks() {
    let states = vec![
        entity("light.kitchen", "unavailable", json!({}), ts(0)),
        entity("light.hall", "on", json!({}), ts(1)),
    ];
    let (snapshot, broken) = collect_snapshot(&states, &[]);

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );

    assert!(prompt.contains("BROKEN/UNAVAILABLE"));
    assert!(prompt.contains("- light.kitchen"));
    assert!(!prompt.contains("- id: light.kitchen"));
    assert!(prompt.contains("- id: light.hall"));
}

#[test]
fn broken_only_cycle_has_no_entities_section() {
    let states = vec![
        entity("light.kitchen", "unavailable", json!({}), ts(0)),
        entity("sensor.temp", "unknown", json!({}), ts(1)),
    ];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    assert!(snapshot.is_empty());

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );

    assert!(!prompt.contains("Entities:\n"));
    assert!(prompt.contains("BROKEN/UNAVAILABLE"));
}

#[test]
fn no_broken_section_without_broken_entities() {
    let states = vec![entity("light.hall", "on", json!({}), ts(1))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );

    assert!(!prompt.contains("BROKEN/UNAVAILABLE"));
}

#[test]
fn entity_limit_keeps_most_recently_updated() {
    let states = vec![
        entity("sensor.old", "1", json!({}), ts(0)),
        entity("sensor.mid", "2", json!({}), ts(50)),
        entity("sensor.new", "3", json!({}), ts(100)),
    ];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    let request = RunRequest {
        entity_limit: 2,
        ..Default::default()
    };

    let prompt = build_prompt(&snapshot, &broken, &[], None, &Memory::default(), &request);

    assert!(prompt.contains("- id: sensor.new"));
    assert!(prompt.contains("- id: sensor.mid"));
    assert!(!prompt.contains("- id: sensor.old"));
    // recency priority: newest first
    let new_pos = prompt.find("- id: sensor.new").unwrap();
    let mid_pos = prompt.find("- id: sensor.mid").unwrap();
    assert!(new_pos < mid_pos);
}

#[test]
fn long_attributes_are_truncated_with_marker() {
    let big = "x".repeat(2000);
    let states = vec![entity("sensor.big", "1", json!({ "blob": big }), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );

    assert!(prompt.contains("...[truncated]"));
    assert!(!prompt.contains(&big));
}

#[test]
fn dislikes_substitute_into_system_instructions() {
    let states = vec![entity("light.hall", "on", json!({}), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);

    let empty = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );
    assert!(empty.contains("related to: None."));

    let memory = Memory {
        dislikes: vec!["vacuum schedules".to_string(), "doorbell".to_string()],
    };
    let prompt = build_prompt(&snapshot, &broken, &[], None, &memory, &default_request());
    assert!(prompt.contains("related to: vacuum schedules, doorbell."));
    assert!(!prompt.contains("{dislikes}"));
}

#[test]
fn extra_instructions_are_appended_for_the_run() {
    let states = vec![entity("light.hall", "on", json!({}), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    let request = RunRequest {
        extra_instructions: Some("Focus on energy saving".to_string()),
        ..Default::default()
    };

    let prompt = build_prompt(&snapshot, &broken, &[], None, &Memory::default(), &request);

    assert!(prompt.contains("Additional User Context:\nFocus on energy saving"));
}

#[test]
fn automation_overview_is_capped() {
    let states = vec![entity("light.hall", "on", json!({}), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    let automations: Vec<_> = (0..5)
        .map(|i| entity(&format!("automation.rule_{i}"), "on", json!({}), ts(i)))
        .collect();
    let request = RunRequest {
        automation_limit: 3,
        ..Default::default()
    };

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &automations,
        None,
        &Memory::default(),
        &request,
    );

    assert!(prompt.contains("Existing automations:"));
    assert!(prompt.contains("automation.rule_0"));
    assert!(prompt.contains("automation.rule_2"));
    assert!(!prompt.contains("automation.rule_3"));
}

#[test]
fn file_mode_includes_verbatim_definitions() {
    let states = vec![entity("light.hall", "on", json!({}), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);
    let request = RunRequest {
        automation_read_file: true,
        ..Default::default()
    };

    let yaml = "- alias: Morning lights\n  trigger: []\n";
    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        Some(yaml),
        &Memory::default(),
        &request,
    );

    assert!(prompt.contains("Automation definitions (verbatim):"));
    assert!(prompt.contains("- alias: Morning lights"));

    // without file mode the text stays out even when supplied
    let without = build_prompt(
        &snapshot,
        &broken,
        &[],
        Some(yaml),
        &Memory::default(),
        &default_request(),
    );
    assert!(!without.contains("Morning lights"));
}

#[test]
fn prompt_demands_strict_json_output() {
    let states = vec![entity("light.hall", "on", json!({}), ts(0))];
    let (snapshot, broken) = collect_snapshot(&states, &[]);

    let prompt = build_prompt(
        &snapshot,
        &broken,
        &[],
        None,
        &Memory::default(),
        &default_request(),
    );

    assert!(prompt.contains("strict JSON"));
    assert!(prompt.ends_with("No prose, no markdown fences, no trailing commentary.\n"));
}
