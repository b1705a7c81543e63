use std::collections::BTreeMap;

use crate::models::{EntityRecord, EntityState, Memory, RunRequest};

/// Character budget for one entity's serialized attributes.
pub const ATTRIBUTE_CHAR_BUDGET: usize = 500;

/// Maximum broken entity ids listed in the prompt.
pub const BROKEN_LIST_CAP: usize = 20;

/// Characters of verbatim automations-file text allowed per automation
/// slot when file mode is on.
const AUTOMATION_FILE_CHARS_PER_RULE: usize = 400;

const TRUNCATED_MARKER: &str = " ...[truncated]";

pub const SYSTEM_PROMPT: &str = "\
You are an expert Home Assistant Architect and Repair Technician.
Your tasks:
1. Analyze the provided entities and existing automations.
2. Repair: Suggest FIXES for broken ('unavailable') entities.
3. Innovate: Suggest NEW automations or Improvements.
4. Blueprints: Create a BLUEPRINT for reusable logic.

MEMORY / CONTEXT:
The user has previously REJECTED suggestions related to: {dislikes}.
DO NOT suggest these topics again.

IMPORTANT: You must output your response in strict JSON format list.
Format:
[
  {
    \"title\": \"Example\",
    \"description\": \"...\",
    \"type\": \"fix/innovation/improvement/new/blueprint\",
    \"yaml\": \"...\"
  }
]
";

const JSON_SUFFIX: &str = "\nRespond with ONLY the strict JSON array described above. \
No prose, no markdown fences, no trailing commentary.\n";

/// Assemble the full prompt for one cycle.
///
/// Deterministic for identical inputs: entities are ordered by
/// last-updated descending with the entity id as tie-breaker, and
/// attribute maps serialize with sorted keys.
pub fn build_prompt(
    picked: &BTreeMap<String, EntityRecord>,
    broken: &[String],
    automations: &[EntityState],
    automations_file: Option<&str>,
    memory: &Memory,
    request: &RunRequest,
) -> String {
    let dislikes = if memory.dislikes.is_empty() {
        "None".to_string()
    } else {
        memory.dislikes.join(", ")
    };

    let mut prompt = SYSTEM_PROMPT.replace("{dislikes}", &dislikes);

    if let Some(extra) = &request.extra_instructions {
        prompt.push_str("\nAdditional User Context:\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }

    // Recency-priority truncation: keep the N most recently updated.
    let mut ordered: Vec<(&String, &EntityRecord)> = picked.iter().collect();
    ordered.sort_by(|a, b| b.1.last_updated.cmp(&a.1.last_updated).then(a.0.cmp(b.0)));
    ordered.truncate(request.entity_limit);

    if !ordered.is_empty() {
        prompt.push_str("\nEntities:\n");
        for (entity_id, record) in &ordered {
            prompt.push_str(&entity_block(entity_id, record));
        }
    }

    if !broken.is_empty() {
        prompt.push_str("\nBROKEN/UNAVAILABLE entities:\n");
        for entity_id in broken.iter().take(BROKEN_LIST_CAP) {
            prompt.push_str("- ");
            prompt.push_str(entity_id);
            prompt.push('\n');
        }
    }

    if !automations.is_empty() {
        prompt.push_str("\nExisting automations:\n");
        for automation in automations.iter().take(request.automation_limit) {
            let attrs = truncate_chars(
                &serde_json::to_string(&automation.attributes).unwrap_or_default(),
                ATTRIBUTE_CHAR_BUDGET,
            );
            prompt.push_str(&format!(
                "- {}: state={}, attributes={}\n",
                automation.entity_id, automation.state, attrs
            ));
        }
    }

    if request.automation_read_file {
        if let Some(text) = automations_file {
            let budget = request.automation_limit * AUTOMATION_FILE_CHARS_PER_RULE;
            prompt.push_str("\nAutomation definitions (verbatim):\n");
            prompt.push_str(&truncate_chars(text, budget));
            prompt.push('\n');
        }
    }

    prompt.push_str(JSON_SUFFIX);
    prompt
}

fn entity_block(entity_id: &str, record: &EntityRecord) -> String {
    let domain = entity_id.split('.').next().unwrap_or(entity_id);
    let attrs = truncate_chars(
        &serde_json::to_string(&record.attributes).unwrap_or_default(),
        ATTRIBUTE_CHAR_BUDGET,
    );
    let mut block = format!(
        "- id: {entity_id}\n  name: {}\n  domain: {domain}\n  state: {}\n  last_updated: {}\n  attributes: {attrs}\n",
        record.friendly_name,
        record.state,
        record.last_updated.to_rfc3339(),
    );
    if let Some(area) = record.attributes.get("area_id").and_then(|v| v.as_str()) {
        block.push_str(&format!("  area: {area}\n"));
    }
    if let Some(device) = record.attributes.get("device_id").and_then(|v| v.as_str()) {
        block.push_str(&format!("  device: {device}\n"));
    }
    block
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(budget).collect();
    cut.push_str(TRUNCATED_MARKER);
    cut
}
