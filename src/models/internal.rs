use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Width of the truncated hex digest used as a suggestion id.
pub const SUGGESTION_ID_LEN: usize = 10;

/// One live entity as reported by the state source (Home Assistant
/// `GET /api/states` shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub last_changed: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    /// The domain prefix of the entity id (`light.kitchen` → `light`).
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or(&self.entity_id)
    }
}

/// Snapshot entry kept per entity for one cycle. Rebuilt on every scan,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub state: String,
    pub friendly_name: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub last_changed: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl EntityRecord {
    pub fn from_state(state: &EntityState) -> Self {
        let friendly_name = state
            .attributes
            .get("friendly_name")
            .and_then(|v| v.as_str())
            .unwrap_or(&state.entity_id)
            .to_string();
        EntityRecord {
            state: state.state.clone(),
            friendly_name,
            attributes: state.attributes.clone(),
            last_changed: state.last_changed,
            last_updated: state.last_updated,
        }
    }
}

/// One automation suggestion recovered from a model reply.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Suggestion {
    pub suggestion_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Category tag: fix / innovation / improvement / new / blueprint,
    /// or "unknown" when the model omitted it.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub yaml: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
}

impl Suggestion {
    pub fn is_blueprint(&self) -> bool {
        self.kind == "blueprint" || self.yaml.contains("blueprint:")
    }
}

/// Derive the stable suggestion id from the title and generation time.
///
/// Truncated digest: a same-title same-instant duplicate shadows lookup
/// by id while both entries remain in history order.
pub fn suggestion_id(title: &str, generated_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(generated_at.to_rfc3339().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..SUGGESTION_ID_LEN].to_string()
}

/// Persisted user feedback. Population of `dislikes` is an external
/// collaborator responsibility; this process only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default)]
    pub dislikes: Vec<String>,
}

/// Per-run selection policy. Built once per refresh request and passed
/// by value through the pipeline, so overrides cannot leak into later
/// runs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Include every entity instead of only those absent from the
    /// previous cycle's baseline.
    pub all_entities: bool,
    /// Domain allow-list; empty means all domains.
    pub domains: Vec<String>,
    pub entity_limit: usize,
    pub automation_limit: usize,
    /// Read automation rule definitions verbatim from the automations
    /// file instead of the lightweight entity overview.
    pub automation_read_file: bool,
    /// Sampling temperature override for this run only.
    pub temperature: Option<f32>,
    /// Free-text instructions appended to the system prompt for this
    /// run only.
    pub extra_instructions: Option<String>,
}

impl Default for RunRequest {
    fn default() -> Self {
        RunRequest {
            all_entities: false,
            domains: Vec::new(),
            entity_limit: 200,
            automation_limit: 100,
            automation_read_file: false,
            temperature: None,
            extra_instructions: None,
        }
    }
}
