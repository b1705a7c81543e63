use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ==================== REQUEST DTOs ====================

/// Domain filter, either an explicit list or a comma-separated string.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DomainFilter {
    List(Vec<String>),
    Csv(String),
}

impl DomainFilter {
    pub fn into_domains(self) -> Vec<String> {
        match self {
            DomainFilter::List(list) => list
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            DomainFilter::Csv(csv) => csv
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }
}

/// One-off generate-suggestions action. Every field is a transient
/// override; stored defaults are untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Target provider instance id; defaults to the first configured.
    pub provider: Option<String>,
    /// Extra instructions appended to the system prompt for this run.
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub all_entities: bool,
    pub domains: Option<DomainFilter>,
    pub entity_limit: Option<usize>,
    pub automation_limit: Option<usize>,
    #[serde(default)]
    pub automation_read_file: bool,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveSuggestionRequest {
    /// A suggestion id, or `latest_N` for the Nth current suggestion.
    pub suggestion_id: String,
    pub provider: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClearHistoryRequest {
    /// Instance to clear; all instances when omitted.
    pub provider: Option<String>,
}

// ==================== RESPONSE DTOs ====================

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub model: String,
    /// "connected" or "error"
    pub status: String,
    pub last_error: Option<String>,
    pub last_update: Option<String>,
}

/// One flattened suggestion row for the UI, across all instances.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionRow {
    /// Per-response row id, not stable across queries.
    pub id: Uuid,
    pub suggestion_id: String,
    pub title: String,
    pub short_description: String,
    pub detailed_description: String,
    pub yaml: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    /// Originating provider instance title.
    pub provider: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub outcome: String,
    pub new_suggestions: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u32,
}
