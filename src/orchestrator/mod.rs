pub mod collector;
pub mod parser;
pub mod prompt;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::models::{suggestion_id, EntityRecord, EntityState, Memory, RunRequest, Suggestion};
use crate::providers::{ProviderClient, ProviderInstance};
use crate::services::StateSource;
use crate::storage::{StoreError, SuggestionStore};

const DEFAULT_TITLE: &str = "Untitled suggestion";
const DEFAULT_KIND: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("a refresh cycle is already in flight")]
    RefreshInFlight,
    #[error("suggestion not found: {0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

/// Where a cycle currently is; diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Collecting,
    Prompting,
    Dispatching,
    Parsing,
    Merging,
}

/// How one refresh cycle ended. Provider failures surface here, not as
/// errors, because a misbehaving backend must never unwind past the
/// coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Empty pick-set and nothing broken; baseline advanced.
    NoChanges,
    /// Provider answered but nothing parsable came back.
    NoSuggestions,
    /// Dispatch failed; current list untouched, last-error recorded.
    Failed { message: String },
    Completed { new_suggestions: usize },
}

/// Read view of coordinator state for the HTTP surface.
#[derive(Debug, Clone)]
pub struct CoordinatorSnapshot {
    pub current: Vec<Suggestion>,
    pub history: Vec<Suggestion>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub entities_processed: Vec<String>,
    pub phase: CyclePhase,
}

struct CycleData {
    previous_entities: HashSet<String>,
    current: Vec<Suggestion>,
    history: Vec<Suggestion>,
    memory: Memory,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
    entities_processed: Vec<String>,
    phase: CyclePhase,
}

/// Drives collect → prompt → dispatch → parse → merge for one
/// configured provider instance, and owns that instance's suggestion
/// state and files.
pub struct SuggestionCoordinator {
    pub instance: ProviderInstance,
    states: Arc<dyn StateSource>,
    client: ProviderClient,
    store: SuggestionStore,
    /// Serializes cycles. Held across the provider call; a refresh
    /// arriving meanwhile is rejected, never run in parallel.
    cycle_gate: Mutex<()>,
    data: RwLock<CycleData>,
}

impl SuggestionCoordinator {
    pub fn new(
        instance: ProviderInstance,
        states: Arc<dyn StateSource>,
        client: ProviderClient,
        store: SuggestionStore,
    ) -> Self {
        let memory = store.load_memory();
        let history = store.load_history();
        SuggestionCoordinator {
            instance,
            states,
            client,
            store,
            cycle_gate: Mutex::new(()),
            data: RwLock::new(CycleData {
                previous_entities: HashSet::new(),
                current: Vec::new(),
                history,
                memory,
                last_update: None,
                last_error: None,
                entities_processed: Vec::new(),
                phase: CyclePhase::Idle,
            }),
        }
    }

    /// Run one refresh cycle with the given run-scoped policy.
    ///
    /// The policy travels by value and is dropped when the cycle ends,
    /// so overrides can never leak into the next run.
    pub async fn refresh(&self, request: RunRequest) -> Result<CycleOutcome, CoordinatorError> {
        let _gate = self
            .cycle_gate
            .try_lock()
            .map_err(|_| CoordinatorError::RefreshInFlight)?;

        let outcome = self.run_cycle(&request).await;
        self.data.write().await.phase = CyclePhase::Idle;

        match &outcome {
            CycleOutcome::Failed { message } => {
                tracing::warn!(instance = %self.instance.id, "cycle failed: {}", message);
            }
            other => {
                tracing::info!(instance = %self.instance.id, "cycle finished: {:?}", other);
            }
        }
        Ok(outcome)
    }

    async fn run_cycle(&self, request: &RunRequest) -> CycleOutcome {
        self.set_phase(CyclePhase::Collecting).await;

        let live = match self.states.fetch_states().await {
            Ok(states) => states,
            Err(e) => {
                let message = format!("state source: {e}");
                self.data.write().await.last_error = Some(message.clone());
                return CycleOutcome::Failed { message };
            }
        };

        let (snapshot, broken) = collector::collect_snapshot(&live, &request.domains);
        let baseline: HashSet<String> = snapshot.keys().cloned().collect();

        let picked: BTreeMap<String, EntityRecord> = if request.all_entities {
            snapshot.clone()
        } else {
            let data = self.data.read().await;
            snapshot
                .iter()
                .filter(|(id, _)| !data.previous_entities.contains(*id))
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect()
        };

        if picked.is_empty() && broken.is_empty() {
            let mut data = self.data.write().await;
            data.previous_entities = baseline;
            data.entities_processed.clear();
            data.last_error = None;
            return CycleOutcome::NoChanges;
        }

        self.set_phase(CyclePhase::Prompting).await;
        let automations: Vec<EntityState> = live
            .iter()
            .filter(|s| s.domain() == "automation")
            .cloned()
            .collect();
        let automations_file = if request.automation_read_file {
            self.store.read_automations_file()
        } else {
            None
        };
        let memory = self.data.read().await.memory.clone();
        let prompt = prompt::build_prompt(
            &picked,
            &broken,
            &automations,
            automations_file.as_deref(),
            &memory,
            request,
        );

        self.set_phase(CyclePhase::Dispatching).await;
        let temperature = request.temperature.unwrap_or(self.instance.temperature);
        let reply = match self.client.dispatch(&prompt, &self.instance, temperature).await {
            Ok(text) => text,
            Err(e) => {
                let message = e.to_string();
                let mut data = self.data.write().await;
                data.last_error = Some(message.clone());
                data.previous_entities = baseline;
                return CycleOutcome::Failed { message };
            }
        };

        self.set_phase(CyclePhase::Parsing).await;
        let records = parser::parse_suggestions(&reply);

        self.set_phase(CyclePhase::Merging).await;
        let now = Utc::now();
        let processed: Vec<Suggestion> = records
            .into_iter()
            .filter_map(|record| complete_record(record, now))
            .collect();

        let mut data = self.data.write().await;
        data.previous_entities = baseline;
        data.entities_processed = picked.keys().cloned().collect();
        data.last_error = None;
        data.last_update = Some(now);

        if processed.is_empty() {
            // Answered but unparsable; distinct from provider-unreachable.
            return CycleOutcome::NoSuggestions;
        }

        self.store.append_history(&mut data.history, &processed);
        let count = processed.len();
        data.current = processed;
        CycleOutcome::Completed {
            new_suggestions: count,
        }
    }

    async fn set_phase(&self, phase: CyclePhase) {
        self.data.write().await.phase = phase;
    }

    /// Persist an accepted suggestion, referenced by id or by the
    /// `latest_N` positional shorthand (1-indexed into the current
    /// list). Blueprints get their own template file; plain rules are
    /// appended to the rules file.
    pub async fn save_suggestion(&self, reference: &str) -> Result<String, CoordinatorError> {
        let suggestion = {
            let data = self.data.read().await;
            if let Some(n) = reference.strip_prefix("latest_") {
                n.parse::<usize>()
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .and_then(|i| data.current.get(i))
                    .cloned()
            } else {
                data.current
                    .iter()
                    .chain(data.history.iter())
                    .find(|s| s.suggestion_id == reference)
                    .cloned()
            }
        };

        let suggestion = suggestion
            .filter(|s| !s.yaml.is_empty())
            .ok_or_else(|| CoordinatorError::NotFound(reference.to_string()))?;

        if suggestion.is_blueprint() {
            let filename = self
                .store
                .write_blueprint(&suggestion.suggestion_id, &suggestion.yaml)?;
            Ok(format!("Blueprint saved as {filename}"))
        } else {
            self.store
                .append_rule(&suggestion.title, &suggestion.yaml, Utc::now())?;
            Ok("Automation saved to ai_automations.yaml".to_string())
        }
    }

    /// Delete the persisted history and reset the in-memory list. A
    /// failing delete is logged; the in-memory reset still happens.
    pub async fn clear_history(&self) -> String {
        if let Err(e) = self.store.clear_history() {
            tracing::error!(instance = %self.instance.id, "failed to delete history file: {}", e);
        }
        self.data.write().await.history.clear();
        "Suggestion history cleared.".to_string()
    }

    pub async fn snapshot(&self) -> CoordinatorSnapshot {
        let data = self.data.read().await;
        CoordinatorSnapshot {
            current: data.current.clone(),
            history: data.history.clone(),
            last_update: data.last_update,
            last_error: data.last_error.clone(),
            entities_processed: data.entities_processed.clone(),
            phase: data.phase,
        }
    }

    /// `connected` unless the last cycle recorded an error.
    pub async fn status(&self) -> &'static str {
        if self.data.read().await.last_error.is_some() {
            "error"
        } else {
            "connected"
        }
    }
}

/// Schema completion for one parsed record: anything that is not a
/// JSON object is dropped, missing optional fields get defaults, and
/// the stable id is assigned.
fn complete_record(record: Value, generated_at: DateTime<Utc>) -> Option<Suggestion> {
    let map = record.as_object()?;
    let text = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };

    let title = map
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let kind = match text("type") {
        k if k.is_empty() => DEFAULT_KIND.to_string(),
        k => k,
    };

    Some(Suggestion {
        suggestion_id: suggestion_id(&title, generated_at),
        title,
        description: text("description"),
        kind,
        yaml: text("yaml"),
        timestamp: generated_at,
    })
}
