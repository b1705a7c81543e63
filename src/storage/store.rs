use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::models::{Memory, Suggestion};

/// Rolling history keeps at most this many suggestions.
pub const HISTORY_CAP: usize = 100;

const RULES_FILENAME: &str = "ai_automations.yaml";
const RULES_HEADER: &str = "# AI Generated Automations - DO NOT DELETE\n";
const BLUEPRINT_DIR: &str = "blueprints/automation";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable files owned by one coordinator instance.
///
/// Memory and history are namespaced by instance id so independently
/// configured backends never share state; the rules file and blueprint
/// directory are shared human-readable output.
pub struct SuggestionStore {
    data_dir: PathBuf,
    instance_id: String,
    automations_path: Option<PathBuf>,
}

impl SuggestionStore {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        instance_id: impl Into<String>,
        automations_path: Option<PathBuf>,
    ) -> Self {
        SuggestionStore {
            data_dir: data_dir.into(),
            instance_id: instance_id.into(),
            automations_path,
        }
    }

    fn memory_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}_memory.json", self.instance_id))
    }

    fn history_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}_suggestions_history.json", self.instance_id))
    }

    fn rules_path(&self) -> PathBuf {
        self.data_dir.join(RULES_FILENAME)
    }

    /// Tolerant load: any read or parse failure logs and yields the
    /// empty structure.
    pub fn load_memory(&self) -> Memory {
        let path = self.memory_path();
        if !path.exists() {
            return Memory::default();
        }
        match fs::read_to_string(&path).map_err(StoreError::from).and_then(|text| {
            serde_json::from_str::<Memory>(&text).map_err(StoreError::from)
        }) {
            Ok(memory) => memory,
            Err(e) => {
                tracing::error!("failed to load memory from {}: {}", path.display(), e);
                Memory::default()
            }
        }
    }

    /// Persist the feedback memory. Nothing in the suggestion cycle
    /// writes it; this is the seam for whatever collects the user's
    /// dislikes.
    pub fn save_memory(&self, memory: &Memory) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(memory)?;
        write_atomic(&self.memory_path(), &json)
    }

    /// Tolerant load: empty history on any failure.
    pub fn load_history(&self) -> Vec<Suggestion> {
        let path = self.history_path();
        if !path.exists() {
            return Vec::new();
        }
        match fs::read_to_string(&path).map_err(StoreError::from).and_then(|text| {
            serde_json::from_str::<Vec<Suggestion>>(&text).map_err(StoreError::from)
        }) {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("failed to load history from {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Prepend new suggestions (most recent first), truncate to the
    /// cap, persist the whole list. Persistence failures are logged,
    /// not fatal; the in-memory list still reflects the change.
    pub fn append_history(&self, history: &mut Vec<Suggestion>, new: &[Suggestion]) {
        for suggestion in new.iter().rev() {
            history.insert(0, suggestion.clone());
        }
        history.truncate(HISTORY_CAP);
        if let Err(e) = self.save_history(history) {
            tracing::error!("failed to persist history: {}", e);
        }
    }

    fn save_history(&self, history: &[Suggestion]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(history)?;
        write_atomic(&self.history_path(), &json)
    }

    /// Delete the backing file; the caller resets its in-memory list.
    pub fn clear_history(&self) -> Result<(), StoreError> {
        let path = self.history_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Create the rules file with its banner header if absent.
    pub fn ensure_rules_file(&self) -> Result<(), StoreError> {
        let path = self.rules_path();
        if !path.exists() {
            fs::create_dir_all(&self.data_dir)?;
            fs::write(&path, RULES_HEADER)?;
        }
        Ok(())
    }

    /// Append an accepted suggestion's YAML to the rules file.
    pub fn append_rule(
        &self,
        title: &str,
        yaml: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.ensure_rules_file()?;
        let mut file = fs::OpenOptions::new().append(true).open(self.rules_path())?;
        write!(file, "\n\n# AI Generated: {} ({})\n{}", title, accepted_at.to_rfc3339(), yaml)?;
        Ok(())
    }

    /// Write an accepted blueprint to its own template file. Returns
    /// the file name for the confirmation message.
    pub fn write_blueprint(&self, suggestion_id: &str, yaml: &str) -> Result<String, StoreError> {
        let dir = self.data_dir.join(BLUEPRINT_DIR);
        fs::create_dir_all(&dir)?;
        let filename = format!("ai_gen_{suggestion_id}.yaml");
        fs::write(dir.join(&filename), yaml)?;
        Ok(filename)
    }

    /// Verbatim automations-file text for prompt file mode. Tolerant:
    /// missing or unreadable file yields `None`.
    pub fn read_automations_file(&self) -> Option<String> {
        let path = self.automations_path.as_ref()?;
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("failed to read automations file {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Write-then-rename so a crash mid-write never leaves truncated JSON
/// behind.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
