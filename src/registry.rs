use std::sync::Arc;

use crate::config::Config;
use crate::orchestrator::SuggestionCoordinator;
use crate::providers::ProviderClient;
use crate::services::StateSource;
use crate::storage::SuggestionStore;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("provider instance `{id}`: {reason}")]
    InvalidInstance { id: String, reason: String },
    #[error("duplicate provider instance id `{0}`")]
    DuplicateId(String),
}

/// All configured coordinator instances, keyed by instance id and kept
/// in configuration order (the first instance is the default target).
///
/// Built once at startup and injected into the HTTP state; the core
/// pipeline never reaches into process globals.
pub struct CoordinatorRegistry {
    coordinators: Vec<Arc<SuggestionCoordinator>>,
}

impl CoordinatorRegistry {
    /// Instantiate a coordinator per configured provider instance.
    ///
    /// Missing identity or credentials is the one condition allowed to
    /// stop an instance (and therefore startup) cold.
    pub fn build(
        config: &Config,
        states: Arc<dyn StateSource>,
        client: ProviderClient,
    ) -> Result<Self, RegistryError> {
        let mut coordinators: Vec<Arc<SuggestionCoordinator>> = Vec::new();

        for instance in &config.providers {
            if instance.id.trim().is_empty() {
                return Err(RegistryError::InvalidInstance {
                    id: instance.title.clone(),
                    reason: "missing id".to_string(),
                });
            }
            if coordinators.iter().any(|c| c.instance.id == instance.id) {
                return Err(RegistryError::DuplicateId(instance.id.clone()));
            }
            instance
                .settings
                .validate()
                .map_err(|reason| RegistryError::InvalidInstance {
                    id: instance.id.clone(),
                    reason,
                })?;

            let store = SuggestionStore::new(
                config.data_dir.clone(),
                instance.id.clone(),
                config.automations_file.clone(),
            );
            if let Err(e) = store.ensure_rules_file() {
                tracing::warn!(instance = %instance.id, "could not create rules file: {}", e);
            }

            coordinators.push(Arc::new(SuggestionCoordinator::new(
                instance.clone(),
                states.clone(),
                client.clone(),
                store,
            )));
        }

        Ok(CoordinatorRegistry { coordinators })
    }

    pub fn get(&self, id: &str) -> Option<Arc<SuggestionCoordinator>> {
        self.coordinators
            .iter()
            .find(|c| c.instance.id == id)
            .cloned()
    }

    /// The requested instance, or the first configured one when the
    /// caller named none.
    pub fn resolve(&self, id: Option<&str>) -> Option<Arc<SuggestionCoordinator>> {
        match id {
            Some(id) => self.get(id),
            None => self.coordinators.first().cloned(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SuggestionCoordinator>> {
        self.coordinators.iter()
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }
}
