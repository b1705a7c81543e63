//! Automation Suggester - AI-backed automation suggestions for a
//! smart-home entity graph.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::api::dto::*;
pub use crate::api::routes::{create_router, AppState};
pub use crate::config::Config;
pub use crate::models::{EntityRecord, EntityState, Memory, RunRequest, Suggestion};
pub use crate::orchestrator::{CycleOutcome, SuggestionCoordinator};
pub use crate::providers::{ProviderClient, ProviderInstance, ProviderSettings};
pub use crate::registry::CoordinatorRegistry;
pub use crate::services::{HomeAssistantClient, StateSource};
pub use crate::storage::SuggestionStore;
