use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    api::dto::*,
    auth::ApiKey,
    config::Config,
    models::RunRequest,
    orchestrator::{CoordinatorError, CycleOutcome, SuggestionCoordinator},
    registry::CoordinatorRegistry,
};

const SHORT_DESCRIPTION_LEN: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<CoordinatorRegistry>,
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: status.as_u16() as u32,
        }),
    )
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List configured provider instances with their connection status.
async fn list_providers(State(state): State<AppState>, _auth: ApiKey) -> Json<Vec<ProviderInfo>> {
    let mut providers = Vec::new();
    for coordinator in state.registry.iter() {
        let snapshot = coordinator.snapshot().await;
        providers.push(ProviderInfo {
            id: coordinator.instance.id.clone(),
            title: coordinator.instance.title.clone(),
            kind: coordinator.instance.settings.kind().to_string(),
            model: coordinator.instance.settings.model().to_string(),
            status: coordinator.status().await.to_string(),
            last_error: snapshot.last_error,
            last_update: snapshot.last_update.map(|t| t.to_rfc3339()),
        });
    }
    Json(providers)
}

/// Current suggestions flattened across all configured instances.
async fn list_suggestions(
    State(state): State<AppState>,
    _auth: ApiKey,
) -> Json<Vec<SuggestionRow>> {
    let mut rows = Vec::new();
    for coordinator in state.registry.iter() {
        let snapshot = coordinator.snapshot().await;
        for suggestion in snapshot.current {
            let mut short: String = suggestion
                .description
                .chars()
                .take(SHORT_DESCRIPTION_LEN)
                .collect();
            if suggestion.description.chars().count() > SHORT_DESCRIPTION_LEN {
                short.push_str("...");
            }
            rows.push(SuggestionRow {
                id: Uuid::new_v4(),
                suggestion_id: suggestion.suggestion_id,
                title: suggestion.title,
                short_description: short,
                detailed_description: suggestion.description,
                yaml: suggestion.yaml,
                kind: suggestion.kind,
                timestamp: suggestion.timestamp.to_rfc3339(),
                provider: coordinator.instance.title.clone(),
            });
        }
    }
    Json(rows)
}

fn resolve(
    state: &AppState,
    id: Option<&str>,
) -> Result<Arc<SuggestionCoordinator>, (StatusCode, Json<ErrorResponse>)> {
    state.registry.resolve(id).ok_or_else(|| match id {
        Some(id) => error(
            StatusCode::NOT_FOUND,
            format!("unknown provider instance `{id}`"),
        ),
        None => error(StatusCode::NOT_FOUND, "no provider instances configured"),
    })
}

/// Trigger one refresh cycle with transient overrides.
async fn generate(
    State(state): State<AppState>,
    _auth: ApiKey,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorResponse>)> {
    let coordinator = resolve(&state, req.provider.as_deref())?;

    let defaults = RunRequest::default();
    let request = RunRequest {
        all_entities: req.all_entities,
        domains: req.domains.map(DomainFilter::into_domains).unwrap_or_default(),
        entity_limit: req.entity_limit.unwrap_or(defaults.entity_limit),
        automation_limit: req.automation_limit.unwrap_or(defaults.automation_limit),
        automation_read_file: req.automation_read_file,
        temperature: req.temperature,
        extra_instructions: req.custom_prompt,
    };

    match coordinator.refresh(request).await {
        Ok(outcome) => {
            let (label, new_suggestions, last_error) = match outcome {
                CycleOutcome::NoChanges => ("no_changes", 0, None),
                CycleOutcome::NoSuggestions => ("no_suggestions", 0, None),
                CycleOutcome::Completed { new_suggestions } => {
                    ("completed", new_suggestions, None)
                }
                CycleOutcome::Failed { message } => ("failed", 0, Some(message)),
            };
            Ok(Json(GenerateResponse {
                outcome: label.to_string(),
                new_suggestions,
                last_error,
            }))
        }
        Err(CoordinatorError::RefreshInFlight) => Err(error(
            StatusCode::CONFLICT,
            "a refresh cycle is already in flight",
        )),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Persist an accepted suggestion to the rules file or a blueprint.
async fn save_suggestion(
    State(state): State<AppState>,
    _auth: ApiKey,
    Json(req): Json<SaveSuggestionRequest>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let coordinator = resolve(&state, req.provider.as_deref())?;
    match coordinator.save_suggestion(&req.suggestion_id).await {
        Ok(message) => Ok(Json(ActionResponse {
            success: true,
            message: Some(message),
        })),
        Err(CoordinatorError::NotFound(id)) => Err(error(
            StatusCode::NOT_FOUND,
            format!("suggestion not found: {id}"),
        )),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Accept/decline action keyed by suggestion id. Accept saves against
/// whichever instance knows the suggestion; decline is acknowledged
/// without touching state.
async fn suggestion_action(
    State(state): State<AppState>,
    Path((action, suggestion_id)): Path<(String, String)>,
    _auth: ApiKey,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    match action.as_str() {
        "accept" => {
            for coordinator in state.registry.iter() {
                match coordinator.save_suggestion(&suggestion_id).await {
                    Ok(message) => {
                        return Ok(Json(ActionResponse {
                            success: true,
                            message: Some(message),
                        }))
                    }
                    Err(CoordinatorError::NotFound(_)) => continue,
                    Err(e) => {
                        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
                    }
                }
            }
            Err(error(
                StatusCode::NOT_FOUND,
                format!("suggestion not found: {suggestion_id}"),
            ))
        }
        "decline" => Ok(Json(ActionResponse {
            success: true,
            message: Some("Suggestion ignored.".to_string()),
        })),
        other => Err(error(
            StatusCode::BAD_REQUEST,
            format!("invalid action `{other}`"),
        )),
    }
}

/// Clear history for one instance, or all when none is named.
async fn clear_history(
    State(state): State<AppState>,
    _auth: ApiKey,
    Json(req): Json<ClearHistoryRequest>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = match req.provider.as_deref() {
        Some(id) => {
            let coordinator = resolve(&state, Some(id))?;
            coordinator.clear_history().await
        }
        None => {
            let mut last = "No provider instances configured.".to_string();
            for coordinator in state.registry.iter() {
                last = coordinator.clear_history().await;
            }
            last
        }
    };
    Ok(Json(ActionResponse {
        success: true,
        message: Some(message),
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/providers", get(list_providers))
        .route("/api/v1/suggestions", get(list_suggestions))
        .route("/api/v1/generate", post(generate))
        .route("/api/v1/suggestions/save", post(save_suggestion))
        .route(
            "/api/v1/suggestions/{action}/{suggestion_id}",
            post(suggestion_action),
        )
        .route("/api/v1/history/clear", post(clear_history))
        .layer(Extension(state.config.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
