use async_trait::async_trait;
use std::time::Duration;

use crate::models::EntityState;

#[derive(Debug, thiserror::Error)]
pub enum StateSourceError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Read-only feed of live entity states. The coordinator only ever
/// consumes this seam, so tests can swap in a canned implementation.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn fetch_states(&self) -> Result<Vec<EntityState>, StateSourceError>;
}

/// Home Assistant REST client (`/api/states` with a long-lived access
/// token).
#[derive(Clone)]
pub struct HomeAssistantClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HomeAssistantClient {
    pub fn new(base_url: String, token: String) -> Self {
        HomeAssistantClient {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn health_check(&self) -> Result<bool, StateSourceError> {
        let response = self
            .client
            .get(format!("{}/api/", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl StateSource for HomeAssistantClient {
    async fn fetch_states(&self) -> Result<Vec<EntityState>, StateSourceError> {
        let response = self
            .client
            .get(format!("{}/api/states", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StateSourceError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}
