pub mod hass_client;

pub use hass_client::{HomeAssistantClient, StateSource, StateSourceError};
