use std::path::{Path, PathBuf};

use serde::Deserialize;
use validator::Validate;

use crate::providers::ProviderInstance;

/// Main configuration for the suggestion controller.
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// API key required on every route except `/health`
    #[validate(length(min = 16))]
    pub api_key: String,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Directory holding memory/history files, the generated rules
    /// file and blueprint templates
    pub data_dir: PathBuf,

    /// Home Assistant base URL
    pub homeassistant_url: String,

    /// Home Assistant long-lived access token
    #[validate(length(min = 1))]
    pub homeassistant_token: String,

    /// Optional path to `automations.yaml` for prompt file mode
    pub automations_file: Option<PathBuf>,

    /// Configured provider instances, in priority order
    #[serde(default)]
    pub providers: Vec<ProviderInstance>,
}

impl Config {
    /// Layered load: defaults, then the TOML file (explicit path or
    /// `~/.automation-suggester/config.toml`), then `SUGGESTER__*`
    /// environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let default_data_dir = home.join(".automation-suggester").display().to_string();

        let mut builder = config::Config::builder()
            .set_default("server_port", 8087)?
            .set_default("log_level", "info")?
            .set_default("data_dir", default_data_dir.clone())?
            .set_default("homeassistant_url", "http://localhost:8123")?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(
                config::File::with_name(&format!("{default_data_dir}/config")).required(false),
            ),
        };

        let settings = builder
            .add_source(config::Environment::with_prefix("SUGGESTER").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }
}
