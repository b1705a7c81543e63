use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use automation_suggester::{
    api::routes::{self, AppState},
    config::Config,
    providers::ProviderClient,
    registry::CoordinatorRegistry,
    services::HomeAssistantClient,
};

#[derive(Parser)]
#[command(name = "automation-suggester", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automation_suggester=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load config
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    let config = Arc::new(config);

    // Home Assistant client (entity state feed)
    let hass = Arc::new(HomeAssistantClient::new(
        config.homeassistant_url.clone(),
        config.homeassistant_token.clone(),
    ));

    // Verify Home Assistant reachability on startup
    match hass.health_check().await {
        Ok(true) => tracing::info!("✅ Home Assistant connected successfully"),
        Ok(false) => tracing::warn!("⚠️ Home Assistant health check returned false"),
        Err(e) => tracing::warn!(
            "⚠️ Home Assistant not available: {}. Refresh cycles will fail until it is.",
            e
        ),
    }

    // One coordinator per configured provider instance
    let registry = Arc::new(CoordinatorRegistry::build(
        &config,
        hass.clone(),
        ProviderClient::new(),
    )?);
    if registry.is_empty() {
        tracing::warn!("⚠️ No provider instances configured; /api/v1/generate will 404");
    }

    let state = AppState {
        config: config.clone(),
        registry: registry.clone(),
    };
    let app = routes::create_router(state);

    // Start server
    let addr_str = format!("127.0.0.1:{}", config.server_port);
    let addr: SocketAddr = addr_str.parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("🏠 Home Assistant URL: {}", config.homeassistant_url);
    tracing::info!("🧠 Provider instances: {}", registry.len());
    tracing::info!("📁 Data directory: {}", config.data_dir.display());

    axum::serve(listener, app).await?;

    Ok(())
}
