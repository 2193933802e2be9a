//! Entry point: load config, wire dependencies, and run the server.

use std::sync::Arc;
use std::time::Duration;

use hooklens::config::Config;
use hooklens::services::hub;
use hooklens::{create_app, AppState, BroadcastHub, SecretStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState {
        config: Arc::new(config.clone()),
        secret_store: SecretStore::new(),
        hub: BroadcastHub::new(),
    };

    // comment frames keep idle streams alive for client heartbeat detection
    hub::spawn_keepalive(state.hub.clone(), Duration::from_secs(15));

    let app = create_app(state);

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
