//! Terminal watcher: follows the event stream and persists received events.

use std::sync::Arc;

use hooklens::client::{
    should_auto_connect, EventStore, SessionMarker, StreamClient, StreamSettings,
};
use hooklens::config::WatchConfig;
use hooklens::models::event::EventPayload;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WatchConfig::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = EventStore::new(config.store.clone());
    let marker = Arc::new(SessionMarker::new(config.session_path.clone()));
    let client = StreamClient::new(StreamSettings {
        events_url: config.events_url.clone(),
        reconnect_delay: config.reconnect_delay,
        heartbeat_timeout: config.heartbeat_timeout,
    })
    .with_session_marker(marker.clone());

    let mut status = client.status();
    let mut events = client.events();

    let mut history = store.load_events();
    info!(restored = history.len(), "event history loaded");

    // --resume-only: connect only if a previous session left the stream active
    let resume_only = std::env::args().any(|a| a == "--resume-only");
    if should_auto_connect(!resume_only, &marker) {
        client.connect();
    } else {
        info!("no prior session, waiting (run without --resume-only to connect)");
    }

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(status = ?*status.borrow_and_update(), "stream status");
            }
            event = events.recv() => match event {
                Ok(received) => {
                    match &received.payload {
                        EventPayload::Structured(value) => info!(payload = %value, "webhook"),
                        EventPayload::Raw(raw) => info!(payload = %raw, "webhook"),
                    }
                    if store.add_event(&history, received.envelope.clone()) {
                        history.push(received.envelope);
                        let max = config.store.max_events;
                        if history.len() > max {
                            history.drain(..history.len() - max);
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "event subscriber lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                client.disconnect();
                break;
            }
        }
    }

    let stats = store.get_stats();
    info!(
        events = stats.event_count,
        size_kb = stats.size_in_kb,
        "history persisted"
    );
    Ok(())
}
