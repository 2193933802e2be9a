//! Webhook inspection harness built with Rust.
//!
//! Registers a webhook with a wallet API over mutually-authenticated TLS,
//! verifies inbound deliveries with HMAC-SHA256, and fans verified events out
//! to connected clients over Server-Sent Events. The `client` module holds the
//! watcher side: a reconnecting stream consumer and a bounded persisted event
//! history.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::hub::BroadcastHub;
pub use services::secret::SecretStore;

use axum::routing::{get, post};
use handlers::http;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the API router (intake, sync, events, proxy, health). Used by main
/// and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let proxy_routes = axum::Router::new()
        .route("/register_webhook", post(http::register_webhook))
        .route("/unregister_webhook", post(http::unregister_webhook))
        .route("/get_transaction", get(http::get_transaction));

    axum::Router::new()
        .route("/wallet_hook", post(http::inbound_webhook))
        .route("/sync_secret", post(http::sync_secret))
        .route("/events", get(handlers::sse::events))
        .route("/health", get(http::health))
        .nest("/proxy", proxy_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
