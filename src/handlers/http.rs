//! HTTP handlers: webhook intake, secret sync, wallet proxy, health.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::event::{EventEnvelope, WebhookRecord};
use crate::models::verification::VerificationStatus;
use crate::services::hub::BroadcastHub;
use crate::services::secret::SecretStore;
use crate::services::verifier;
use crate::services::wallet::WalletClient;

/// Shared application state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub secret_store: SecretStore,
    pub hub: BroadcastHub,
}

const HEADER_SIGNATURE: &str = "x-webhook-signature";

/// POST /wallet_hook — verify the delivery against the active secret, parse
/// the body, and broadcast the event to all connected clients.
///
/// The body is taken as raw bytes: the signature covers what the sender
/// actually transmitted, not a re-serialization.
pub async fn inbound_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok());

    let secret = state.secret_store.get();
    let verification = verifier::verify(&body, signature, secret.as_deref());
    if !verification.is_valid {
        error!(status = ?verification.status, "webhook rejected");
        return Err(AppError::Signature);
    }
    if verification.status == VerificationStatus::NoSecret {
        warn!("no secret configured, delivery accepted unverified");
    }

    let parsed: Value = serde_json::from_slice(&body).map_err(|_| AppError::InvalidBody)?;
    info!(verification = verification.status.describe(), "webhook received");

    let record = WebhookRecord {
        timestamp: Utc::now().to_rfc3339(),
        body: parsed,
        verification: verification.status.describe().to_string(),
        signature: signature.unwrap_or("none").to_string(),
    };
    let envelope = EventEnvelope::new("webhook", serde_json::to_string(&record)?);
    state.hub.broadcast(&envelope);

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct SyncSecretRequest {
    #[serde(default)]
    pub secret: Option<String>,
}

/// POST /sync_secret — set or clear the active secret.
pub async fn sync_secret(
    State(state): State<AppState>,
    Json(body): Json<SyncSecretRequest>,
) -> Json<Value> {
    let message = match body.secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            state.secret_store.set(Some(secret));
            "Secret synced"
        }
        None => {
            state.secret_store.clear();
            "Secret cleared"
        }
    };
    info!(message, "secret sync");
    Json(json!({ "status": "ok", "message": message }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWebhookRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// POST /proxy/register_webhook — store the supplied secret (or clear it),
/// then register the callback with the wallet API over mTLS.
pub async fn register_webhook(
    State(state): State<AppState>,
    Json(body): Json<RegisterWebhookRequest>,
) -> (StatusCode, Json<Value>) {
    state.secret_store.set(body.secret.clone());

    match call_wallet(&state, |client| async move {
        client.register_webhook(&body).await
    })
    .await
    {
        Ok(data) => (StatusCode::OK, Json(data)),
        Err(e) => {
            error!(error = %e, "register_webhook failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(proxy_failure("Failed to register webhook", &e)),
            )
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterWebhookRequest {
    pub webhook_id: String,
}

/// POST /proxy/unregister_webhook — clear the secret, then unregister.
pub async fn unregister_webhook(
    State(state): State<AppState>,
    Json(body): Json<UnregisterWebhookRequest>,
) -> (StatusCode, Json<Value>) {
    state.secret_store.clear();

    match call_wallet(&state, |client| async move {
        client.unregister_webhook(&body).await
    })
    .await
    {
        Ok(data) => (StatusCode::OK, Json(data)),
        Err(e) => {
            error!(error = %e, "unregister_webhook failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(proxy_failure("Failed to unregister webhook", &e)),
            )
        }
    }
}

/// GET /proxy/get_transaction?transaction_id= — fetch transaction details.
pub async fn get_transaction(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let transaction_id = params
        .get("transaction_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::Validation("Missing transaction_id query parameter".to_string())
        })?;

    let client = WalletClient::from_config(&state.config)?;
    let data = client.get_transaction_by_id(transaction_id).await?;
    Ok(Json(data))
}

/// GET /health — liveness probe.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "hooklens" })),
    )
}

async fn call_wallet<F, Fut>(state: &AppState, call: F) -> Result<Value, AppError>
where
    F: FnOnce(WalletClient) -> Fut,
    Fut: std::future::Future<Output = Result<Value, AppError>>,
{
    let client = WalletClient::from_config(&state.config)?;
    call(client).await
}

fn proxy_failure(message: &str, error: &AppError) -> Value {
    json!({
        "proxy_status": "error",
        "proxy_message": message,
        "error": error.to_string(),
        "details": "Configuration or certificate error - check server logs",
    })
}
