//! Integration tests: health, secret sync, webhook intake, SSE stream, and
//! proxy error paths. Everything runs against the in-process router via
//! `tower::ServiceExt::oneshot`; no external services are needed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use tower::util::ServiceExt;

use hooklens::client::parser::FrameParser;
use hooklens::client::EventStore;
use hooklens::config::{Config, MtlsConfig, StoreConfig};
use hooklens::models::event::EventEnvelope;
use hooklens::services::verifier;
use hooklens::{create_app, AppState, BroadcastHub, SecretStore};

fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        wallet_api_host: "localhost".to_string(),
        wallet_api_port: 9257,
        mtls: MtlsConfig::default(),
        callback_url: "http://localhost:3000/wallet_hook".to_string(),
        log_level: "info".to_string(),
    }
}

fn test_state() -> AppState {
    AppState {
        config: Arc::new(test_config()),
        secret_store: SecretStore::new(),
        hub: BroadcastHub::new(),
    }
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = create_app(test_state());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn sync_secret_sets_and_clears() {
    let state = test_state();
    let app = create_app(state.clone());

    let res = app
        .clone()
        .oneshot(post_json("/sync_secret", r#"{"secret":"topsecret"}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], "Secret synced");
    assert_eq!(state.secret_store.get(), Some("topsecret".to_string()));

    let res = app
        .oneshot(post_json("/sync_secret", "{}".to_string()))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["message"], "Secret cleared");
    assert_eq!(state.secret_store.get(), None);
}

#[tokio::test]
async fn webhook_with_valid_signature_broadcasts_to_all_channels() {
    let state = test_state();
    state.secret_store.set(Some("topsecret".to_string()));
    let (_a, mut rx_a) = state.hub.add_channel();
    let (_b, mut rx_b) = state.hub.add_channel();
    let app = create_app(state);

    let body = r#"{"event_type":"transaction_confirmed"}"#;
    let req = Request::builder()
        .method("POST")
        .uri("/wallet_hook")
        .header("content-type", "application/json")
        .header("x-webhook-signature", verifier::sign(body.as_bytes(), "topsecret"))
        .body(Body::from(body))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let frame_a = rx_a.try_recv().unwrap();
    let frame_b = rx_b.try_recv().unwrap();
    assert_eq!(frame_a, frame_b);
    assert!(frame_a.contains("event: webhook"));

    let data_line = frame_a
        .lines()
        .find(|l| l.starts_with("data: "))
        .expect("frame has a data line");
    let payload: serde_json::Value =
        serde_json::from_str(data_line.trim_start_matches("data: ")).unwrap();
    assert_eq!(payload["verification"], "VERIFIED");
    assert_eq!(payload["body"]["event_type"], "transaction_confirmed");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let state = test_state();
    state.secret_store.set(Some("topsecret".to_string()));
    let (_id, mut rx) = state.hub.add_channel();
    let app = create_app(state);

    let body = r#"{"event_type":"transaction_confirmed"}"#;
    let req = Request::builder()
        .method("POST")
        .uri("/wallet_hook")
        .header("x-webhook-signature", verifier::sign(body.as_bytes(), "wrong"))
        .body(Body::from(body))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(res).await["error"],
        "Signature verification failed"
    );
    assert!(rx.try_recv().is_err(), "rejected delivery must not broadcast");
}

#[tokio::test]
async fn webhook_with_invalid_json_is_rejected() {
    let state = test_state();
    state.secret_store.set(Some("topsecret".to_string()));
    let app = create_app(state);

    let body = "not json";
    let req = Request::builder()
        .method("POST")
        .uri("/wallet_hook")
        .header("x-webhook-signature", verifier::sign(body.as_bytes(), "topsecret"))
        .body(Body::from(body))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Invalid JSON body");
}

#[tokio::test]
async fn webhook_without_secret_is_accepted_unverified() {
    let state = test_state();
    let (_id, mut rx) = state.hub.add_channel();
    let app = create_app(state);

    let req = post_json("/wallet_hook", r#"{"event_type":"offer_created"}"#.to_string());
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(rx.try_recv().unwrap().contains("No signature required"));
}

#[tokio::test]
async fn events_stream_starts_with_connected_event() {
    let state = test_state();
    let hub = state.hub.clone();
    let app = create_app(state);

    let req = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(res.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(hub.count(), 1);

    let mut body = res.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("first chunk should arrive immediately")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: connected"));

    drop(body);
    assert_eq!(hub.count(), 0, "membership removed on client disconnect");
}

#[tokio::test]
async fn proxy_register_stores_secret_even_when_upstream_fails() {
    let state = test_state();
    let app = create_app(state.clone());

    let req = post_json(
        "/proxy/register_webhook",
        r#"{"url":"http://localhost:3000/wallet_hook","secret":"abc"}"#.to_string(),
    );
    let res = app.oneshot(req).await.unwrap();
    // no certificate material is configured, so the upstream call fails
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(res).await;
    assert_eq!(json["proxy_status"], "error");
    assert_eq!(json["proxy_message"], "Failed to register webhook");

    assert_eq!(state.secret_store.get(), Some("abc".to_string()));
}

#[tokio::test]
async fn proxy_unregister_clears_secret() {
    let state = test_state();
    state.secret_store.set(Some("abc".to_string()));
    let app = create_app(state.clone());

    let req = post_json(
        "/proxy/unregister_webhook",
        r#"{"webhook_id":"wh_1"}"#.to_string(),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.secret_store.get(), None);
}

#[tokio::test]
async fn get_transaction_requires_transaction_id() {
    let app = create_app(test_state());
    let req = Request::builder()
        .uri("/proxy/get_transaction")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["error"],
        "Missing transaction_id query parameter"
    );
}

/// End-to-end: a signed delivery reaches two connected channels, and a
/// client persisting what it received ends up with exactly one entry.
#[tokio::test]
async fn verified_delivery_flows_to_client_history() {
    let state = test_state();
    state.secret_store.set(Some("topsecret".to_string()));
    let (_a, mut rx_a) = state.hub.add_channel();
    let (_b, mut rx_b) = state.hub.add_channel();
    let app = create_app(state);

    let body = r#"{"event_type":"transaction_confirmed"}"#;
    let req = Request::builder()
        .method("POST")
        .uri("/wallet_hook")
        .header("x-webhook-signature", verifier::sign(body.as_bytes(), "topsecret"))
        .body(Body::from(body))
        .unwrap();
    assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);

    for rx in [&mut rx_a, &mut rx_b] {
        let frame = rx.try_recv().unwrap();
        let mut parser = FrameParser::default();
        let messages = parser.push(frame.as_bytes());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "webhook");
    }

    // client side: persist the received event
    let dir = tempfile::TempDir::new().unwrap();
    let store = EventStore::new(StoreConfig {
        enabled: true,
        max_events: 100,
        path: dir.path().join("events.json"),
    });
    let envelope = EventEnvelope::received("webhook", "{}".to_string());
    assert!(store.add_event(&store.load_events(), envelope));
    assert_eq!(store.load_events().len(), 1);
}
