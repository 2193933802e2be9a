//! SSE endpoint: long-lived event stream fed by the broadcast hub.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

use crate::handlers::http::AppState;
use crate::models::event::EventEnvelope;
use crate::services::hub::{BroadcastHub, ChannelId};

/// GET /events — register an output channel with the hub and stream
/// pre-framed messages until the client goes away. An initial synthetic
/// `connected` event is sent on every new connection.
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let (id, rx) = state.hub.add_channel();
    info!(connections = state.hub.count(), "sse client connected");

    let connected = EventEnvelope::new(
        "connected",
        json!({ "message": "Event stream connected" }).to_string(),
    );
    state.hub.send_to(id, connected.to_frame());

    // the guard lives inside the stream: dropping the response body removes
    // the membership
    let guard = ChannelGuard {
        hub: state.hub.clone(),
        id,
    };
    let stream = UnboundedReceiverStream::new(rx).map(move |frame| {
        let _guard = &guard;
        Ok::<_, Infallible>(frame)
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
}

struct ChannelGuard {
    hub: BroadcastHub,
    id: ChannelId,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.hub.remove_channel(self.id);
        info!(connections = self.hub.count(), "sse client disconnected");
    }
}
