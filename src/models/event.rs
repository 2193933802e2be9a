//! Event envelope and SSE wire framing shared by server and client.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One event as carried from intake through broadcast to clients.
///
/// `data` holds the JSON-encoded payload exactly as it appears on the wire;
/// clients classify it once at ingestion (see [`EventPayload`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Millisecond wall-clock id, doubling as the SSE event id.
    pub id: u64,
    /// Event name: `webhook`, `connected`, or `system`.
    pub event: String,
    /// JSON-encoded payload.
    pub data: String,
    /// Local receive time (set client-side only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, data: String) -> Self {
        Self {
            id: unix_millis(),
            event: event.into(),
            data,
            timestamp: None,
        }
    }

    /// Client-side constructor: stamps the local receive time.
    pub fn received(event: impl Into<String>, data: String) -> Self {
        Self {
            timestamp: Some(Utc::now().to_rfc3339()),
            ..Self::new(event, data)
        }
    }

    /// Serialize into the SSE wire representation: `id:`, `event:`, `data:`
    /// lines and a blank-line terminator.
    pub fn to_frame(&self) -> String {
        format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event, self.data)
    }
}

/// Payload broadcast for each accepted webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRecord {
    pub timestamp: String,
    pub body: serde_json::Value,
    pub verification: String,
    pub signature: String,
}

/// Payload shape, classified once at ingestion so consumers pattern-match
/// instead of re-deriving it.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Payload parsed as a JSON object or array.
    Structured(serde_json::Value),
    /// Anything else: kept verbatim.
    Raw(String),
}

impl EventPayload {
    pub fn classify(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) if v.is_object() || v.is_array() => EventPayload::Structured(v),
            _ => EventPayload::Raw(raw.to_string()),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
