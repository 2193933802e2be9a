//! Reconnecting SSE consumer: connection state machine, heartbeat staleness
//! detection, and decoupled event delivery.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::parser::{FrameParser, SseMessage};
use crate::client::session::SessionMarker;
use crate::models::event::{EventEnvelope, EventPayload};

/// Connection lifecycle states published to status subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Settings for the stream client.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub events_url: String,
    /// Fixed delay before a reconnect attempt.
    pub reconnect_delay: Duration,
    /// Silence threshold after which the stream is treated as dead.
    pub heartbeat_timeout: Duration,
}

/// A received event, payload classified once at ingestion.
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub envelope: EventEnvelope,
    pub payload: EventPayload,
}

/// The two pending-timer slots: the live connection task and the single
/// reconnect timer. Starting either cancels its predecessor, so there is
/// never more than one of each kind.
#[derive(Default)]
struct Inner {
    conn_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

/// Owns one long-lived server-push connection with automatic
/// reconnect-with-delay and heartbeat-based staleness detection.
///
/// Status transitions are published on a `watch` channel, so new subscribers
/// immediately observe the current state. Decoded `webhook` events go out on
/// a `broadcast` channel, decoupled from the transport so multiple consumers
/// react independently.
#[derive(Clone)]
pub struct StreamClient {
    settings: Arc<StreamSettings>,
    http: reqwest::Client,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    events_tx: broadcast::Sender<ReceivedEvent>,
    marker: Option<Arc<SessionMarker>>,
    inner: Arc<Mutex<Inner>>,
}

impl StreamClient {
    pub fn new(settings: StreamSettings) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (events_tx, _) = broadcast::channel(256);
        Self {
            settings: Arc::new(settings),
            http: reqwest::Client::new(),
            status_tx: Arc::new(status_tx),
            events_tx,
            marker: None,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Attach a session marker, set while a connection is wanted and cleared
    /// by an explicit disconnect.
    pub fn with_session_marker(mut self, marker: Arc<SessionMarker>) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Subscribe to status transitions. The receiver's current value is the
    /// present status, so attaching is never stale.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.current_status() == ConnectionStatus::Connected
    }

    /// Subscribe to decoded webhook events.
    pub fn events(&self) -> broadcast::Receiver<ReceivedEvent> {
        self.events_tx.subscribe()
    }

    /// Open the stream. No-op while a connection attempt or live connection
    /// exists.
    pub fn connect(&self) {
        let mut inner = self.lock_inner();
        if inner.conn_task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("stream connection already exists");
            return;
        }
        self.set_status(ConnectionStatus::Connecting);
        if let Some(marker) = &self.marker {
            marker.mark_active();
        }
        let client = self.clone();
        inner.conn_task = Some(tokio::spawn(async move {
            client.run_connection().await;
        }));
    }

    /// Tear down: cancel the reconnect timer and the connection task (which
    /// closes the transport), then notify subscribers.
    pub fn disconnect(&self) {
        {
            let mut inner = self.lock_inner();
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(task) = inner.conn_task.take() {
                task.abort();
            }
        }
        self.set_status(ConnectionStatus::Disconnected);
        if let Some(marker) = &self.marker {
            marker.clear();
        }
        info!("stream closed");
    }

    async fn run_connection(&self) {
        match self.http.get(&self.settings.events_url).send().await {
            Ok(res) if res.status().is_success() => {
                info!("stream connected");
                self.set_status(ConnectionStatus::Connected);
                self.cancel_reconnect();
                self.read_stream(res).await;
            }
            Ok(res) => warn!(status = %res.status(), "stream open rejected"),
            Err(e) => warn!(error = %e, "stream open failed"),
        }
        self.set_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    /// Pump the response body until error, EOF, or heartbeat expiry. Any
    /// received bytes (keepalive comments included) prove liveness and push
    /// the heartbeat deadline out.
    async fn read_stream(&self, res: reqwest::Response) {
        let mut stream = res.bytes_stream();
        let mut parser = FrameParser::default();
        let heartbeat = sleep(self.settings.heartbeat_timeout);
        tokio::pin!(heartbeat);

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        heartbeat
                            .as_mut()
                            .reset(Instant::now() + self.settings.heartbeat_timeout);
                        for message in parser.push(&bytes) {
                            self.dispatch(message);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "stream read error");
                        return;
                    }
                    None => {
                        info!("stream closed by server");
                        return;
                    }
                },
                () = &mut heartbeat => {
                    warn!(
                        timeout_ms = self.settings.heartbeat_timeout.as_millis() as u64,
                        "heartbeat timeout, treating stream as dead"
                    );
                    return;
                }
            }
        }
    }

    fn dispatch(&self, message: SseMessage) {
        match message.event.as_str() {
            "webhook" => {
                let payload = EventPayload::classify(&message.data);
                let envelope = EventEnvelope::received("webhook", message.data);
                debug!(id = envelope.id, "webhook event received");
                let _ = self.events_tx.send(ReceivedEvent { envelope, payload });
            }
            "connected" => info!("server acknowledged connection"),
            other => debug!(event = other, "ignoring event"),
        }
    }

    fn schedule_reconnect(&self) {
        let mut inner = self.lock_inner();
        if inner
            .reconnect_timer
            .as_ref()
            .is_some_and(|t| !t.is_finished())
        {
            return;
        }
        let client = self.clone();
        let delay = self.settings.reconnect_delay;
        info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        inner.reconnect_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            client.connect();
        }));
    }

    fn cancel_reconnect(&self) {
        if let Some(timer) = self.lock_inner().reconnect_timer.take() {
            timer.abort();
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
