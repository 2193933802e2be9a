//! SSE fan-out: membership set of connected clients and best-effort broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::event::EventEnvelope;

/// Opaque handle identifying one connected output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

/// Fan-out hub holding the set of live SSE senders.
///
/// Membership changes (add on connect, remove on disconnect or write failure)
/// are the only mutation. Broadcast writes are fire-and-forget through
/// unbounded senders, so one slow consumer never stalls delivery to the rest
/// or the intake request that triggered it.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    next_id: Arc<AtomicU64>,
    members: Arc<RwLock<HashMap<ChannelId, mpsc::UnboundedSender<String>>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new output channel. The returned receiver feeds one SSE
    /// response body.
    pub fn add_channel(&self) -> (ChannelId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write_members().insert(id, tx);
        debug!(channel = id.0, "sse channel added");
        (id, rx)
    }

    /// Drop a channel from the member set. Removing an absent id is a no-op.
    pub fn remove_channel(&self, id: ChannelId) {
        if self.write_members().remove(&id).is_some() {
            debug!(channel = id.0, "sse channel removed");
        }
    }

    pub fn count(&self) -> usize {
        self.read_members().len()
    }

    /// Fan an envelope out to every current member. The frame is serialized
    /// once; members whose write fails are collected during iteration and
    /// removed after it completes. Failures never reach the caller.
    pub fn broadcast(&self, envelope: &EventEnvelope) {
        self.send_frame(envelope.to_frame());
    }

    /// Emit a comment frame (`: <text>`). Carries no event but proves
    /// liveness to client-side heartbeat timers.
    pub fn broadcast_comment(&self, text: &str) {
        self.send_frame(format!(": {}\n\n", text));
    }

    /// Write a frame to a single member. Returns false if the member is gone.
    pub fn send_to(&self, id: ChannelId, frame: String) -> bool {
        self.read_members()
            .get(&id)
            .map(|tx| tx.send(frame).is_ok())
            .unwrap_or(false)
    }

    fn send_frame(&self, frame: String) {
        let mut failed = Vec::new();
        {
            let members = self.read_members();
            for (id, tx) in members.iter() {
                if tx.send(frame.clone()).is_err() {
                    failed.push(*id);
                }
            }
        }
        for id in failed {
            warn!(channel = id.0, "dropping unreachable sse channel");
            self.remove_channel(id);
        }
    }

    fn read_members(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ChannelId, mpsc::UnboundedSender<String>>> {
        self.members.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_members(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<ChannelId, mpsc::UnboundedSender<String>>> {
        self.members.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Periodically emit comment frames so idle connections still carry traffic.
pub fn spawn_keepalive(hub: BroadcastHub, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if hub.count() > 0 {
                hub.broadcast_comment("keepalive");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventEnvelope;

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            id: 7,
            event: "webhook".to_string(),
            data: r#"{"n":1}"#.to_string(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let hub = BroadcastHub::new();
        let (_id_a, mut rx_a) = hub.add_channel();
        let (_id_b, mut rx_b) = hub.add_channel();
        assert_eq!(hub.count(), 2);

        hub.broadcast(&envelope());

        let frame_a = rx_a.try_recv().unwrap();
        let frame_b = rx_b.try_recv().unwrap();
        assert_eq!(frame_a, frame_b);
        assert_eq!(frame_a, "id: 7\nevent: webhook\ndata: {\"n\":1}\n\n");
    }

    #[tokio::test]
    async fn failed_member_is_removed_others_still_delivered() {
        let hub = BroadcastHub::new();
        let (_id_a, mut rx_a) = hub.add_channel();
        let (_id_b, rx_b) = hub.add_channel();
        drop(rx_b);

        hub.broadcast(&envelope());

        assert_eq!(hub.count(), 1);
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn remove_channel_is_idempotent() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.add_channel();
        hub.remove_channel(id);
        hub.remove_channel(id);
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn comment_frame_shape() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.add_channel();
        hub.broadcast_comment("keepalive");
        assert_eq!(rx.try_recv().unwrap(), ": keepalive\n\n");
    }

    #[tokio::test]
    async fn send_to_targets_single_member() {
        let hub = BroadcastHub::new();
        let (id_a, mut rx_a) = hub.add_channel();
        let (_id_b, mut rx_b) = hub.add_channel();

        assert!(hub.send_to(id_a, "hello\n\n".to_string()));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
