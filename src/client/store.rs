//! Bounded, file-backed event history with FIFO eviction.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::models::event::EventEnvelope;

/// Storage statistics derived from the current persisted content.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub enabled: bool,
    pub event_count: usize,
    pub max_events: usize,
    pub size_in_bytes: usize,
    pub size_in_kb: usize,
    pub storage_key: String,
    pub utilization_percent: u32,
}

/// Bounded local cache of received events persisted as a single JSON blob.
///
/// Order is oldest-first; eviction drops from the front. Storage failures
/// degrade to an in-memory-only view rather than erroring: saves report
/// `false`, loads report empty.
pub struct EventStore {
    config: StoreConfig,
}

impl EventStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// True when the feature flag is on and the backing location is verified
    /// writable right now. Storage can become unavailable after startup
    /// (quota, permissions), so the probe runs at call time.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.storage_available()
    }

    /// Load the stored sequence. Corrupted or non-array content is treated as
    /// empty and cleared as a side effect.
    pub fn load_events(&self) -> Vec<EventEnvelope> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let raw = match fs::read_to_string(&self.config.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<Vec<EventEnvelope>>(&raw) {
            Ok(events) => {
                debug!(count = events.len(), "loaded stored events");
                events
            }
            Err(e) => {
                warn!(error = %e, "stored events corrupted, clearing");
                self.clear_events();
                Vec::new()
            }
        }
    }

    /// Persist the sequence, keeping only the most recent `max_events`. On a
    /// write failure, retry once with the newest half; report `false` if that
    /// still fails.
    pub fn save_events(&self, events: &[EventEnvelope]) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if self.write_blob(tail(events, self.config.max_events)) {
            return true;
        }
        let halved = tail(events, self.config.max_events / 2);
        warn!(count = halved.len(), "retrying event save with reduced history");
        self.write_blob(halved)
    }

    /// Append `event` to a copy of `current` and persist. The caller's slice
    /// is never mutated.
    pub fn add_event(&self, current: &[EventEnvelope], event: EventEnvelope) -> bool {
        let mut updated = current.to_vec();
        updated.push(event);
        self.save_events(&updated)
    }

    /// Remove the persisted blob. Absent storage counts as cleared.
    pub fn clear_events(&self) -> bool {
        match fs::remove_file(&self.config.path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(error = %e, "failed to clear events");
                false
            }
        }
    }

    pub fn get_stats(&self) -> StoreStats {
        let events = self.load_events();
        let size_in_bytes = serde_json::to_string(&events).map(|s| s.len()).unwrap_or(0);
        let max = self.config.max_events.max(1);
        StoreStats {
            enabled: self.is_enabled(),
            event_count: events.len(),
            max_events: self.config.max_events,
            size_in_bytes,
            size_in_kb: (size_in_bytes as f64 / 1024.0).round() as usize,
            storage_key: self.config.path.display().to_string(),
            utilization_percent: ((events.len() as f64 / max as f64) * 100.0).round() as u32,
        }
    }

    /// Write the full stored sequence as pretty-printed JSON to `path`.
    /// Pure read of the store; returns the exported count.
    pub fn export_events(&self, path: &Path) -> std::io::Result<usize> {
        let events = self.load_events();
        let json = serde_json::to_string_pretty(&events)?;
        fs::write(path, json)?;
        Ok(events.len())
    }

    fn storage_available(&self) -> bool {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() && fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        let probe = self.config.path.with_extension("probe");
        match fs::write(&probe, b"probe") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
                true
            }
            Err(e) => {
                warn!(error = %e, "event storage unavailable");
                false
            }
        }
    }

    fn write_blob(&self, events: &[EventEnvelope]) -> bool {
        let serialized = match serde_json::to_string(events) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize events");
                return false;
            }
        };
        debug!(count = events.len(), bytes = serialized.len(), "saving events");
        match fs::write(&self.config.path, serialized) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "event save failed");
                false
            }
        }
    }
}

fn tail(events: &[EventEnvelope], max: usize) -> &[EventEnvelope] {
    if events.len() > max {
        &events[events.len() - max..]
    } else {
        events
    }
}
