//! Holder of the single active webhook secret.

use std::sync::{Arc, RwLock};

/// Process-wide holder of the currently-active shared secret.
///
/// Constructed once at startup and handed to the intake and registration
/// handlers; tests create independent instances. Written by webhook
/// registration and by the sync endpoint, cleared by unregistration.
/// Overwriting discards the previous value; nothing is persisted.
#[derive(Clone, Default)]
pub struct SecretStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Set the active secret. `None` and the empty string both clear it.
    pub fn set(&self, secret: Option<String>) {
        let normalized = secret.filter(|s| !s.is_empty());
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = normalized;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}
