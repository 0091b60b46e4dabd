//! String-keyed settings storage with JSON values.

use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Durable or session-scoped key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    fn remove_value(&self, key: &str) -> Result<()>;
}

/// In-memory store that lives as long as the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().expect("session store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for SessionStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .values
            .lock()
            .expect("session store mutex poisoned")
            .get(key)
            .cloned())
    }

    fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.values
            .lock()
            .expect("session store mutex poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        self.values
            .lock()
            .expect("session store mutex poisoned")
            .remove(key);
        Ok(())
    }
}

/// Prefers a durable store and falls back to session memory.
///
/// Every failed durable call is logged and served from the session store
/// instead, so callers never see a storage error. Reads fall through to the
/// session store when the durable store has no value or fails.
pub struct FallbackStore {
    primary: Option<Arc<dyn KeyValueStore>>,
    session: SessionStore,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn KeyValueStore>) -> Self {
        Self {
            primary: Some(primary),
            session: SessionStore::new(),
        }
    }

    /// No durable store available.
    pub fn session_only() -> Self {
        Self {
            primary: None,
            session: SessionStore::new(),
        }
    }

    pub fn has_durable_store(&self) -> bool {
        self.primary.is_some()
    }
}

impl KeyValueStore for FallbackStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if let Some(primary) = &self.primary {
            match primary.get_value(key) {
                Ok(Some(v)) => return Ok(Some(v)),
                Ok(None) => {}
                Err(e) => tracing::warn!(key, "Durable read failed, using session store: {}", e),
            }
        }
        self.session.get_value(key)
    }

    fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        if let Some(primary) = &self.primary {
            match primary.set_value(key, value) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(key, "Durable write failed, using session store: {}", e),
            }
        }
        self.session.set_value(key, value)
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        if let Some(primary) = &self.primary {
            if let Err(e) = primary.remove_value(key) {
                tracing::warn!(key, "Durable remove failed: {}", e);
            }
        }
        self.session.remove_value(key)
    }
}
