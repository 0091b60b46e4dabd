//! Availability cache.
//!
//! One key -> tier map per capability. Maps for capabilities with a
//! storage namespace are written through to the key/value store after
//! every change and hydrated by [`AvailabilityCache::load`]; the others
//! live for the process only.

use smartnotes_capability::{AvailabilityTier, CapabilityKind};
use smartnotes_storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Set once a language detector has been created successfully.
pub const LANGUAGE_DETECTOR_READY_KEY: &str = "languageDetectorReady_v1";

type TierMap = HashMap<String, AvailabilityTier>;

pub struct AvailabilityCache {
    entries: RwLock<HashMap<CapabilityKind, TierMap>>,
    store: Arc<dyn KeyValueStore>,
}

impl AvailabilityCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Hydrate persisted maps. Unreadable entries are logged and skipped.
    pub async fn load(&self) {
        let mut entries = self.entries.write().await;
        for kind in CapabilityKind::ALL {
            let Some(namespace) = kind.cache_namespace() else {
                continue;
            };
            let value = match self.store.get_value(namespace) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(namespace, "Failed to read availability cache: {}", e);
                    continue;
                }
            };
            match serde_json::from_value::<TierMap>(value) {
                Ok(map) => {
                    tracing::debug!(kind = %kind, entries = map.len(), "Loaded availability cache");
                    entries.insert(kind, map);
                }
                Err(e) => tracing::warn!(namespace, "Ignoring malformed availability cache: {}", e),
            }
        }
    }

    pub async fn get(&self, kind: CapabilityKind, key: &str) -> Option<AvailabilityTier> {
        self.entries
            .read()
            .await
            .get(&kind)
            .and_then(|m| m.get(key))
            .cloned()
    }

    /// Record a probe result and persist the capability's map.
    pub async fn set(&self, kind: CapabilityKind, key: &str, tier: AvailabilityTier) {
        // Hold the write lock through the persist so concurrent writers
        // cannot overwrite a newer map with an older snapshot.
        let mut entries = self.entries.write().await;
        entries
            .entry(kind)
            .or_default()
            .insert(key.to_string(), tier);
        Self::persist_locked(&*self.store, kind, entries.get(&kind));
    }

    /// Write the in-memory map for `kind` to storage.
    pub async fn persist_all(&self, kind: CapabilityKind) {
        let entries = self.entries.write().await;
        Self::persist_locked(&*self.store, kind, entries.get(&kind));
    }

    fn persist_locked(store: &dyn KeyValueStore, kind: CapabilityKind, map: Option<&TierMap>) {
        let Some(namespace) = kind.cache_namespace() else {
            return;
        };
        let value = match serde_json::to_value(map.cloned().unwrap_or_default()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(namespace, "Failed to encode availability cache: {}", e);
                return;
            }
        };
        if let Err(e) = store.set_value(namespace, &value) {
            tracing::warn!(namespace, "Failed to persist availability cache: {}", e);
        }
    }

    /// Forget every cached tier and remove the persisted namespaces.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        let namespaces = CapabilityKind::ALL
            .into_iter()
            .filter_map(|k| k.cache_namespace())
            .chain(std::iter::once(LANGUAGE_DETECTOR_READY_KEY));
        for namespace in namespaces {
            if let Err(e) = self.store.remove_value(namespace) {
                tracing::warn!(namespace, "Failed to remove availability cache: {}", e);
            }
        }
        tracing::info!("Cleared availability caches");
    }

    /// Copy of the map for one capability.
    pub async fn snapshot(&self, kind: CapabilityKind) -> HashMap<String, AvailabilityTier> {
        self.entries
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}
