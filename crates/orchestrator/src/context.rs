use crate::availability::AvailabilityCache;
use crate::invoker::Invoker;
use crate::registry::{CapabilityRegistry, HostBindings};
use crate::session::SessionManager;
use smartnotes_storage::KeyValueStore;
use std::sync::Arc;

/// Process-wide orchestration state: host bindings, the availability
/// cache and the prompt session. Starts with empty caches and no session.
#[derive(Clone)]
pub struct OrchestrationContext {
    bindings: Arc<HostBindings>,
    store: Arc<dyn KeyValueStore>,
    invoker: Invoker,
    sessions: SessionManager,
}

impl OrchestrationContext {
    pub fn new(bindings: Arc<HostBindings>, store: Arc<dyn KeyValueStore>) -> Self {
        let registry = CapabilityRegistry::new(bindings.clone());
        let cache = Arc::new(AvailabilityCache::new(store.clone()));
        let invoker = Invoker::new(registry, cache);
        let sessions = SessionManager::new(invoker.clone());
        Self {
            bindings,
            store,
            invoker,
            sessions,
        }
    }

    /// Load persisted availability.
    pub async fn initialize(&self) {
        self.invoker.cache().load().await;
    }

    pub fn bindings(&self) -> &Arc<HostBindings> {
        &self.bindings
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.invoker.registry()
    }

    pub fn cache(&self) -> &Arc<AvailabilityCache> {
        self.invoker.cache()
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}
