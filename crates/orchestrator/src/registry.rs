//! Host bindings and capability resolution.
//!
//! The host exposes each capability under a well-known name, either
//! directly or on the window object. Mocks install themselves on the
//! window under a `Mock`-suffixed name. [`CapabilityRegistry::resolve`]
//! walks those names in a fixed order on every call, so installing or
//! removing a binding takes effect on the next operation.

use smartnotes_capability::{CapabilityBackend, CapabilityKind};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared reference to a backend.
pub type BackendRef = Arc<dyn CapabilityBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingScope {
    /// Exposed directly by the host.
    Global,
    /// Nested under the window-like global.
    Window,
}

/// Where a resolved backend came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSource {
    Global,
    Window,
    LegacyAlias,
    Mock,
}

impl BackendSource {
    pub fn is_mock(&self) -> bool {
        matches!(self, BackendSource::Mock)
    }
}

/// Mutable table of named bindings, shared by everything that resolves.
#[derive(Default)]
pub struct HostBindings {
    slots: RwLock<HashMap<(BindingScope, String), BackendRef>>,
}

impl HostBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `backend` under `name`. Returns the backend it replaced.
    pub fn install(
        &self,
        scope: BindingScope,
        name: impl Into<String>,
        backend: BackendRef,
    ) -> Option<BackendRef> {
        let name = name.into();
        tracing::debug!(?scope, name = %name, "Installing host binding");
        self.slots
            .write()
            .expect("host bindings lock poisoned")
            .insert((scope, name), backend)
    }

    pub fn remove(&self, scope: BindingScope, name: &str) -> Option<BackendRef> {
        self.slots
            .write()
            .expect("host bindings lock poisoned")
            .remove(&(scope, name.to_string()))
    }

    pub fn lookup(&self, scope: BindingScope, name: &str) -> Option<BackendRef> {
        self.slots
            .read()
            .expect("host bindings lock poisoned")
            .get(&(scope, name.to_string()))
            .cloned()
    }

    pub fn contains(&self, scope: BindingScope, name: &str) -> bool {
        self.lookup(scope, name).is_some()
    }
}

/// A backend resolved for one operation. Never stored past it.
#[derive(Clone)]
pub struct CapabilityHandle {
    pub kind: CapabilityKind,
    pub backend: BackendRef,
    pub source: BackendSource,
    /// Binding name the backend was found under.
    pub binding: &'static str,
}

impl std::fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("binding", &self.binding)
            .finish()
    }
}

/// Lookup order for a capability.
fn candidates(kind: CapabilityKind) -> Vec<(BindingScope, &'static str, BackendSource)> {
    let mut order = vec![
        (BindingScope::Global, kind.global_name(), BackendSource::Global),
        (BindingScope::Window, kind.global_name(), BackendSource::Window),
    ];
    for alias in kind.legacy_aliases() {
        order.push((BindingScope::Window, *alias, BackendSource::LegacyAlias));
    }
    order.push((BindingScope::Window, kind.mock_name(), BackendSource::Mock));
    order
}

#[derive(Clone)]
pub struct CapabilityRegistry {
    bindings: Arc<HostBindings>,
}

impl CapabilityRegistry {
    pub fn new(bindings: Arc<HostBindings>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &Arc<HostBindings> {
        &self.bindings
    }

    /// First bound backend for `kind`, or `None` if the environment has
    /// none. Bindings whose backend reports a different kind are skipped.
    pub fn resolve(&self, kind: CapabilityKind) -> Option<CapabilityHandle> {
        for (scope, name, source) in candidates(kind) {
            let Some(backend) = self.bindings.lookup(scope, name) else {
                continue;
            };
            if backend.kind() != kind {
                tracing::warn!(
                    binding = name,
                    expected = %kind,
                    actual = %backend.kind(),
                    "Skipping binding with mismatched capability"
                );
                continue;
            }
            tracing::debug!(kind = %kind, binding = name, ?source, "Resolved capability");
            return Some(CapabilityHandle {
                kind,
                backend,
                source,
                binding: name,
            });
        }
        tracing::debug!(kind = %kind, "No backend bound for capability");
        None
    }

    /// Resolution result for every capability, for status displays.
    pub fn overview(&self) -> Vec<(CapabilityKind, Option<BackendSource>)> {
        CapabilityKind::ALL
            .into_iter()
            .map(|kind| (kind, self.resolve(kind).map(|h| h.source)))
            .collect()
    }
}
