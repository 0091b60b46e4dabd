//! Event bus abstraction for decoupled event emission.
//!
//! The popup controller publishes progress, partial results and session
//! changes through this trait, so the same core drives the terminal front
//! end and the tests.

use std::sync::{Arc, Mutex};

/// Trait for emitting events to subscribers.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name/topic (e.g., "result:chunk")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// Event bus backed by a closure. Front ends use it to render events as
/// they arrive.
pub struct FnEventBus<F> {
    handler: F,
}

impl<F> FnEventBus<F>
where
    F: Fn(&str, &serde_json::Value) + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> EventBus for FnEventBus<F>
where
    F: Fn(&str, &serde_json::Value) + Send + Sync,
{
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        (self.handler)(topic, &payload);
    }
}

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

/// A captured event from InMemoryEventBus.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn captured(&self) -> std::sync::MutexGuard<'_, Vec<EmittedEvent>> {
        self.events.lock().expect("event bus mutex poisoned")
    }

    /// All captured events, oldest first.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.captured().clone()
    }

    /// Events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.captured()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Most recent payload for a topic.
    pub fn last_for(&self, topic: &str) -> Option<serde_json::Value> {
        self.captured()
            .iter()
            .rev()
            .find(|e| e.topic == topic)
            .map(|e| e.payload.clone())
    }

    /// Topics in emission order.
    pub fn topics(&self) -> Vec<String> {
        self.captured().iter().map(|e| e.topic.clone()).collect()
    }

    pub fn clear(&self) {
        self.captured().clear();
    }

    pub fn len(&self) -> usize {
        self.captured().len()
    }

    pub fn is_empty(&self) -> bool {
        self.captured().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.captured().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// Event bus that discards everything.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}
