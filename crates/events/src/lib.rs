//! Shared event contracts.
//!
//! Defines the messages exchanged with the selection-capture content
//! script and the events the popup publishes while it drives a
//! capability. Using shared types prevents runtime deserialization errors
//! from mismatched field names.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{EmittedEvent, EventBus, EventBusRef, FnEventBus, InMemoryEventBus, NullEventBus};

use serde::{Deserialize, Serialize};
use smartnotes_capability::CapabilityKind;
use uuid::Uuid;

/// Kind of content the selection capture picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    #[default]
    Text,
    Image,
    Audio,
}

/// A captured selection as sent by the content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionData {
    #[serde(rename = "type", default)]
    pub kind: SelectionType,
    #[serde(default)]
    pub data: String,
}

/// Selection payload: older senders post the bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingSelection {
    Raw(String),
    Typed(SelectionData),
}

impl IncomingSelection {
    pub fn into_selection(self) -> SelectionData {
        match self {
            IncomingSelection::Raw(data) => SelectionData {
                kind: SelectionType::Text,
                data,
            },
            IncomingSelection::Typed(selection) => selection,
        }
    }
}

/// Messages on the extension runtime channel.
///
/// Producers: content script (`textSelected`), popup (`getSelection`)
/// Consumers: popup, content script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RuntimeMessage {
    TextSelected { data: IncomingSelection },
    GetSelection,
}

/// Reply to [`RuntimeMessage::GetSelection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub data: String,
}

/// Event emitted while a model download runs during instance creation.
///
/// Producers: popup controller
/// Consumers: front end (loading indicator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgressEvent {
    pub capability: CapabilityKind,
    /// Raw fraction in `[0, 1]`.
    pub loaded: f64,
    /// `round(loaded * 100)`, for display.
    pub percent: u32,
}

/// Event emitted for every partial result.
///
/// Producers: popup controller (progressive renderer)
/// Consumers: front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultChunkEvent {
    pub capability: CapabilityKind,
    pub chunk: String,
    /// Everything received so far.
    pub accumulated: String,
    /// Classification of the accumulated text.
    pub content_kind: String,
}

/// Event emitted when an operation finishes successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCompletedEvent {
    pub capability: CapabilityKind,
    pub payload: serde_json::Value,
    pub content_kind: String,
    /// HTML rendering when rendering is enabled.
    #[serde(default)]
    pub rendered: Option<String>,
    /// Whether this is the local fallback rather than backend output.
    #[serde(default)]
    pub fallback: bool,
}

/// Event emitted when an operation ends with an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFailedEvent {
    pub capability: CapabilityKind,
    pub code: String,
    pub error: String,
    /// Output streamed before the failure.
    #[serde(default)]
    pub partial: Option<String>,
}

/// Event emitted when the prompt session changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChangedEvent {
    /// `absent`, `active` or `aborted`.
    pub state: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

/// Event emitted after language detection updates the source language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectedEvent {
    pub language: String,
    pub confidence: f64,
}

/// Event emitted after a note is saved or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesChangedEvent {
    #[serde(default)]
    pub saved: Option<Uuid>,
    #[serde(default)]
    pub deleted: Option<Uuid>,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Selection received from the content script.
    pub const SELECTION_RECEIVED: &str = "selection:received";
    /// Model download progress.
    pub const DOWNLOAD_PROGRESS: &str = "capability:download_progress";
    /// Partial result.
    pub const RESULT_CHUNK: &str = "result:chunk";
    /// Successful completion.
    pub const RESULT_COMPLETED: &str = "result:completed";
    /// Terminal error.
    pub const RESULT_FAILED: &str = "result:failed";
    /// Prompt session state change.
    pub const SESSION_CHANGED: &str = "session:changed";
    /// Source language detected.
    pub const LANGUAGE_DETECTED: &str = "language:detected";
    /// Notes saved or deleted.
    pub const NOTES_CHANGED: &str = "notes:changed";
    /// Mock mode toggled.
    pub const MOCK_MODE_CHANGED: &str = "settings:mock_mode";
    /// Availability caches cleared.
    pub const CACHES_CLEARED: &str = "settings:caches_cleared";
}
