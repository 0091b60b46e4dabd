//! Unified result sequence for batch and streaming execution.

use futures::stream::{BoxStream, Stream, StreamExt};
use smartnotes_capability::{CapabilityError, CapabilityKind, Payload};
use std::pin::Pin;
use std::task::{Context, Poll};

/// One notification of a progressive result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEvent {
    /// A partial payload. `accumulated` is every chunk so far, appended.
    Chunk { chunk: String, accumulated: String },
    /// Terminal success.
    Completed { payload: Payload },
    /// Terminal failure, with whatever was streamed before it.
    Failed {
        error: CapabilityError,
        partial: Option<String>,
    },
}

impl ResultEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultEvent::Chunk { .. })
    }

    pub(crate) fn failed(error: CapabilityError) -> Self {
        ResultEvent::Failed {
            error,
            partial: None,
        }
    }
}

/// Lazy, finite, non-restartable sequence of [`ResultEvent`]s ending with
/// exactly one terminal event.
///
/// Nothing runs until the stream is polled. Dropping it early abandons the
/// operation; any ephemeral instance it created is released.
pub struct ProgressiveResult {
    kind: CapabilityKind,
    events: BoxStream<'static, ResultEvent>,
}

impl ProgressiveResult {
    pub fn new(kind: CapabilityKind, events: BoxStream<'static, ResultEvent>) -> Self {
        Self { kind, events }
    }

    /// A result that fails immediately.
    pub fn failed(kind: CapabilityKind, error: CapabilityError) -> Self {
        Self::new(
            kind,
            futures::stream::once(async move { ResultEvent::failed(error) }).boxed(),
        )
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Drain the sequence.
    pub async fn into_outcome(mut self) -> Outcome {
        let mut outcome = Outcome {
            chunks: Vec::new(),
            accumulated: String::new(),
            result: Err(CapabilityError::ExecutionFailed {
                kind: self.kind,
                message: "result ended without a terminal event".to_string(),
            }),
        };
        while let Some(event) = self.events.next().await {
            match event {
                ResultEvent::Chunk { chunk, accumulated } => {
                    outcome.chunks.push(chunk);
                    outcome.accumulated = accumulated;
                }
                ResultEvent::Completed { payload } => {
                    outcome.result = Ok(payload);
                    break;
                }
                ResultEvent::Failed { error, partial } => {
                    if let Some(partial) = partial {
                        outcome.accumulated = partial;
                    }
                    outcome.result = Err(error);
                    break;
                }
            }
        }
        outcome
    }
}

impl Stream for ProgressiveResult {
    type Item = ResultEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ProgressiveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveResult")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Everything a drained [`ProgressiveResult`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub chunks: Vec<String>,
    /// Latest display value. On failure, the partial output.
    pub accumulated: String,
    pub result: Result<Payload, CapabilityError>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&CapabilityError> {
        self.result.as_ref().err()
    }

    /// Final payload as display text.
    pub fn text(&self) -> Option<String> {
        self.result.as_ref().ok().map(Payload::display_text)
    }
}
