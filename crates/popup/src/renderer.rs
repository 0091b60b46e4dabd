//! Turns a progressive result into bus events.

use futures::stream::StreamExt;
use serde::Serialize;
use smartnotes_capability::{CapabilityError, CapabilityKind, Payload};
use smartnotes_events::{
    event_names, EventBusRef, ResultChunkEvent, ResultCompletedEvent, ResultFailedEvent,
};
use smartnotes_orchestrator::{Outcome, ProgressiveResult, ResultEvent};
use smartnotes_render::Rendered;

pub(crate) fn emit<T: Serialize>(bus: &EventBusRef, topic: &str, event: &T) {
    match serde_json::to_value(event) {
        Ok(payload) => bus.emit(topic, payload),
        Err(e) => tracing::warn!(topic, "Failed to encode event: {}", e),
    }
}

fn payload_value(payload: &Payload) -> serde_json::Value {
    match payload {
        Payload::Text(text) => serde_json::Value::String(text.clone()),
        Payload::Json(value) => value.clone(),
    }
}

/// Publishes chunk, completion and failure events for one operation.
///
/// Streamed text is classified with the partial classifier on every chunk
/// and at completion, so its kind never flips on the last event. Batch
/// text gets the full classification, JSON sniffing included. With rich
/// rendering on, the result is also turned into HTML.
pub struct ProgressiveRenderer {
    bus: EventBusRef,
    capability: CapabilityKind,
    rich: bool,
    markdown: bool,
    streaming: bool,
}

impl ProgressiveRenderer {
    pub fn new(bus: EventBusRef, capability: CapabilityKind, rich: bool) -> Self {
        Self {
            bus,
            capability,
            rich,
            markdown: false,
            streaming: false,
        }
    }

    /// Whether the result comes from the streaming method.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Treat the final text as markdown without sniffing.
    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// Drain `result`, publishing every event, and return what it produced.
    pub async fn render(&self, mut result: ProgressiveResult) -> Outcome {
        let mut outcome = Outcome {
            chunks: Vec::new(),
            accumulated: String::new(),
            result: Err(CapabilityError::ExecutionFailed {
                kind: self.capability,
                message: "result ended without a terminal event".to_string(),
            }),
        };

        while let Some(event) = result.next().await {
            match event {
                ResultEvent::Chunk { chunk, accumulated } => {
                    let partial = self.render_text(&accumulated);
                    emit(
                        &self.bus,
                        event_names::RESULT_CHUNK,
                        &ResultChunkEvent {
                            capability: self.capability,
                            chunk: chunk.clone(),
                            accumulated: accumulated.clone(),
                            content_kind: partial.kind.as_str().to_string(),
                        },
                    );
                    outcome.chunks.push(chunk);
                    outcome.accumulated = accumulated;
                }
                ResultEvent::Completed { payload } => {
                    self.complete(&payload, false);
                    outcome.accumulated = payload.display_text();
                    outcome.result = Ok(payload);
                    break;
                }
                ResultEvent::Failed { error, partial } => {
                    self.fail(&error, partial.clone());
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

    fn render_text(&self, text: &str) -> Rendered {
        if self.markdown {
            smartnotes_render::render_as_markdown(text)
        } else if self.streaming {
            smartnotes_render::render_partial(text, self.rich)
        } else {
            smartnotes_render::render_final(text, self.rich)
        }
    }

    /// Publish a completion that did not come from a result stream.
    pub fn complete(&self, payload: &Payload, fallback: bool) {
        let text = payload.display_text();
        let rendered = match payload {
            Payload::Text(_) => self.render_text(&text),
            Payload::Json(_) => smartnotes_render::render_final(&text, self.rich),
        };
        tracing::debug!(
            capability = %self.capability,
            content_kind = %rendered.kind,
            fallback,
            "Result completed"
        );
        emit(
            &self.bus,
            event_names::RESULT_COMPLETED,
            &ResultCompletedEvent {
                capability: self.capability,
                payload: payload_value(payload),
                content_kind: rendered.kind.as_str().to_string(),
                rendered: if self.rich { rendered.html } else { None },
                fallback,
            },
        );
    }

    fn fail(&self, error: &CapabilityError, partial: Option<String>) {
        if error.is_informational() {
            tracing::info!(capability = %self.capability, "{}", error);
        } else {
            tracing::warn!(capability = %self.capability, code = error.code(), "{}", error);
        }
        emit(
            &self.bus,
            event_names::RESULT_FAILED,
            &ResultFailedEvent {
                capability: self.capability,
                code: error.code().to_string(),
                error: error.to_string(),
                partial,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartnotes_events::InMemoryEventBus;
    use std::sync::Arc;

    fn events(items: Vec<ResultEvent>) -> ProgressiveResult {
        ProgressiveResult::new(
            CapabilityKind::Writer,
            futures::stream::iter(items).boxed(),
        )
    }

    #[tokio::test]
    async fn test_chunks_classified_on_buffer() {
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = ProgressiveRenderer::new(bus.clone(), CapabilityKind::Writer, true)
            .with_streaming(true);
        let outcome = renderer
            .render(events(vec![
                ResultEvent::Chunk {
                    chunk: "# Ti".into(),
                    accumulated: "# Ti".into(),
                },
                ResultEvent::Chunk {
                    chunk: "tle".into(),
                    accumulated: "# Title".into(),
                },
                ResultEvent::Completed {
                    payload: Payload::Text("# Title".into()),
                },
            ]))
            .await;

        assert!(outcome.is_ok());
        let chunks = bus.events_for(event_names::RESULT_CHUNK);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].payload["content_kind"], "markdown");

        let done = bus.last_for(event_names::RESULT_COMPLETED).unwrap();
        assert_eq!(done["content_kind"], "markdown");
        assert_eq!(done["rendered"], "<p><h1>Title</h1></p>");
    }

    #[tokio::test]
    async fn test_failure_carries_partial() {
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = ProgressiveRenderer::new(bus.clone(), CapabilityKind::Writer, false);
        let outcome = renderer
            .render(events(vec![
                ResultEvent::Chunk {
                    chunk: "half".into(),
                    accumulated: "half".into(),
                },
                ResultEvent::Failed {
                    error: CapabilityError::Cancelled,
                    partial: Some("half".into()),
                },
            ]))
            .await;

        assert_eq!(outcome.accumulated, "half");
        let failed = bus.last_for(event_names::RESULT_FAILED).unwrap();
        assert_eq!(failed["code"], "cancelled");
        assert_eq!(failed["partial"], "half");
    }

    #[tokio::test]
    async fn test_json_payload_is_pretty_printed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = ProgressiveRenderer::new(bus.clone(), CapabilityKind::Proofreader, true);
        renderer.complete(&Payload::Json(serde_json::json!({"a": 1})), false);

        let done = bus.last_for(event_names::RESULT_COMPLETED).unwrap();
        assert_eq!(done["content_kind"], "json");
        assert_eq!(done["payload"]["a"], 1);
        assert!(done["rendered"].is_null());
    }

    #[tokio::test]
    async fn test_streamed_kind_is_stable_at_completion() {
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = ProgressiveRenderer::new(bus.clone(), CapabilityKind::PromptModel, true)
            .with_streaming(true);
        renderer
            .render(events(vec![
                ResultEvent::Chunk {
                    chunk: "<div>\n# Heading".into(),
                    accumulated: "<div>\n# Heading".into(),
                },
                ResultEvent::Completed {
                    payload: Payload::Text("<div>\n# Heading".into()),
                },
            ]))
            .await;

        let chunk = bus.last_for(event_names::RESULT_CHUNK).unwrap();
        let done = bus.last_for(event_names::RESULT_COMPLETED).unwrap();
        assert_eq!(chunk["content_kind"], "markdown");
        assert_eq!(done["content_kind"], chunk["content_kind"]);
    }

    #[tokio::test]
    async fn test_streamed_json_text_is_not_sniffed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = ProgressiveRenderer::new(bus.clone(), CapabilityKind::PromptModel, false)
            .with_streaming(true);
        renderer.complete(&Payload::Text(r#"{"a": 1}"#.into()), false);
        let done = bus.last_for(event_names::RESULT_COMPLETED).unwrap();
        assert_ne!(done["content_kind"], "json");

        let batch = ProgressiveRenderer::new(bus.clone(), CapabilityKind::PromptModel, false);
        batch.complete(&Payload::Text(r#"{"a": 1}"#.into()), false);
        let done = bus.last_for(event_names::RESULT_COMPLETED).unwrap();
        assert_eq!(done["content_kind"], "json");
    }
}
