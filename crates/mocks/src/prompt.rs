use crate::timing::{char_chunks, truncate_chars, MockTiming, CHUNK_CHARS};
use async_trait::async_trait;
use futures::stream::StreamExt;
use regex::Regex;
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput,
    CapabilityInstance, CapabilityKind, ChunkStream, CreateOptions, ExecutionSurface, InstanceRef,
    ModelParams, Payload,
};
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;

const DOWNLOAD_STEPS: u32 = 8;
const ECHO_MAX_CHARS: usize = 300;

pub(crate) const PARAMS: ModelParams = ModelParams {
    default_temperature: 1.0,
    max_temperature: Some(2.0),
    default_top_k: 3,
    max_top_k: Some(128),
};

static POTTERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pottery|mug|bowl|ceramic").expect("valid regex"));

fn wants_boolean(input: &CapabilityInput) -> bool {
    input
        .response_constraint
        .as_ref()
        .and_then(|schema| schema.get("type"))
        .and_then(|t| t.as_str())
        == Some("boolean")
}

/// Echoes the prompt, or classifies pottery when a boolean is requested.
pub(crate) fn respond(input: &CapabilityInput) -> String {
    if wants_boolean(input) {
        let verdict = POTTERY.is_match(&input.text.to_lowercase());
        return serde_json::Value::Bool(verdict).to_string();
    }
    format!(
        "Mock response to: {}",
        truncate_chars(&input.text, ECHO_MAX_CHARS)
    )
}

pub struct MockLanguageModel {
    timing: MockTiming,
}

impl MockLanguageModel {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

#[async_trait]
impl CapabilityBackend for MockLanguageModel {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::PromptModel
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Ok(AvailabilityTier::Available)
    }

    async fn params(&self) -> Result<ModelParams, BackendError> {
        Ok(PARAMS)
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        let CapabilityConfig::Prompt(config) = &options.config else {
            return Err(crate::mismatched_options(self.kind()));
        };
        tracing::debug!(
            temperature = ?config.temperature,
            top_k = ?config.top_k,
            "Creating mock language model"
        );

        let download = self
            .timing
            .simulate_download(&options.monitor, DOWNLOAD_STEPS);
        match &options.signal {
            Some(signal) => tokio::select! {
                _ = download => {}
                _ = signal.cancelled() => return Err(BackendError::Cancelled),
            },
            None => download.await,
        }

        Ok(Arc::new(PromptInstance {
            timing: self.timing,
            signal: options.signal.clone(),
        }))
    }
}

struct PromptInstance {
    timing: MockTiming,
    signal: Option<CancellationToken>,
}

impl PromptInstance {
    fn cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_cancelled())
    }
}

#[async_trait]
impl CapabilityInstance for PromptInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BOTH
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        if self.cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.timing.before_call().await;
        if self.cancelled() {
            return Err(BackendError::Cancelled);
        }
        Ok(respond(input).into())
    }

    fn run_streaming(&self, input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        let timing = self.timing;
        let signal = self.signal.clone();
        let chunks = char_chunks(&respond(input), CHUNK_CHARS);
        Ok(async_stream::stream! {
            for chunk in chunks {
                timing.before_chunk().await;
                if signal.as_ref().is_some_and(|s| s.is_cancelled()) {
                    yield Err(BackendError::Cancelled);
                    return;
                }
                yield Ok(chunk);
            }
        }
        .boxed())
    }

    async fn clone_instance(&self) -> Result<InstanceRef, BackendError> {
        if self.cancelled() {
            return Err(BackendError::Cancelled);
        }
        Ok(Arc::new(PromptInstance {
            timing: self.timing,
            signal: self.signal.clone(),
        }))
    }

    fn destroy(&self) {
        tracing::trace!("Mock language model destroyed");
    }
}
