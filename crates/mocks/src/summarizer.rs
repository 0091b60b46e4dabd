use crate::timing::{sentence_chunks, MockTiming, SENTENCE};
use async_trait::async_trait;
use futures::stream::StreamExt;
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput,
    CapabilityInstance, CapabilityKind, ChunkStream, CreateOptions, ExecutionSurface, InstanceRef,
    Payload,
};
use std::sync::Arc;

const DOWNLOAD_STEPS: u32 = 8;
const SUMMARY_SENTENCES: usize = 3;

/// Keeps the first three sentences.
pub struct MockSummarizer {
    timing: MockTiming,
}

impl MockSummarizer {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

pub(crate) fn summarize(text: &str) -> String {
    let sentences: Vec<&str> = SENTENCE.find_iter(text).map(|m| m.as_str()).collect();
    if sentences.is_empty() {
        return text.trim().to_string();
    }
    sentences[..sentences.len().min(SUMMARY_SENTENCES)]
        .join(" ")
        .trim()
        .to_string()
}

#[async_trait]
impl CapabilityBackend for MockSummarizer {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Summarizer
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Ok(AvailabilityTier::Available)
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        if !matches!(options.config, CapabilityConfig::Summarizer(_)) {
            return Err(crate::mismatched_options(self.kind()));
        }
        self.timing
            .simulate_download(&options.monitor, DOWNLOAD_STEPS)
            .await;
        Ok(Arc::new(SummarizerInstance {
            timing: self.timing,
        }))
    }
}

struct SummarizerInstance {
    timing: MockTiming,
}

#[async_trait]
impl CapabilityInstance for SummarizerInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BOTH
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        Ok(summarize(&input.text).into())
    }

    fn run_streaming(&self, input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        let timing = self.timing;
        let chunks = sentence_chunks(&summarize(&input.text));
        Ok(async_stream::stream! {
            for chunk in chunks {
                timing.before_chunk().await;
                yield Ok(chunk);
            }
        }
        .boxed())
    }
}
