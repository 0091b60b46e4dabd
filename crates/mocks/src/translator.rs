use crate::timing::{sentence_chunks, MockTiming};
use async_trait::async_trait;
use futures::stream::StreamExt;
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput,
    CapabilityInstance, CapabilityKind, ChunkStream, CreateOptions, ExecutionSurface, InstanceRef,
    Payload, TranslatorConfig,
};
use std::sync::Arc;

const DOWNLOAD_STEPS: u32 = 10;

/// Language pairs the mock claims to support besides an automatic source.
const SUPPORTED_PAIRS: [(&str, &str); 5] = [
    ("en", "fr"),
    ("en", "es"),
    ("en", "de"),
    ("fr", "en"),
    ("es", "en"),
];

/// Prefixes the text with the target language code.
pub struct MockTranslator {
    timing: MockTiming,
}

impl MockTranslator {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

pub(crate) fn pair_tier(config: &TranslatorConfig) -> AvailabilityTier {
    if config.source_language.is_empty() || config.is_auto_source() {
        return AvailabilityTier::Available;
    }
    let source = config.source_language.to_lowercase();
    let target = config.target_language.to_lowercase();
    if SUPPORTED_PAIRS
        .iter()
        .any(|(s, t)| *s == source && *t == target)
    {
        AvailabilityTier::Available
    } else {
        AvailabilityTier::Unavailable
    }
}

#[async_trait]
impl CapabilityBackend for MockTranslator {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Translator
    }

    async fn availability(
        &self,
        config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        match config {
            CapabilityConfig::Translator(pair) => Ok(pair_tier(pair)),
            _ => Err(crate::mismatched_options(self.kind())),
        }
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        let CapabilityConfig::Translator(pair) = options.config else {
            return Err(crate::mismatched_options(self.kind()));
        };
        self.timing
            .simulate_download(&options.monitor, DOWNLOAD_STEPS)
            .await;
        tracing::debug!(
            source = %pair.source_language,
            target = %pair.target_language,
            "Created mock translator"
        );
        Ok(Arc::new(TranslatorInstance {
            target: pair.target_language,
            timing: self.timing,
        }))
    }
}

struct TranslatorInstance {
    target: String,
    timing: MockTiming,
}

impl TranslatorInstance {
    fn prefix(&self) -> String {
        format!("[{}] ", self.target)
    }
}

#[async_trait]
impl CapabilityInstance for TranslatorInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BOTH
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        Ok(format!("{}{}", self.prefix(), input.text).into())
    }

    fn run_streaming(&self, input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        let timing = self.timing;
        let mut chunks = vec![self.prefix()];
        chunks.extend(sentence_chunks(&input.text));
        Ok(async_stream::stream! {
            for chunk in chunks {
                timing.before_chunk().await;
                yield Ok(chunk);
            }
        }
        .boxed())
    }
}
