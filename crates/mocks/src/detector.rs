use crate::timing::MockTiming;
use async_trait::async_trait;
use regex::Regex;
use smartnotes_capability::{
    BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput, CapabilityInstance,
    CapabilityKind, CreateOptions, ExecutionSurface, InstanceRef, LanguageDetection, Payload,
};
use std::sync::{Arc, LazyLock};

const DOWNLOAD_STEPS: u32 = 8;

static HINTS: LazyLock<Vec<(&'static str, Regex, f64)>> = LazyLock::new(|| {
    [
        ("en", r"\b(the|and|is|this|that)\b", 0.9),
        ("fr", r"\b(le|la|et|est|ce)\b", 0.85),
        ("es", r"\b(hola|que|el|la|es)\b", 0.85),
        ("de", r"\b(hallo|und|das|ist)\b", 0.85),
    ]
    .into_iter()
    .map(|(lang, pattern, confidence)| {
        (
            lang,
            Regex::new(pattern).expect("valid language hint regex"),
            confidence,
        )
    })
    .collect()
});

/// Guesses from a handful of common words per language. Every language
/// with a hit is reported; no hit yields `und`.
pub(crate) fn detect(text: &str) -> Vec<LanguageDetection> {
    let lowered = text.to_lowercase();
    let hits: Vec<LanguageDetection> = HINTS
        .iter()
        .filter(|(_, pattern, _)| pattern.is_match(&lowered))
        .map(|(lang, _, confidence)| LanguageDetection {
            detected_language: lang.to_string(),
            confidence: *confidence,
        })
        .collect();
    if hits.is_empty() {
        vec![LanguageDetection {
            detected_language: "und".to_string(),
            confidence: 0.2,
        }]
    } else {
        hits
    }
}

/// Has no availability probe, like early detector builds.
pub struct MockLanguageDetector {
    timing: MockTiming,
}

impl MockLanguageDetector {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

#[async_trait]
impl CapabilityBackend for MockLanguageDetector {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Detector
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        if !matches!(options.config, CapabilityConfig::Detector) {
            return Err(crate::mismatched_options(self.kind()));
        }
        self.timing
            .simulate_download(&options.monitor, DOWNLOAD_STEPS)
            .await;
        Ok(Arc::new(DetectorInstance))
    }
}

struct DetectorInstance;

#[async_trait]
impl CapabilityInstance for DetectorInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BATCH_ONLY
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        serde_json::to_value(detect(&input.text))
            .map(Payload::Json)
            .map_err(|e| BackendError::failed(e.to_string()))
    }
}
