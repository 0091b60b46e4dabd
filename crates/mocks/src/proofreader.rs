use crate::timing::MockTiming;
use async_trait::async_trait;
use regex::Regex;
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput,
    CapabilityInstance, CapabilityKind, CreateOptions, Correction, ExecutionSurface, InstanceRef,
    Payload, ProofreadResult,
};
use std::sync::{Arc, LazyLock};

const DOWNLOAD_STEPS: u32 = 6;

struct Fix {
    pattern: Regex,
    replacement: &'static str,
    explanation: &'static str,
}

static FIXES: LazyLock<Vec<Fix>> = LazyLock::new(|| {
    [
        (r"(?i)\bI seen\b", "I saw", "Verb tense"),
        (r"(?i)\bloafs\b", "loaves", "Plural form"),
        (r"(?i)\bcan't\b", "couldn't", "Tone suggestion"),
    ]
    .into_iter()
    .map(|(pattern, replacement, explanation)| Fix {
        pattern: Regex::new(pattern).expect("valid proofreading regex"),
        replacement,
        explanation,
    })
    .collect()
});

/// Knows three mistakes. Offsets are byte offsets into the original text.
pub(crate) fn proofread(text: &str) -> ProofreadResult {
    let mut corrected = text.to_string();
    let mut corrections = Vec::new();
    for fix in FIXES.iter() {
        let Some(found) = fix.pattern.find(text) else {
            continue;
        };
        corrections.push(Correction {
            start_index: found.start(),
            end_index: found.end(),
            correction_type: Some("replacement".to_string()),
            explanation: Some(fix.explanation.to_string()),
            suggestions: vec![fix.replacement.to_string()],
            replacement: Some(fix.replacement.to_string()),
        });
        corrected = fix
            .pattern
            .replace_all(&corrected, fix.replacement)
            .into_owned();
    }
    ProofreadResult {
        corrected,
        corrections,
    }
}

pub struct MockProofreader {
    timing: MockTiming,
}

impl MockProofreader {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

#[async_trait]
impl CapabilityBackend for MockProofreader {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Proofreader
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Ok(AvailabilityTier::Available)
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        if !matches!(options.config, CapabilityConfig::Proofreader(_)) {
            return Err(crate::mismatched_options(self.kind()));
        }
        self.timing
            .simulate_download(&options.monitor, DOWNLOAD_STEPS)
            .await;
        Ok(Arc::new(ProofreaderInstance))
    }
}

struct ProofreaderInstance;

#[async_trait]
impl CapabilityInstance for ProofreaderInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BATCH_ONLY
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        let result = proofread(&input.text);
        serde_json::to_value(result)
            .map(Payload::Json)
            .map_err(|e| BackendError::failed(e.to_string()))
    }

    fn destroy(&self) {
        tracing::trace!("Mock proofreader destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_first_occurrence_in_original() {
        let text = "I seen two loafs. I seen them. I can't lie.";
        let result = proofread(text);

        assert_eq!(
            result.corrected,
            "I saw two loaves. I saw them. I couldn't lie."
        );
        assert_eq!(result.corrections.len(), 3);

        let tense = &result.corrections[0];
        assert_eq!((tense.start_index, tense.end_index), (0, 6));
        assert_eq!(tense.excerpt(text), "I seen");
        assert_eq!(tense.explanation.as_deref(), Some("Verb tense"));
        assert_eq!(tense.suggestions, vec!["I saw"]);

        assert_eq!(result.corrections[1].excerpt(text), "loafs");
        assert_eq!(result.corrections[2].excerpt(text), "can't");
        assert_eq!(
            result.corrections[2].correction_type.as_deref(),
            Some("replacement")
        );
    }

    #[test]
    fn test_clean_text_has_no_corrections() {
        let result = proofread("Everything here is fine.");
        assert!(result.corrections.is_empty());
        assert_eq!(result.corrected, "Everything here is fine.");
    }

    #[tokio::test]
    async fn test_payload_round_trips_to_result() {
        let payload = ProofreaderInstance
            .run_batch(&CapabilityInput::new("Two loafs"))
            .await
            .unwrap();
        let json = payload.as_json().unwrap();
        assert_eq!(json["corrections"][0]["type"], "replacement");
        assert_eq!(json["corrections"][0]["startIndex"], 4);

        let parsed = ProofreadResult::from_payload(&payload).unwrap();
        assert_eq!(parsed.corrected, "Two loaves");
    }

    #[test]
    fn test_batch_only() {
        let surface = ProofreaderInstance.surface();
        assert!(surface.batch && !surface.streaming);
    }
}
