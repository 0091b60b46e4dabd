//! Typed views of the structured payloads.

use crate::Payload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub start_index: usize,
    pub end_index: usize,
    #[serde(rename = "type", default)]
    pub correction_type: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub replacement: Option<String>,
}

impl Correction {
    /// The erroneous excerpt of `source` this correction points at.
    ///
    /// Offsets are clamped and snapped to char boundaries so a
    /// misbehaving backend cannot make this panic.
    pub fn excerpt<'a>(&self, source: &'a str) -> &'a str {
        let mut start = self.start_index.min(source.len());
        let mut end = self.end_index.clamp(start, source.len());
        while !source.is_char_boundary(start) {
            start -= 1;
        }
        while !source.is_char_boundary(end) {
            end += 1;
        }
        &source[start..end]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofreadResult {
    #[serde(alias = "correctedInput", default)]
    pub corrected: String,
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

impl ProofreadResult {
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Json(v) => serde_json::from_value(v.clone()).ok(),
            Payload::Text(s) => serde_json::from_str(s).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    pub detected_language: String,
    pub confidence: f64,
}

impl LanguageDetection {
    /// Ranked detections carried by a detector payload.
    pub fn list_from_payload(payload: &Payload) -> Vec<Self> {
        let parsed = match payload {
            Payload::Json(v) => serde_json::from_value(v.clone()).ok(),
            Payload::Text(s) => serde_json::from_str(s).ok(),
        };
        parsed.unwrap_or_default()
    }

    pub fn is_undetermined(&self) -> bool {
        self.detected_language == "und"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proofread_from_payload() {
        let payload = Payload::Json(json!({
            "corrected": "I saw it",
            "corrections": [{
                "startIndex": 0, "endIndex": 6, "type": "replacement",
                "explanation": "Verb tense", "suggestions": ["I saw"], "replacement": "I saw"
            }]
        }));
        let result = ProofreadResult::from_payload(&payload).unwrap();
        assert_eq!(result.corrected, "I saw it");
        assert_eq!(result.corrections[0].excerpt("I seen it"), "I seen");
        assert_eq!(result.corrections[0].correction_type.as_deref(), Some("replacement"));
    }

    #[test]
    fn test_proofread_accepts_host_field_name() {
        let payload = Payload::Json(json!({"correctedInput": "ok", "corrections": []}));
        assert_eq!(ProofreadResult::from_payload(&payload).unwrap().corrected, "ok");
    }

    #[test]
    fn test_excerpt_clamps_out_of_range() {
        let c = Correction {
            start_index: 3,
            end_index: 99,
            correction_type: None,
            explanation: None,
            suggestions: vec![],
            replacement: None,
        };
        assert_eq!(c.excerpt("héllo"), "llo");
    }

    #[test]
    fn test_detections_from_payload() {
        let payload = Payload::Json(json!([
            {"detectedLanguage": "en", "confidence": 0.9},
            {"detectedLanguage": "fr", "confidence": 0.85}
        ]));
        let list = LanguageDetection::list_from_payload(&payload);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].detected_language, "en");
        assert!(LanguageDetection::list_from_payload(&Payload::Text("nope".into())).is_empty());
    }
}
