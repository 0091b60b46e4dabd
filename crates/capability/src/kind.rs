use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical capability name, independent of which backend provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Summarizer,
    Translator,
    Rewriter,
    Writer,
    Proofreader,
    Detector,
    PromptModel,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 7] = [
        CapabilityKind::Summarizer,
        CapabilityKind::Translator,
        CapabilityKind::Rewriter,
        CapabilityKind::Writer,
        CapabilityKind::Proofreader,
        CapabilityKind::Detector,
        CapabilityKind::PromptModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "summarizer",
            CapabilityKind::Translator => "translator",
            CapabilityKind::Rewriter => "rewriter",
            CapabilityKind::Writer => "writer",
            CapabilityKind::Proofreader => "proofreader",
            CapabilityKind::Detector => "detector",
            CapabilityKind::PromptModel => "prompt",
        }
    }

    /// Name under which the host exposes the real implementation.
    pub fn global_name(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "Summarizer",
            CapabilityKind::Translator => "Translator",
            CapabilityKind::Rewriter => "Rewriter",
            CapabilityKind::Writer => "Writer",
            CapabilityKind::Proofreader => "Proofreader",
            CapabilityKind::Detector => "LanguageDetector",
            CapabilityKind::PromptModel => "LanguageModel",
        }
    }

    /// Name under which a mock implementation is injected.
    pub fn mock_name(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "SummarizerMock",
            CapabilityKind::Translator => "TranslatorMock",
            CapabilityKind::Rewriter => "RewriterMock",
            CapabilityKind::Writer => "WriterMock",
            CapabilityKind::Proofreader => "ProofreaderMock",
            CapabilityKind::Detector => "LanguageDetectorMock",
            CapabilityKind::PromptModel => "LanguageModelMock",
        }
    }

    /// Older window-scoped names still accepted after the global name.
    pub fn legacy_aliases(&self) -> &'static [&'static str] {
        match self {
            CapabilityKind::PromptModel => &["ai"],
            _ => &[],
        }
    }

    /// Storage namespace for capabilities whose availability outlives the
    /// popup. `None` means the cache lives for the process only.
    pub fn cache_namespace(&self) -> Option<&'static str> {
        match self {
            CapabilityKind::Translator => Some("translatorAvailCache_v1"),
            CapabilityKind::Summarizer => Some("summarizerAvail_v1"),
            CapabilityKind::Writer => Some("writerAvail_v1"),
            CapabilityKind::Proofreader => Some("proofreaderAvail_v1"),
            CapabilityKind::PromptModel => Some("promptAvail_v1"),
            CapabilityKind::Rewriter | CapabilityKind::Detector => None,
        }
    }

    pub fn persists_availability(&self) -> bool {
        self.cache_namespace().is_some()
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CapabilityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown capability: {s}"))
    }
}
