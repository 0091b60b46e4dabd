//! Creation options for each capability.

use crate::CapabilityKind;
use serde::{Deserialize, Serialize};

/// Cache key for capabilities without a per-request discriminator.
pub const DEFAULT_CACHE_KEY: &str = "default";

/// Source language value that asks the backend to detect the language.
pub const AUTO_LANGUAGE: &str = "auto";

/// System turn seeded into every prompt session.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and friendly assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    Tldr,
    #[default]
    KeyPoints,
    Teaser,
    Headline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentFormat {
    #[default]
    PlainText,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentLength {
    Short,
    #[default]
    Medium,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizerConfig {
    #[serde(rename = "type")]
    pub summary_type: SummaryType,
    pub format: ContentFormat,
    pub length: ContentLength,
    #[serde(default)]
    pub shared_context: String,
    pub output_language: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            summary_type: SummaryType::default(),
            format: ContentFormat::default(),
            length: ContentLength::default(),
            shared_context: String::new(),
            output_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorConfig {
    pub source_language: String,
    pub target_language: String,
}

impl TranslatorConfig {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_language: source.into(),
            target_language: target.into(),
        }
    }

    pub fn is_auto_source(&self) -> bool {
        self.source_language.is_empty() || self.source_language == AUTO_LANGUAGE
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new(AUTO_LANGUAGE, "fr")
    }
}

/// Shared options of the rewriter and the writer.
///
/// Tone and length stay free-form strings because the two services accept
/// different vocabularies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeConfig {
    pub tone: String,
    pub format: ContentFormat,
    pub length: String,
    #[serde(default)]
    pub shared_context: String,
    pub expected_input_languages: Vec<String>,
    pub output_language: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            tone: "professional".to_string(),
            format: ContentFormat::default(),
            length: "medium".to_string(),
            shared_context: String::new(),
            expected_input_languages: vec!["en".to_string()],
            output_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofreaderConfig {
    pub expected_input_languages: Vec<String>,
}

impl Default for ProofreaderConfig {
    fn default() -> Self {
        Self {
            expected_input_languages: vec!["en".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: PromptRole,
    pub content: String,
}

impl PromptTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    #[serde(default)]
    pub initial_prompts: Vec<PromptTurn>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            top_k: None,
            initial_prompts: vec![PromptTurn::system(DEFAULT_SYSTEM_PROMPT)],
        }
    }
}

/// Options passed to `create`, one variant per capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum CapabilityConfig {
    Summarizer(SummarizerConfig),
    Translator(TranslatorConfig),
    Rewriter(ComposeConfig),
    Writer(ComposeConfig),
    Proofreader(ProofreaderConfig),
    Detector,
    Prompt(PromptConfig),
}

impl CapabilityConfig {
    pub fn default_for(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Summarizer => CapabilityConfig::Summarizer(Default::default()),
            CapabilityKind::Translator => CapabilityConfig::Translator(Default::default()),
            CapabilityKind::Rewriter => CapabilityConfig::Rewriter(Default::default()),
            CapabilityKind::Writer => CapabilityConfig::Writer(Default::default()),
            CapabilityKind::Proofreader => CapabilityConfig::Proofreader(Default::default()),
            CapabilityKind::Detector => CapabilityConfig::Detector,
            CapabilityKind::PromptModel => CapabilityConfig::Prompt(Default::default()),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityConfig::Summarizer(_) => CapabilityKind::Summarizer,
            CapabilityConfig::Translator(_) => CapabilityKind::Translator,
            CapabilityConfig::Rewriter(_) => CapabilityKind::Rewriter,
            CapabilityConfig::Writer(_) => CapabilityKind::Writer,
            CapabilityConfig::Proofreader(_) => CapabilityKind::Proofreader,
            CapabilityConfig::Detector => CapabilityKind::Detector,
            CapabilityConfig::Prompt(_) => CapabilityKind::PromptModel,
        }
    }

    /// Availability cache key: the language pair for translation,
    /// [`DEFAULT_CACHE_KEY`] otherwise.
    pub fn cache_key(&self) -> String {
        match self {
            CapabilityConfig::Translator(t) => {
                format!("{}:{}", t.source_language, t.target_language)
            }
            _ => DEFAULT_CACHE_KEY.to_string(),
        }
    }
}
