use crate::constants::DEFAULT_TARGET_LANGUAGE;
use smartnotes_capability::{ComposeConfig, ProofreaderConfig, SummarizerConfig, AUTO_LANGUAGE};
use smartnotes_orchestrator::SessionRequest;

/// What the popup form currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupState {
    pub source_text: String,
    /// `auto` until detection or the user picks one.
    pub source_language: String,
    pub target_language: String,
    pub summarizer: SummarizerConfig,
    /// Shared by the rewriter and the writer.
    pub compose: ComposeConfig,
    pub proofreader: ProofreaderConfig,
    pub prompt: SessionRequest,
    /// Display text of the last successful action. Saved as a note.
    pub last_output: Option<String>,
    pub last_prompt: String,
    pub mock_mode: bool,
}

impl Default for PopupState {
    fn default() -> Self {
        Self {
            source_text: String::new(),
            source_language: AUTO_LANGUAGE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            summarizer: SummarizerConfig::default(),
            compose: ComposeConfig::default(),
            proofreader: ProofreaderConfig::default(),
            prompt: SessionRequest::default(),
            last_output: None,
            last_prompt: String::new(),
            mock_mode: false,
        }
    }
}
