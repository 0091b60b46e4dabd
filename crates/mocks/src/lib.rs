//! In-process stand-ins for every capability.
//!
//! Mocks are installed on the window scope under their `Mock` names, so a
//! host binding of the same capability always wins resolution. Outputs are
//! deterministic and streaming output concatenates to the batch output.

mod compose;
mod detector;
mod prompt;
mod proofreader;
mod summarizer;
mod timing;
mod translator;

pub use compose::{MockRewriter, MockWriter};
pub use detector::MockLanguageDetector;
pub use prompt::MockLanguageModel;
pub use proofreader::MockProofreader;
pub use summarizer::MockSummarizer;
pub use timing::MockTiming;
pub use translator::MockTranslator;

use smartnotes_capability::{BackendError, CapabilityKind};
use smartnotes_orchestrator::{BackendRef, BindingScope, HostBindings};
use std::sync::Arc;

pub(crate) fn mismatched_options(kind: CapabilityKind) -> BackendError {
    BackendError::failed(format!(
        "{} mock received options for another capability",
        kind
    ))
}

/// The mock backend of `kind`.
pub fn backend_for(kind: CapabilityKind, timing: MockTiming) -> BackendRef {
    match kind {
        CapabilityKind::Summarizer => Arc::new(MockSummarizer::new(timing)),
        CapabilityKind::Translator => Arc::new(MockTranslator::new(timing)),
        CapabilityKind::Rewriter => Arc::new(MockRewriter::new(timing)),
        CapabilityKind::Writer => Arc::new(MockWriter::new(timing)),
        CapabilityKind::Proofreader => Arc::new(MockProofreader::new(timing)),
        CapabilityKind::Detector => Arc::new(MockLanguageDetector::new(timing)),
        CapabilityKind::PromptModel => Arc::new(MockLanguageModel::new(timing)),
    }
}

/// Bind every mock under its window-scoped mock name.
pub fn install(bindings: &HostBindings, timing: MockTiming) {
    for kind in CapabilityKind::ALL {
        bindings.install(
            BindingScope::Window,
            kind.mock_name(),
            backend_for(kind, timing),
        );
    }
    tracing::info!("Installed mock capabilities");
}

/// Remove every mock binding. Host bindings are untouched.
pub fn uninstall(bindings: &HostBindings) {
    for kind in CapabilityKind::ALL {
        bindings.remove(BindingScope::Window, kind.mock_name());
    }
    tracing::info!("Removed mock capabilities");
}

/// Whether any mock is currently bound.
pub fn is_installed(bindings: &HostBindings) -> bool {
    CapabilityKind::ALL
        .iter()
        .any(|kind| bindings.contains(BindingScope::Window, kind.mock_name()))
}
