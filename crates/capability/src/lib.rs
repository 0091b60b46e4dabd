//! Capability contract shared by the orchestrator, the mock backends and
//! the popup.
//!
//! A capability is one of the on-device AI services the host may expose
//! (summarizer, translator, rewriter, writer, proofreader, language
//! detector, prompt model). Every backend, real or mock, implements the
//! same two traits: [`CapabilityBackend`] for availability probing and
//! instance creation, and [`CapabilityInstance`] for execution.

mod backend;
mod config;
mod error;
mod kind;
mod payload;
mod progress;
mod results;
mod tier;

pub use backend::{
    BackendError, CapabilityBackend, CapabilityInstance, ChunkStream, CreateOptions,
    ExecutionSurface, InstanceRef, ModelParams,
};
pub use config::{
    CapabilityConfig, ComposeConfig, ContentFormat, ContentLength, PromptConfig, PromptRole,
    PromptTurn, ProofreaderConfig, SummarizerConfig, SummaryType, TranslatorConfig,
    AUTO_LANGUAGE, DEFAULT_CACHE_KEY, DEFAULT_SYSTEM_PROMPT,
};
pub use error::{CapabilityError, Result};
pub use kind::CapabilityKind;
pub use payload::{CapabilityInput, Payload};
pub use progress::{ProgressCallback, ProgressEvent, ProgressMonitor};
pub use results::{Correction, LanguageDetection, ProofreadResult};
pub use tier::AvailabilityTier;
