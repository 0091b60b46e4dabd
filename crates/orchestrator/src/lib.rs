//! Capability orchestration.
//!
//! Discovers which capabilities the host provides, caches their
//! availability, creates instances with download progress, normalizes
//! batch and streaming execution into one progressive result, and manages
//! the prompt session.

mod availability;
mod context;
mod invoker;
mod progressive;
mod registry;
mod session;

pub use availability::{AvailabilityCache, LANGUAGE_DETECTOR_READY_KEY};
pub use context::OrchestrationContext;
pub use invoker::{ExecutionPreference, InvokeOptions, InvokeRequest, Invoker};
pub use progressive::{Outcome, ProgressiveResult, ResultEvent};
pub use registry::{
    BackendRef, BackendSource, BindingScope, CapabilityHandle, CapabilityRegistry, HostBindings,
};
pub use session::{
    ClonedSession, SessionManager, SessionParameters, SessionRequest, SessionState,
};
