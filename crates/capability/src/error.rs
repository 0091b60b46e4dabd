//! Error types for capability orchestration.

use crate::CapabilityKind;
use thiserror::Error;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, CapabilityError>;

/// Terminal failure of an orchestrated operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// No backend for the capability resolves in this environment.
    #[error("{kind} capability not available in this environment")]
    CapabilityAbsent { kind: CapabilityKind },

    /// The probe reported `unavailable` for this request.
    #[error("{kind} is unavailable for this request")]
    Unavailable { kind: CapabilityKind },

    /// The availability probe itself failed. Never cached.
    #[error("availability check for {kind} failed: {message}")]
    ProbeFailed { kind: CapabilityKind, message: String },

    /// `create` failed.
    #[error("failed to create {kind}: {message}")]
    CreateFailed { kind: CapabilityKind, message: String },

    /// The batch call or the stream failed.
    #[error("{kind} failed: {message}")]
    ExecutionFailed { kind: CapabilityKind, message: String },

    /// The instance exposes neither a batch nor a streaming method.
    #[error("{kind} has no usable execution method")]
    NoUsableMethod { kind: CapabilityKind },

    /// The prompt session was aborted.
    #[error("operation was cancelled")]
    Cancelled,

    /// A session operation needs an active session and none exists.
    #[error("no active session")]
    NoActiveSession,

    /// The active session's instance does not support the operation.
    #[error("session does not support {operation}")]
    UnsupportedOperation { operation: String },

    /// A session is already active; destroy it before creating another.
    #[error("a session is already active")]
    SessionActive,
}

impl CapabilityError {
    /// Stable identifier used in event payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CapabilityError::CapabilityAbsent { .. } => "capability_absent",
            CapabilityError::Unavailable { .. } => "unavailable",
            CapabilityError::ProbeFailed { .. } => "probe_failed",
            CapabilityError::CreateFailed { .. } => "create_failed",
            CapabilityError::ExecutionFailed { .. } => "execution_failed",
            CapabilityError::NoUsableMethod { .. } => "no_usable_method",
            CapabilityError::Cancelled => "cancelled",
            CapabilityError::NoActiveSession => "no_active_session",
            CapabilityError::UnsupportedOperation { .. } => "unsupported_operation",
            CapabilityError::SessionActive => "session_active",
        }
    }

    /// Retrying the same operation may succeed without an environment change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CapabilityError::ProbeFailed { .. }
                | CapabilityError::CreateFailed { .. }
                | CapabilityError::ExecutionFailed { .. }
        )
    }

    /// Outcome the user asked for rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, CapabilityError::Cancelled)
    }
}
