//! The backend contract implemented by real host bindings and mocks alike.
//!
//! Optional host methods (availability probe, `params`, batch or streaming
//! execution, `clone`) have default implementations returning
//! [`BackendError::Unsupported`]; callers treat that as "method absent".

use crate::{
    AvailabilityTier, CapabilityConfig, CapabilityInput, CapabilityKind, Payload, ProgressMonitor,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure raised by a backend or an instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),

    /// The cancellation signal passed at creation fired.
    #[error("the operation was aborted")]
    Cancelled,

    /// The optional method is not exposed by this backend.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl BackendError {
    pub fn failed(message: impl Into<String>) -> Self {
        BackendError::Failed(message.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, BackendError::Unsupported(_))
    }
}

/// Incremental output of a streaming call.
pub type ChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// Shared handle to a created instance.
pub type InstanceRef = Arc<dyn CapabilityInstance>;

/// Options for [`CapabilityBackend::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub config: CapabilityConfig,
    /// Receives `downloadprogress` events until creation resolves.
    pub monitor: ProgressMonitor,
    /// Abort signal; only the prompt session passes one.
    pub signal: Option<CancellationToken>,
}

impl CreateOptions {
    pub fn new(config: CapabilityConfig) -> Self {
        Self {
            config,
            monitor: ProgressMonitor::silent(),
            signal: None,
        }
    }

    pub fn with_monitor(mut self, monitor: ProgressMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Sampling ranges advertised by the prompt model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    pub default_temperature: f64,
    #[serde(default)]
    pub max_temperature: Option<f64>,
    pub default_top_k: u32,
    #[serde(default)]
    pub max_top_k: Option<u32>,
}

impl ModelParams {
    pub fn clamp_temperature(&self, requested: Option<f64>) -> f64 {
        let value = requested
            .filter(|t| t.is_finite())
            .unwrap_or(self.default_temperature);
        let max = self.max_temperature.unwrap_or(f64::MAX);
        value.clamp(0.0, max.max(0.0))
    }

    pub fn clamp_top_k(&self, requested: Option<u32>) -> u32 {
        let value = requested.unwrap_or(self.default_top_k);
        let max = self.max_top_k.unwrap_or(u32::MAX);
        value.clamp(1, max.max(1))
    }
}

impl Default for ModelParams {
    /// Used when the backend has no `params` probe or it fails.
    fn default() -> Self {
        Self {
            default_temperature: 1.0,
            max_temperature: None,
            default_top_k: 3,
            max_top_k: None,
        }
    }
}

/// Which execution methods an instance exposes. Resolved once per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionSurface {
    pub batch: bool,
    pub streaming: bool,
}

impl ExecutionSurface {
    pub const BATCH_ONLY: Self = Self {
        batch: true,
        streaming: false,
    };
    pub const BOTH: Self = Self {
        batch: true,
        streaming: true,
    };
    pub const STREAMING_ONLY: Self = Self {
        batch: false,
        streaming: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.batch && !self.streaming
    }
}

/// Factory side of a capability: probe and create.
#[async_trait]
pub trait CapabilityBackend: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    /// Availability for the given options. The default reports no probe.
    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Err(BackendError::Unsupported("availability"))
    }

    /// Sampling ranges. Only the prompt model exposes this.
    async fn params(&self) -> Result<ModelParams, BackendError> {
        Err(BackendError::Unsupported("params"))
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError>;
}

/// A created, configured instance.
#[async_trait]
pub trait CapabilityInstance: Send + Sync {
    fn surface(&self) -> ExecutionSurface;

    async fn run_batch(&self, _input: &CapabilityInput) -> Result<Payload, BackendError> {
        Err(BackendError::Unsupported("batch execution"))
    }

    fn run_streaming(&self, _input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        Err(BackendError::Unsupported("streaming execution"))
    }

    /// Independent copy carrying the same conversation state.
    async fn clone_instance(&self) -> Result<InstanceRef, BackendError> {
        Err(BackendError::Unsupported("clone"))
    }

    /// Release the instance. Must be safe to call more than once.
    fn destroy(&self) {}
}
