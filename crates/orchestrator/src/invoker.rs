//! Capability invoker.
//!
//! `invoke` resolves a backend, consults the availability cache (probing
//! and recording on a miss), creates an instance while forwarding download
//! progress, runs the batch or streaming method and releases the instance.
//! All of it happens lazily inside the returned [`ProgressiveResult`].

use crate::availability::AvailabilityCache;
use crate::progressive::{ProgressiveResult, ResultEvent};
use crate::registry::{CapabilityHandle, CapabilityRegistry};
use futures::stream::{BoxStream, StreamExt};
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityConfig, CapabilityError, CapabilityInput,
    CapabilityKind, CreateOptions, InstanceRef, ModelParams, ProgressCallback, ProgressMonitor,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which execution method to use when an instance has both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPreference {
    #[default]
    Batch,
    Streaming,
}

/// UI-side options of one invocation.
#[derive(Clone, Default)]
pub struct InvokeOptions {
    /// Receives download progress while the instance is created.
    pub on_progress: Option<ProgressCallback>,
    pub preference: ExecutionPreference,
}

impl InvokeOptions {
    pub fn streaming() -> Self {
        Self {
            preference: ExecutionPreference::Streaming,
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_preference(mut self, preference: ExecutionPreference) -> Self {
        self.preference = preference;
        self
    }
}

impl std::fmt::Debug for InvokeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("preference", &self.preference)
            .finish()
    }
}

/// Creation options plus the per-call input.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub config: CapabilityConfig,
    pub input: CapabilityInput,
}

impl InvokeRequest {
    pub fn new(config: CapabilityConfig, input: CapabilityInput) -> Self {
        Self { config, input }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.config.kind()
    }
}

/// Releases an ephemeral instance when dropped, on every exit path.
pub(crate) struct InstanceGuard {
    kind: CapabilityKind,
    instance: Option<InstanceRef>,
}

impl InstanceGuard {
    pub(crate) fn new(kind: CapabilityKind, instance: InstanceRef) -> Self {
        Self {
            kind,
            instance: Some(instance),
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.destroy();
            tracing::debug!(kind = %self.kind, "Released ephemeral instance");
        }
    }
}

/// Ranges for the prompt model, falling back to defaults.
pub(crate) async fn probe_params(handle: &CapabilityHandle) -> ModelParams {
    match handle.backend.params().await {
        Ok(params) => params,
        Err(e) => {
            if !e.is_unsupported() {
                tracing::warn!(kind = %handle.kind, "params() failed, using defaults: {}", e);
            }
            ModelParams::default()
        }
    }
}

fn cancelled(signal: &Option<CancellationToken>) -> bool {
    signal.as_ref().is_some_and(|t| t.is_cancelled())
}

fn execution_error(kind: CapabilityKind, err: BackendError) -> CapabilityError {
    match err {
        BackendError::Cancelled => CapabilityError::Cancelled,
        other => CapabilityError::ExecutionFailed {
            kind,
            message: other.to_string(),
        },
    }
}

/// Run one input through an already created instance.
///
/// The instance is not released here; ephemeral callers hold an
/// [`InstanceGuard`]. When `signal` is given it is checked before the call
/// and raced against every await.
pub(crate) fn run_on_instance(
    kind: CapabilityKind,
    instance: InstanceRef,
    input: CapabilityInput,
    preference: ExecutionPreference,
    signal: Option<CancellationToken>,
) -> BoxStream<'static, ResultEvent> {
    async_stream::stream! {
        let surface = instance.surface();
        if surface.is_empty() {
            yield ResultEvent::failed(CapabilityError::NoUsableMethod { kind });
            return;
        }
        let use_streaming = surface.streaming
            && (!surface.batch || preference == ExecutionPreference::Streaming);

        if cancelled(&signal) {
            yield ResultEvent::failed(CapabilityError::Cancelled);
            return;
        }

        if !use_streaming {
            tracing::debug!(kind = %kind, "Running batch call");
            let result = match &signal {
                Some(token) => tokio::select! {
                    r = instance.run_batch(&input) => r,
                    _ = token.cancelled() => Err(BackendError::Cancelled),
                },
                None => instance.run_batch(&input).await,
            };
            match result {
                Ok(payload) => {
                    let text = payload.display_text();
                    yield ResultEvent::Chunk { chunk: text.clone(), accumulated: text };
                    yield ResultEvent::Completed { payload };
                }
                Err(e) => yield ResultEvent::failed(execution_error(kind, e)),
            }
            return;
        }

        tracing::debug!(kind = %kind, "Running streaming call");
        let mut chunks = match instance.run_streaming(&input) {
            Ok(chunks) => chunks,
            Err(e) => {
                yield ResultEvent::failed(execution_error(kind, e));
                return;
            }
        };
        let mut accumulated = String::new();
        loop {
            let next = match &signal {
                Some(token) => tokio::select! {
                    n = chunks.next() => n,
                    _ = token.cancelled() => Some(Err(BackendError::Cancelled)),
                },
                None => chunks.next().await,
            };
            match next {
                Some(Ok(chunk)) => {
                    accumulated.push_str(&chunk);
                    yield ResultEvent::Chunk { chunk, accumulated: accumulated.clone() };
                }
                Some(Err(e)) => {
                    tracing::debug!(kind = %kind, received = accumulated.len(), "Stream failed: {}", e);
                    let partial = (!accumulated.is_empty()).then(|| accumulated.clone());
                    yield ResultEvent::Failed { error: execution_error(kind, e), partial };
                    return;
                }
                None => break,
            }
        }
        yield ResultEvent::Completed { payload: accumulated.into() };
    }
    .boxed()
}

#[derive(Clone)]
pub struct Invoker {
    registry: CapabilityRegistry,
    cache: Arc<AvailabilityCache>,
}

impl Invoker {
    pub fn new(registry: CapabilityRegistry, cache: Arc<AvailabilityCache>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<AvailabilityCache> {
        &self.cache
    }

    /// Cached tier for the request, probing and recording on a miss.
    ///
    /// A backend without a probe counts as available and nothing is
    /// cached. Probe failures are returned and never cached.
    pub async fn check_availability(
        &self,
        handle: &CapabilityHandle,
        config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, CapabilityError> {
        let kind = handle.kind;
        let key = config.cache_key();
        if let Some(tier) = self.cache.get(kind, &key).await {
            tracing::debug!(kind = %kind, key = %key, tier = %tier, "Using cached availability");
            return Ok(tier);
        }
        match handle.backend.availability(config).await {
            Ok(tier) => {
                tracing::info!(kind = %kind, key = %key, tier = %tier, "Probed availability");
                self.cache.set(kind, &key, tier.clone()).await;
                Ok(tier)
            }
            Err(e) if e.is_unsupported() => Ok(AvailabilityTier::Available),
            Err(e) => {
                tracing::warn!(kind = %kind, key = %key, "Availability probe failed: {}", e);
                Err(CapabilityError::ProbeFailed {
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Resolve, check, create, execute and release.
    pub fn invoke(&self, request: InvokeRequest, options: InvokeOptions) -> ProgressiveResult {
        let kind = request.kind();
        let invoker = self.clone();
        let events = async_stream::stream! {
            let Some(handle) = invoker.registry.resolve(kind) else {
                yield ResultEvent::failed(CapabilityError::CapabilityAbsent { kind });
                return;
            };

            let InvokeRequest { mut config, input } = request;
            match invoker.check_availability(&handle, &config).await {
                Ok(tier) if tier.is_unavailable() => {
                    yield ResultEvent::failed(CapabilityError::Unavailable { kind });
                    return;
                }
                Ok(tier) if tier.needs_download() => {
                    tracing::info!(kind = %kind, tier = %tier, "Model download required before first use");
                }
                Ok(_) => {}
                Err(e) => {
                    yield ResultEvent::failed(e);
                    return;
                }
            }

            if let CapabilityConfig::Prompt(prompt) = &mut config {
                let params = probe_params(&handle).await;
                prompt.temperature = Some(params.clamp_temperature(prompt.temperature));
                prompt.top_k = Some(params.clamp_top_k(prompt.top_k));
            }

            let monitor = ProgressMonitor::from_callback(options.on_progress.clone());
            let created = handle
                .backend
                .create(CreateOptions::new(config).with_monitor(monitor.clone()))
                .await;
            monitor.seal();
            let instance = match created {
                Ok(instance) => instance,
                Err(e) => {
                    tracing::warn!(kind = %kind, "create() failed: {}", e);
                    yield ResultEvent::failed(CapabilityError::CreateFailed {
                        kind,
                        message: e.to_string(),
                    });
                    return;
                }
            };
            tracing::debug!(kind = %kind, source = ?handle.source, "Created instance");

            let _guard = InstanceGuard::new(kind, instance.clone());
            let mut events = run_on_instance(kind, instance, input, options.preference, None);
            while let Some(event) = events.next().await {
                yield event;
            }
        };
        ProgressiveResult::new(kind, events.boxed())
    }
}
