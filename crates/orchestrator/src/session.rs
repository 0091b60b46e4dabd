//! Prompt session lifecycle.
//!
//! At most one session exists. `Absent -> Creating` when create starts,
//! `Creating -> Active` once the backend resolves, `Active -> Aborted` when
//! its cancellation token fires, and back to `Absent` on destroy from any
//! state. The slot lock is never held across a backend call, so abort and
//! destroy reach a session that is still being created. The session owns
//! its instance; only [`SessionManager::destroy`] releases it.

use crate::invoker::{
    probe_params, run_on_instance, ExecutionPreference, InvokeOptions, InvokeRequest, Invoker,
};
use crate::progressive::{ProgressiveResult, ResultEvent};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use smartnotes_capability::{
    BackendError, CapabilityConfig, CapabilityError, CapabilityInput, CapabilityKind,
    CreateOptions, InstanceRef, ProgressCallback, ProgressMonitor, PromptConfig, PromptTurn,
    Result, DEFAULT_SYSTEM_PROMPT,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const KIND: CapabilityKind = CapabilityKind::PromptModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Absent,
    Creating,
    Active,
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Absent => "absent",
            SessionState::Creating => "creating",
            SessionState::Active => "active",
            SessionState::Aborted => "aborted",
        }
    }
}

/// Sampling parameters actually used, after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParameters {
    pub temperature: f64,
    pub top_k: u32,
}

/// Caller-requested parameters. `None` takes the model default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionRequest {
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
}

struct Session {
    controller: CancellationToken,
    instance: InstanceRef,
    parameters: SessionParameters,
}

impl Session {
    fn state(&self) -> SessionState {
        if self.controller.is_cancelled() {
            SessionState::Aborted
        } else {
            SessionState::Active
        }
    }
}

enum Slot {
    /// `create` is awaiting the backend. `id` tells a finishing create
    /// whether its entry is still the current one.
    Creating { id: u64, controller: CancellationToken },
    Ready(Session),
}

impl Slot {
    fn state(&self) -> SessionState {
        match self {
            Slot::Creating { .. } => SessionState::Creating,
            Slot::Ready(session) => session.state(),
        }
    }

    fn session(&self) -> Option<&Session> {
        match self {
            Slot::Ready(session) => Some(session),
            Slot::Creating { .. } => None,
        }
    }
}

/// A clone of the active session's instance. Released on drop.
pub struct ClonedSession {
    instance: Option<InstanceRef>,
}

impl ClonedSession {
    pub fn instance(&self) -> Option<&InstanceRef> {
        self.instance.as_ref()
    }

    /// Run a prompt against the clone without touching the session.
    pub fn execute(
        &self,
        input: CapabilityInput,
        preference: ExecutionPreference,
    ) -> ProgressiveResult {
        match &self.instance {
            Some(instance) => ProgressiveResult::new(
                KIND,
                run_on_instance(KIND, instance.clone(), input, preference, None),
            ),
            None => ProgressiveResult::failed(KIND, CapabilityError::NoActiveSession),
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.destroy();
            tracing::debug!("Released cloned session");
        }
    }
}

impl Drop for ClonedSession {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[derive(Clone)]
pub struct SessionManager {
    invoker: Invoker,
    slot: Arc<Mutex<Option<Slot>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            slot: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.slot
            .lock()
            .await
            .as_ref()
            .map_or(SessionState::Absent, Slot::state)
    }

    pub async fn parameters(&self) -> Option<SessionParameters> {
        self.slot
            .lock()
            .await
            .as_ref()
            .and_then(Slot::session)
            .map(|s| s.parameters)
    }

    /// Create the session.
    ///
    /// Fails with [`CapabilityError::SessionActive`] while one is active or
    /// being created. An aborted session is released and replaced. Aborting
    /// or destroying during creation cancels the signal passed to the
    /// backend, and this call then fails with `Cancelled`.
    pub async fn create(
        &self,
        request: SessionRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<SessionParameters> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let controller = CancellationToken::new();
        let handle = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref().map(Slot::state) {
                Some(SessionState::Active | SessionState::Creating) => {
                    return Err(CapabilityError::SessionActive)
                }
                _ => {}
            }
            let handle = self
                .invoker
                .registry()
                .resolve(KIND)
                .ok_or(CapabilityError::CapabilityAbsent { kind: KIND })?;
            if let Some(Slot::Ready(old)) = slot.take() {
                old.instance.destroy();
                tracing::debug!("Replacing aborted session");
            }
            *slot = Some(Slot::Creating {
                id,
                controller: controller.clone(),
            });
            handle
        };

        let params = probe_params(&handle).await;
        let parameters = SessionParameters {
            temperature: params.clamp_temperature(request.temperature),
            top_k: params.clamp_top_k(request.top_k),
        };
        let config = CapabilityConfig::Prompt(PromptConfig {
            temperature: Some(parameters.temperature),
            top_k: Some(parameters.top_k),
            initial_prompts: vec![PromptTurn::system(DEFAULT_SYSTEM_PROMPT)],
        });
        let monitor = ProgressMonitor::from_callback(on_progress);
        let created = handle
            .backend
            .create(
                CreateOptions::new(config)
                    .with_monitor(monitor.clone())
                    .with_signal(controller.clone()),
            )
            .await;
        monitor.seal();

        let mut slot = self.slot.lock().await;
        let current = matches!(
            slot.as_ref(),
            Some(Slot::Creating { id: pending, .. }) if *pending == id
        );
        if current {
            *slot = None;
        }

        let instance = created.map_err(|e| match e {
            BackendError::Cancelled => CapabilityError::Cancelled,
            other => CapabilityError::CreateFailed {
                kind: KIND,
                message: other.to_string(),
            },
        })?;
        if !current || controller.is_cancelled() {
            instance.destroy();
            tracing::info!("Prompt session cancelled while it was being created");
            return Err(CapabilityError::Cancelled);
        }

        tracing::info!(
            temperature = parameters.temperature,
            top_k = parameters.top_k,
            source = ?handle.source,
            "Created prompt session"
        );
        *slot = Some(Slot::Ready(Session {
            controller,
            instance,
            parameters,
        }));
        Ok(parameters)
    }

    /// Clone the active session's instance.
    pub async fn clone_session(&self) -> Result<ClonedSession> {
        let instance = {
            let slot = self.slot.lock().await;
            let session = slot
                .as_ref()
                .and_then(Slot::session)
                .ok_or(CapabilityError::NoActiveSession)?;
            if session.state() == SessionState::Aborted {
                return Err(CapabilityError::Cancelled);
            }
            session.instance.clone()
        };
        match instance.clone_instance().await {
            Ok(clone) => {
                tracing::debug!("Cloned prompt session");
                Ok(ClonedSession {
                    instance: Some(clone),
                })
            }
            Err(BackendError::Unsupported(_)) => Err(CapabilityError::UnsupportedOperation {
                operation: "clone".to_string(),
            }),
            Err(BackendError::Cancelled) => Err(CapabilityError::Cancelled),
            Err(e) => Err(CapabilityError::ExecutionFailed {
                kind: KIND,
                message: e.to_string(),
            }),
        }
    }

    /// Signal cancellation. Returns whether an active or pending session
    /// was aborted.
    pub async fn abort(&self) -> bool {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(Slot::Creating { controller, .. }) => {
                controller.cancel();
                tracing::info!("Aborted prompt session during creation");
                true
            }
            Some(Slot::Ready(session)) if session.state() == SessionState::Active => {
                session.controller.cancel();
                tracing::info!("Aborted prompt session");
                true
            }
            _ => false,
        }
    }

    /// Release the session from any state. Returns whether one existed.
    pub async fn destroy(&self) -> bool {
        let entry = self.slot.lock().await.take();
        match entry {
            Some(Slot::Ready(session)) => {
                session.instance.destroy();
                tracing::info!("Destroyed prompt session");
                true
            }
            Some(Slot::Creating { controller, .. }) => {
                controller.cancel();
                tracing::info!("Destroyed prompt session during creation");
                true
            }
            None => false,
        }
    }

    /// Run a prompt.
    ///
    /// Uses the session when one exists (failing with `Cancelled` once it
    /// is aborted) and never destroys it. Otherwise, including while a
    /// session is still being created, an ephemeral instance is created
    /// for this call and released afterwards.
    pub fn execute(
        &self,
        input: CapabilityInput,
        request: SessionRequest,
        options: InvokeOptions,
    ) -> ProgressiveResult {
        let slot = self.slot.clone();
        let invoker = self.invoker.clone();
        let events = async_stream::stream! {
            let existing = slot
                .lock()
                .await
                .as_ref()
                .and_then(Slot::session)
                .map(|s| (s.instance.clone(), s.controller.clone()));

            let mut events = match existing {
                Some((_, controller)) if controller.is_cancelled() => {
                    yield ResultEvent::failed(CapabilityError::Cancelled);
                    return;
                }
                Some((instance, controller)) => {
                    tracing::debug!("Running prompt on active session");
                    run_on_instance(KIND, instance, input, options.preference, Some(controller))
                }
                None => {
                    tracing::debug!("No session, running ephemeral prompt");
                    let config = CapabilityConfig::Prompt(PromptConfig {
                        temperature: request.temperature,
                        top_k: request.top_k,
                        ..Default::default()
                    });
                    invoker.invoke(InvokeRequest::new(config, input), options).boxed()
                }
            };
            while let Some(event) = events.next().await {
                yield event;
            }
        };
        ProgressiveResult::new(KIND, events.boxed())
    }
}
