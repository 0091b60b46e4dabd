//! Integration tests for the orchestration layer.
//!
//! Uses scripted backends that count probes, creates and releases.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityError,
    CapabilityInput, CapabilityInstance, CapabilityKind, ChunkStream, CreateOptions,
    ExecutionSurface, InstanceRef, ModelParams, Payload, ProgressEvent, SummarizerConfig,
    TranslatorConfig,
};
use smartnotes_orchestrator::{
    BindingScope, ExecutionPreference, HostBindings, InvokeOptions, InvokeRequest,
    OrchestrationContext, ResultEvent, SessionRequest, SessionState,
};
use smartnotes_storage::{KeyValueStore, SessionStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Counters {
    probes: AtomicUsize,
    creates: AtomicUsize,
    destroys: AtomicUsize,
}

impl Counters {
    fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

struct Script {
    kind: CapabilityKind,
    /// `None` means the backend has no probe.
    tier: Option<Result<AvailabilityTier, String>>,
    params: Option<ModelParams>,
    progress: Vec<f64>,
    create_error: Option<String>,
    surface: ExecutionSurface,
    chunks: Vec<String>,
    /// Streaming fails after this many chunks.
    fail_after: Option<usize>,
    /// Streaming never ends after its chunks.
    hang: bool,
    batch_error: Option<String>,
    clonable: bool,
    /// `create` takes this long, resolving early when its signal fires.
    create_delay: Option<Duration>,
    /// `create` sleeps through its signal.
    ignore_signal: bool,
    counters: Counters,
    configs: Mutex<Vec<CapabilityConfig>>,
}

impl Script {
    fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            tier: Some(Ok(AvailabilityTier::Available)),
            params: None,
            progress: Vec::new(),
            create_error: None,
            surface: ExecutionSurface::BOTH,
            chunks: vec!["Hello ".to_string(), "world".to_string()],
            fail_after: None,
            hang: false,
            batch_error: None,
            clonable: false,
            create_delay: None,
            ignore_signal: false,
            counters: Counters::default(),
            configs: Mutex::new(Vec::new()),
        }
    }

    fn last_config(&self) -> Option<CapabilityConfig> {
        self.configs.lock().unwrap().last().cloned()
    }
}

struct ScriptedBackend(Arc<Script>);

struct ScriptedInstance {
    script: Arc<Script>,
    destroyed: AtomicBool,
}

#[async_trait]
impl CapabilityBackend for ScriptedBackend {
    fn kind(&self) -> CapabilityKind {
        self.0.kind
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        match &self.0.tier {
            None => Err(BackendError::Unsupported("availability")),
            Some(result) => {
                self.0.counters.probes.fetch_add(1, Ordering::SeqCst);
                result.clone().map_err(BackendError::Failed)
            }
        }
    }

    async fn params(&self) -> Result<ModelParams, BackendError> {
        self.0.params.ok_or(BackendError::Unsupported("params"))
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        self.0.counters.creates.fetch_add(1, Ordering::SeqCst);
        self.0.configs.lock().unwrap().push(options.config.clone());
        for loaded in &self.0.progress {
            options.monitor.report(*loaded);
        }
        if let Some(delay) = self.0.create_delay {
            match &options.signal {
                Some(signal) if !self.0.ignore_signal => tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = signal.cancelled() => return Err(BackendError::Cancelled),
                },
                _ => tokio::time::sleep(delay).await,
            }
        }
        if let Some(message) = &self.0.create_error {
            return Err(BackendError::failed(message.clone()));
        }
        Ok(Arc::new(ScriptedInstance {
            script: self.0.clone(),
            destroyed: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl CapabilityInstance for ScriptedInstance {
    fn surface(&self) -> ExecutionSurface {
        self.script.surface
    }

    async fn run_batch(&self, _input: &CapabilityInput) -> Result<Payload, BackendError> {
        match &self.script.batch_error {
            Some(message) => Err(BackendError::failed(message.clone())),
            None => Ok(Payload::Text(self.script.chunks.concat())),
        }
    }

    fn run_streaming(&self, _input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        let mut items: Vec<Result<String, BackendError>> =
            self.script.chunks.iter().cloned().map(Ok).collect();
        if let Some(n) = self.script.fail_after {
            items.truncate(n);
            items.push(Err(BackendError::failed("stream broke")));
        }
        let chunks = stream::iter(items);
        if self.script.hang {
            Ok(chunks.chain(stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn clone_instance(&self) -> Result<InstanceRef, BackendError> {
        if !self.script.clonable {
            return Err(BackendError::Unsupported("clone"));
        }
        Ok(Arc::new(ScriptedInstance {
            script: self.script.clone(),
            destroyed: AtomicBool::new(false),
        }))
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.script.counters.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn context_with(scripts: Vec<Arc<Script>>) -> (OrchestrationContext, Arc<SessionStore>) {
    let bindings = Arc::new(HostBindings::new());
    for script in scripts {
        bindings.install(
            BindingScope::Global,
            script.kind.global_name(),
            Arc::new(ScriptedBackend(script.clone())),
        );
    }
    let store = Arc::new(SessionStore::new());
    (OrchestrationContext::new(bindings, store.clone()), store)
}

fn summarize_request() -> InvokeRequest {
    InvokeRequest::new(
        CapabilityConfig::Summarizer(SummarizerConfig::default()),
        CapabilityInput::new("Some text to summarize."),
    )
}

// =============================================================================
// Resolution Tests
// =============================================================================

mod resolution {
    use super::*;

    #[tokio::test]
    async fn test_absent_capability_fails_once_without_create() {
        let (ctx, _) = context_with(vec![]);
        let events: Vec<_> = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ResultEvent::Failed {
                error: CapabilityError::CapabilityAbsent {
                    kind: CapabilityKind::Summarizer
                },
                partial: None,
            }
        ));
    }

    #[tokio::test]
    async fn test_binding_change_takes_effect_on_next_call() {
        let (ctx, _) = context_with(vec![]);
        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(outcome.error().map(|e| e.code()), Some("capability_absent"));

        let script = Arc::new(Script::new(CapabilityKind::Summarizer));
        ctx.bindings().install(
            BindingScope::Window,
            "Summarizer",
            Arc::new(ScriptedBackend(script.clone())),
        );
        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(outcome.text().as_deref(), Some("Hello world"));
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_nothing_runs_until_polled() {
        let script = Arc::new(Script::new(CapabilityKind::Summarizer));
        let (ctx, _) = context_with(vec![script.clone()]);
        let result = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default());
        assert_eq!(script.counters.probes(), 0);
        assert_eq!(script.counters.creates(), 0);
        drop(result);
        assert_eq!(script.counters.creates(), 0);
    }
}

// =============================================================================
// Availability Tests
// =============================================================================

mod availability {
    use super::*;

    #[tokio::test]
    async fn test_probe_once_per_key() {
        let script = Arc::new(Script::new(CapabilityKind::Summarizer));
        let (ctx, _) = context_with(vec![script.clone()]);

        for _ in 0..3 {
            let outcome = ctx
                .invoker()
                .invoke(summarize_request(), InvokeOptions::default())
                .into_outcome()
                .await;
            assert!(outcome.is_ok());
        }
        assert_eq!(script.counters.probes(), 1);
        assert_eq!(script.counters.creates(), 3);
    }

    #[tokio::test]
    async fn test_clear_forces_reprobe() {
        let script = Arc::new(Script::new(CapabilityKind::Summarizer));
        let (ctx, _) = context_with(vec![script.clone()]);

        ctx.invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        ctx.cache().clear().await;
        ctx.invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;

        assert_eq!(script.counters.probes(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_blocks_create() {
        let mut script = Script::new(CapabilityKind::Summarizer);
        script.tier = Some(Ok(AvailabilityTier::Unavailable));
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(
            outcome.error(),
            Some(&CapabilityError::Unavailable {
                kind: CapabilityKind::Summarizer
            })
        );
        assert_eq!(script.counters.creates(), 0);
    }

    #[tokio::test]
    async fn test_downloadable_still_creates() {
        let mut script = Script::new(CapabilityKind::Summarizer);
        script.tier = Some(Ok(AvailabilityTier::Downloadable));
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert!(outcome.is_ok());
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_is_not_cached() {
        let mut script = Script::new(CapabilityKind::Summarizer);
        script.tier = Some(Err("probe exploded".to_string()));
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        for _ in 0..2 {
            let outcome = ctx
                .invoker()
                .invoke(summarize_request(), InvokeOptions::default())
                .into_outcome()
                .await;
            assert_eq!(outcome.error().map(|e| e.code()), Some("probe_failed"));
        }
        assert_eq!(script.counters.probes(), 2);
        assert_eq!(script.counters.creates(), 0);
        assert!(ctx
            .cache()
            .get(CapabilityKind::Summarizer, "default")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_probe_counts_as_available() {
        let mut script = Script::new(CapabilityKind::Rewriter);
        script.tier = None;
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .invoker()
            .invoke(
                InvokeRequest::new(
                    CapabilityConfig::default_for(CapabilityKind::Rewriter),
                    CapabilityInput::new("text"),
                ),
                InvokeOptions::default(),
            )
            .into_outcome()
            .await;
        assert!(outcome.is_ok());
        assert!(ctx.cache().snapshot(CapabilityKind::Rewriter).await.is_empty());
    }

    #[tokio::test]
    async fn test_translator_keyed_by_language_pair() {
        let script = Arc::new(Script::new(CapabilityKind::Translator));
        let (ctx, store) = context_with(vec![script.clone()]);

        for (src, tgt) in [("en", "fr"), ("en", "fr"), ("en", "de")] {
            ctx.invoker()
                .invoke(
                    InvokeRequest::new(
                        CapabilityConfig::Translator(TranslatorConfig::new(src, tgt)),
                        CapabilityInput::new("Hello"),
                    ),
                    InvokeOptions::default(),
                )
                .into_outcome()
                .await;
        }

        assert_eq!(script.counters.probes(), 2);
        let persisted = store.get_value("translatorAvailCache_v1").unwrap().unwrap();
        assert_eq!(persisted["en:fr"], "available");
        assert_eq!(persisted["en:de"], "available");
    }

    #[tokio::test]
    async fn test_persisted_cache_skips_probe_after_restart() {
        let script = Arc::new(Script::new(CapabilityKind::Summarizer));
        let (ctx, store) = context_with(vec![script.clone()]);
        ctx.invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(script.counters.probes(), 1);

        let bindings = Arc::new(HostBindings::new());
        bindings.install(
            BindingScope::Global,
            "Summarizer",
            Arc::new(ScriptedBackend(script.clone())),
        );
        let restarted = OrchestrationContext::new(bindings, store);
        restarted.initialize().await;
        restarted
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(script.counters.probes(), 1);
    }
}

// =============================================================================
// Execution Tests
// =============================================================================

mod execution {
    use super::*;

    #[tokio::test]
    async fn test_streaming_and_batch_agree() {
        let script = Arc::new(Script::new(CapabilityKind::Writer));
        let (ctx, _) = context_with(vec![script]);
        let request = || {
            InvokeRequest::new(
                CapabilityConfig::default_for(CapabilityKind::Writer),
                CapabilityInput::new("Write something"),
            )
        };

        let batch = ctx
            .invoker()
            .invoke(request(), InvokeOptions::default())
            .into_outcome()
            .await;
        let streamed = ctx
            .invoker()
            .invoke(request(), InvokeOptions::streaming())
            .into_outcome()
            .await;

        assert_eq!(batch.chunks.len(), 1);
        assert_eq!(streamed.chunks, vec!["Hello ", "world"]);
        assert_eq!(batch.text(), streamed.text());
        assert_eq!(streamed.accumulated, "Hello world");
    }

    #[tokio::test]
    async fn test_accumulated_is_prefix_chain() {
        let script = Arc::new(Script::new(CapabilityKind::Writer));
        let (ctx, _) = context_with(vec![script]);
        let events: Vec<_> = ctx
            .invoker()
            .invoke(
                InvokeRequest::new(
                    CapabilityConfig::default_for(CapabilityKind::Writer),
                    CapabilityInput::new("x"),
                ),
                InvokeOptions::streaming(),
            )
            .collect()
            .await;

        let mut previous = String::new();
        for event in &events[..events.len() - 1] {
            match event {
                ResultEvent::Chunk { accumulated, .. } => {
                    assert!(accumulated.starts_with(&previous));
                    previous = accumulated.clone();
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_streaming_only_instance_used_for_batch_preference() {
        let mut script = Script::new(CapabilityKind::Rewriter);
        script.surface = ExecutionSurface::STREAMING_ONLY;
        let (ctx, _) = context_with(vec![Arc::new(script)]);

        let outcome = ctx
            .invoker()
            .invoke(
                InvokeRequest::new(
                    CapabilityConfig::default_for(CapabilityKind::Rewriter),
                    CapabilityInput::new("x"),
                ),
                InvokeOptions::default().with_preference(ExecutionPreference::Batch),
            )
            .into_outcome()
            .await;
        assert_eq!(outcome.chunks.len(), 2);
        assert_eq!(outcome.text().as_deref(), Some("Hello world"));
    }

    #[tokio::test]
    async fn test_no_usable_method() {
        let mut script = Script::new(CapabilityKind::Proofreader);
        script.surface = ExecutionSurface {
            batch: false,
            streaming: false,
        };
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .invoker()
            .invoke(
                InvokeRequest::new(
                    CapabilityConfig::default_for(CapabilityKind::Proofreader),
                    CapabilityInput::new("x"),
                ),
                InvokeOptions::default(),
            )
            .into_outcome()
            .await;
        assert_eq!(
            outcome.error(),
            Some(&CapabilityError::NoUsableMethod {
                kind: CapabilityKind::Proofreader
            })
        );
        assert_eq!(script.counters.destroys(), 1);
    }

    #[tokio::test]
    async fn test_partial_output_kept_on_stream_failure() {
        let mut script = Script::new(CapabilityKind::Writer);
        script.chunks = vec!["one ".into(), "two ".into(), "three".into()];
        script.fail_after = Some(2);
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let events: Vec<_> = ctx
            .invoker()
            .invoke(
                InvokeRequest::new(
                    CapabilityConfig::default_for(CapabilityKind::Writer),
                    CapabilityInput::new("x"),
                ),
                InvokeOptions::streaming(),
            )
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        match events.last().unwrap() {
            ResultEvent::Failed { error, partial } => {
                assert_eq!(error.code(), "execution_failed");
                assert_eq!(partial.as_deref(), Some("one two "));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(script.counters.destroys(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let mut script = Script::new(CapabilityKind::Summarizer);
        script.create_error = Some("model download failed".into());
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        match outcome.error() {
            Some(CapabilityError::CreateFailed { message, .. }) => {
                assert!(message.contains("model download failed"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(script.counters.destroys(), 0);
    }

    #[tokio::test]
    async fn test_ephemeral_instance_released_on_every_path() {
        let ok = Arc::new(Script::new(CapabilityKind::Summarizer));
        let (ctx, _) = context_with(vec![ok.clone()]);
        ctx.invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert_eq!(ok.counters.destroys(), 1);

        let mut failing = Script::new(CapabilityKind::Summarizer);
        failing.batch_error = Some("boom".into());
        let failing = Arc::new(failing);
        let (ctx, _) = context_with(vec![failing.clone()]);
        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), InvokeOptions::default())
            .into_outcome()
            .await;
        assert!(!outcome.is_ok());
        assert_eq!(failing.counters.destroys(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_result_releases_instance() {
        let mut script = Script::new(CapabilityKind::Writer);
        script.hang = true;
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let mut result = ctx.invoker().invoke(
            InvokeRequest::new(
                CapabilityConfig::default_for(CapabilityKind::Writer),
                CapabilityInput::new("x"),
            ),
            InvokeOptions::streaming(),
        );
        let first = result.next().await;
        assert!(matches!(first, Some(ResultEvent::Chunk { .. })));
        assert_eq!(script.counters.destroys(), 0);

        drop(result);
        assert_eq!(script.counters.destroys(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_stops_after_create() {
        let mut script = Script::new(CapabilityKind::Summarizer);
        script.progress = vec![0.0, 0.25, 0.2, 0.5, 1.0, 0.9];
        let (ctx, _) = context_with(vec![Arc::new(script)]);

        let seen = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
        let sink = seen.clone();
        let options = InvokeOptions::default()
            .with_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));
        let outcome = ctx
            .invoker()
            .invoke(summarize_request(), options)
            .into_outcome()
            .await;
        assert!(outcome.is_ok());

        let loaded: Vec<f64> = seen.lock().unwrap().iter().map(|e| e.loaded).collect();
        assert_eq!(loaded, vec![0.0, 0.25, 0.5, 1.0]);
        assert!(loaded.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn test_prompt_parameters_clamped() {
        let mut script = Script::new(CapabilityKind::PromptModel);
        script.params = Some(ModelParams {
            default_temperature: 1.0,
            max_temperature: Some(2.0),
            default_top_k: 3,
            max_top_k: Some(8),
        });
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .sessions()
            .execute(
                CapabilityInput::new("hi"),
                SessionRequest {
                    temperature: Some(5.0),
                    top_k: Some(100),
                },
                InvokeOptions::default(),
            )
            .into_outcome()
            .await;
        assert!(outcome.is_ok());

        match script.last_config() {
            Some(CapabilityConfig::Prompt(prompt)) => {
                assert_eq!(prompt.temperature, Some(2.0));
                assert_eq!(prompt.top_k, Some(8));
            }
            other => panic!("unexpected config {other:?}"),
        }
        assert_eq!(script.counters.destroys(), 1);
    }
}

// =============================================================================
// Session Tests
// =============================================================================

mod session {
    use super::*;

    fn prompt_script() -> Script {
        let mut script = Script::new(CapabilityKind::PromptModel);
        script.params = Some(ModelParams {
            default_temperature: 1.0,
            max_temperature: Some(2.0),
            default_top_k: 3,
            max_top_k: Some(128),
        });
        script
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();

        assert_eq!(sessions.state().await, SessionState::Absent);
        let params = sessions
            .create(SessionRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(params.temperature, 1.0);
        assert_eq!(params.top_k, 3);
        assert_eq!(sessions.state().await, SessionState::Active);

        assert!(sessions.abort().await);
        assert_eq!(sessions.state().await, SessionState::Aborted);
        assert!(!sessions.abort().await);

        assert!(sessions.destroy().await);
        assert_eq!(sessions.state().await, SessionState::Absent);
        assert!(!sessions.destroy().await);
        assert_eq!(script.counters.destroys(), 1);
    }

    #[tokio::test]
    async fn test_create_while_active_is_rejected() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();

        sessions.create(SessionRequest::default(), None).await.unwrap();
        let second = sessions.create(SessionRequest::default(), None).await;
        assert_eq!(second, Err(CapabilityError::SessionActive));
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_aborted_session_is_replaced_on_create() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();

        sessions.create(SessionRequest::default(), None).await.unwrap();
        sessions.abort().await;
        sessions.create(SessionRequest::default(), None).await.unwrap();

        assert_eq!(sessions.state().await, SessionState::Active);
        assert_eq!(script.counters.destroys(), 1);
    }

    fn slow_prompt(ignore_signal: bool) -> Arc<Script> {
        let mut script = prompt_script();
        script.create_delay = Some(Duration::from_millis(500));
        script.ignore_signal = ignore_signal;
        Arc::new(script)
    }

    #[tokio::test]
    async fn test_abort_during_slow_create() {
        let script = slow_prompt(false);
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions().clone();

        let creating = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.create(SessionRequest::default(), None).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sessions.state().await, SessionState::Creating);

        let aborted = tokio::time::timeout(Duration::from_millis(100), sessions.abort())
            .await
            .expect("abort must not wait for create");
        assert!(aborted);

        let created = tokio::time::timeout(Duration::from_millis(100), creating)
            .await
            .expect("create resolves once aborted")
            .unwrap();
        assert_eq!(created, Err(CapabilityError::Cancelled));
        assert_eq!(sessions.state().await, SessionState::Absent);
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_create_while_creating_is_rejected() {
        let script = slow_prompt(false);
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions().clone();

        let creating = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.create(SessionRequest::default(), None).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = sessions.create(SessionRequest::default(), None).await;
        assert_eq!(second, Err(CapabilityError::SessionActive));

        assert!(sessions.destroy().await);
        assert_eq!(creating.await.unwrap(), Err(CapabilityError::Cancelled));
        assert_eq!(sessions.state().await, SessionState::Absent);
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_instance_from_aborted_create_is_released() {
        let script = slow_prompt(true);
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions().clone();

        let creating = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.create(SessionRequest::default(), None).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sessions.abort().await);

        assert_eq!(creating.await.unwrap(), Err(CapabilityError::Cancelled));
        assert_eq!(script.counters.destroys(), 1);
        assert_eq!(sessions.state().await, SessionState::Absent);
        assert!(sessions.parameters().await.is_none());
    }

    #[tokio::test]
    async fn test_create_without_backend() {
        let (ctx, _) = context_with(vec![]);
        let result = ctx.sessions().create(SessionRequest::default(), None).await;
        assert_eq!(
            result,
            Err(CapabilityError::CapabilityAbsent {
                kind: CapabilityKind::PromptModel
            })
        );
        assert_eq!(ctx.sessions().state().await, SessionState::Absent);
    }

    #[tokio::test]
    async fn test_execute_reuses_session_without_destroying() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();
        sessions.create(SessionRequest::default(), None).await.unwrap();

        for _ in 0..2 {
            let outcome = sessions
                .execute(
                    CapabilityInput::new("hi"),
                    SessionRequest::default(),
                    InvokeOptions::streaming(),
                )
                .into_outcome()
                .await;
            assert_eq!(outcome.text().as_deref(), Some("Hello world"));
        }
        assert_eq!(script.counters.creates(), 1);
        assert_eq!(script.counters.destroys(), 0);
        assert_eq!(script.counters.probes(), 0);
    }

    #[tokio::test]
    async fn test_execute_after_abort_is_cancelled() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();
        sessions.create(SessionRequest::default(), None).await.unwrap();
        sessions.abort().await;

        let outcome = sessions
            .execute(
                CapabilityInput::new("hi"),
                SessionRequest::default(),
                InvokeOptions::default(),
            )
            .into_outcome()
            .await;
        assert_eq!(outcome.error(), Some(&CapabilityError::Cancelled));
        assert!(outcome.error().unwrap().is_informational());
        assert_eq!(script.counters.creates(), 1);
    }

    #[tokio::test]
    async fn test_abort_mid_stream_keeps_partial() {
        let mut script = prompt_script();
        script.hang = true;
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();
        sessions.create(SessionRequest::default(), None).await.unwrap();

        let mut result = sessions.execute(
            CapabilityInput::new("hi"),
            SessionRequest::default(),
            InvokeOptions::streaming(),
        );
        assert!(matches!(result.next().await, Some(ResultEvent::Chunk { .. })));
        assert!(matches!(result.next().await, Some(ResultEvent::Chunk { .. })));
        sessions.abort().await;

        match result.next().await {
            Some(ResultEvent::Failed { error, partial }) => {
                assert_eq!(error, CapabilityError::Cancelled);
                assert_eq!(partial.as_deref(), Some("Hello world"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(result.next().await.is_none());
        assert_eq!(script.counters.destroys(), 0);
    }

    #[tokio::test]
    async fn test_clone_requires_session() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script]);
        let result = ctx.sessions().clone_session().await;
        assert!(matches!(result, Err(CapabilityError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_clone_unsupported() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script]);
        ctx.sessions()
            .create(SessionRequest::default(), None)
            .await
            .unwrap();

        match ctx.sessions().clone_session().await {
            Err(CapabilityError::UnsupportedOperation { operation }) => {
                assert_eq!(operation, "clone")
            }
            Err(e) => panic!("unexpected error {e:?}"),
            Ok(_) => panic!("clone should be unsupported"),
        }
    }

    #[tokio::test]
    async fn test_clone_is_independent_and_released() {
        let mut script = prompt_script();
        script.clonable = true;
        let script = Arc::new(script);
        let (ctx, _) = context_with(vec![script.clone()]);
        let sessions = ctx.sessions();
        sessions.create(SessionRequest::default(), None).await.unwrap();

        let clone = sessions.clone_session().await.unwrap();
        let outcome = clone
            .execute(CapabilityInput::new("hi"), ExecutionPreference::Batch)
            .into_outcome()
            .await;
        assert_eq!(outcome.text().as_deref(), Some("Hello world"));
        clone.release();

        assert_eq!(script.counters.destroys(), 1);
        assert_eq!(sessions.state().await, SessionState::Active);
    }

    #[tokio::test]
    async fn test_execute_without_session_is_ephemeral() {
        let script = Arc::new(prompt_script());
        let (ctx, _) = context_with(vec![script.clone()]);

        let outcome = ctx
            .sessions()
            .execute(
                CapabilityInput::new("hi"),
                SessionRequest::default(),
                InvokeOptions::default(),
            )
            .into_outcome()
            .await;
        assert!(outcome.is_ok());
        assert_eq!(script.counters.creates(), 1);
        assert_eq!(script.counters.destroys(), 1);
        assert_eq!(ctx.sessions().state().await, SessionState::Absent);
    }
}
