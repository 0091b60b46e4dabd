//! The popup controller: one operation per UI action.
//!
//! Every capability action reads the current form state, drives the invoker
//! or the session manager, and publishes progress and results on the event
//! bus. Actions on blank input do nothing and return `None`.

use crate::config::PopupConfig;
use crate::constants::{
    AUTO_DETECT_MIN_CHARS, LAST_PROMPT_KEY, MOCK_MODE_KEY, SUMMARY_FALLBACK_CHARS,
    SUMMARY_FALLBACK_PREFIX,
};
use crate::error::{PopupError, Result};
use crate::renderer::{emit, ProgressiveRenderer};
use crate::state::PopupState;
use serde_json::json;
use smartnotes_capability::{
    CapabilityConfig, CapabilityInput, CapabilityKind, ContentFormat, Correction,
    LanguageDetection, Payload, ProgressCallback, ProofreadResult, TranslatorConfig,
    AUTO_LANGUAGE,
};
use smartnotes_events::{
    event_names, DownloadProgressEvent, EventBusRef, IncomingSelection, LanguageDetectedEvent,
    NotesChangedEvent, SessionChangedEvent,
};
use smartnotes_mocks::MockTiming;
use smartnotes_notes::{Note, NoteRepository};
use smartnotes_orchestrator::{
    ExecutionPreference, HostBindings, InvokeOptions, InvokeRequest, OrchestrationContext,
    Outcome, ProgressiveResult, SessionParameters, SessionRequest, SessionState,
    LANGUAGE_DETECTOR_READY_KEY,
};
use smartnotes_storage::{Database, FallbackStore, KeyValueStore, StorageError};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Note persistence as seen by the controller.
pub type NoteStore = Arc<dyn NoteRepository<Error = StorageError>>;

/// A proofreading run with the excerpt each correction points at.
#[derive(Debug, Clone)]
pub struct ProofreadReport {
    pub outcome: Outcome,
    pub corrected: String,
    pub corrections: Vec<(Correction, String)>,
}

/// A detection run with its ranked languages.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub outcome: Outcome,
    pub detections: Vec<LanguageDetection>,
}

impl DetectionReport {
    pub fn top(&self) -> Option<&LanguageDetection> {
        self.detections.first()
    }
}

fn fallback_summary(text: &str) -> String {
    let kept: String = text.chars().take(SUMMARY_FALLBACK_CHARS).collect();
    let ellipsis = if text.chars().count() > SUMMARY_FALLBACK_CHARS {
        "..."
    } else {
        ""
    };
    format!("{SUMMARY_FALLBACK_PREFIX}{kept}{ellipsis}")
}

fn preference(streaming: bool) -> ExecutionPreference {
    if streaming {
        ExecutionPreference::Streaming
    } else {
        ExecutionPreference::Batch
    }
}

pub struct PopupController {
    context: OrchestrationContext,
    notes: NoteStore,
    bus: EventBusRef,
    render_rich: bool,
    mock_timing: MockTiming,
    state: RwLock<PopupState>,
}

impl PopupController {
    pub fn new(
        context: OrchestrationContext,
        notes: NoteStore,
        bus: EventBusRef,
        render_rich: bool,
    ) -> Self {
        Self {
            context,
            notes,
            bus,
            render_rich,
            mock_timing: MockTiming::default(),
            state: RwLock::new(PopupState::default()),
        }
    }

    /// Open the database under the configured data directory and wire a
    /// controller around it. Settings fall back to session memory when the
    /// database rejects a write.
    pub fn open(config: &PopupConfig, bus: EventBusRef) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.database_path();
        tracing::info!(path = %path.display(), "Opening database");
        let database = Arc::new(Database::open(&path)?);
        let store: Arc<dyn KeyValueStore> = Arc::new(FallbackStore::new(database.clone()));
        let context = OrchestrationContext::new(Arc::new(HostBindings::new()), store);
        Ok(Self::new(context, database, bus, config.render_rich))
    }

    pub fn with_mock_timing(mut self, timing: MockTiming) -> Self {
        self.mock_timing = timing;
        self
    }

    pub fn context(&self) -> &OrchestrationContext {
        &self.context
    }

    fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.context.store()
    }

    /// Load caches and persisted settings. Mocks are installed when mock
    /// mode was left on.
    pub async fn initialize(&self) -> Result<()> {
        self.context.initialize().await;

        let mock_mode = self
            .store()
            .get_value(MOCK_MODE_KEY)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let last_prompt = self
            .store()
            .get_value(LAST_PROMPT_KEY)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        if mock_mode {
            self.install_mocks();
        }
        let mut state = self.state.write().await;
        state.mock_mode = mock_mode;
        state.last_prompt = last_prompt;
        tracing::info!(mock_mode, "Popup initialized");
        Ok(())
    }

    /// Snapshot of the form state.
    pub async fn state(&self) -> PopupState {
        self.state.read().await.clone()
    }

    /// Change form state, as the UI controls do.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut PopupState),
    {
        f(&mut *self.state.write().await);
    }

    fn progress_callback(&self, capability: CapabilityKind) -> ProgressCallback {
        let bus = self.bus.clone();
        Arc::new(move |event| {
            emit(
                &bus,
                event_names::DOWNLOAD_PROGRESS,
                &DownloadProgressEvent {
                    capability,
                    loaded: event.loaded,
                    percent: event.percent(),
                },
            );
        })
    }

    fn options(&self, capability: CapabilityKind, streaming: bool) -> InvokeOptions {
        InvokeOptions::default()
            .with_progress(self.progress_callback(capability))
            .with_preference(preference(streaming))
    }

    fn renderer(&self, capability: CapabilityKind, streaming: bool) -> ProgressiveRenderer {
        ProgressiveRenderer::new(self.bus.clone(), capability, self.render_rich)
            .with_streaming(streaming)
    }

    async fn source_text(&self) -> Option<String> {
        let text = self.state.read().await.source_text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    async fn remember_output(&self, outcome: &Outcome) {
        if let Some(text) = outcome.text() {
            self.state.write().await.last_output = Some(text);
        }
    }

    async fn run(&self, renderer: ProgressiveRenderer, result: ProgressiveResult) -> Outcome {
        let outcome = renderer.render(result).await;
        self.remember_output(&outcome).await;
        outcome
    }

    async fn invoke(&self, config: CapabilityConfig, text: String, streaming: bool) -> Outcome {
        let kind = config.kind();
        let result = self.context.invoker().invoke(
            InvokeRequest::new(config, CapabilityInput::new(text)),
            self.options(kind, streaming),
        );
        self.run(self.renderer(kind, streaming), result).await
    }

    /// Take a selection from the content script. When the source language
    /// is automatic, a long enough selection is run through detection.
    pub async fn process_incoming(
        &self,
        selection: IncomingSelection,
    ) -> Option<DetectionReport> {
        let selection = selection.into_selection();
        emit(&self.bus, event_names::SELECTION_RECEIVED, &selection);

        let auto_detect = {
            let mut state = self.state.write().await;
            state.source_text = selection.data.clone();
            state.source_language == AUTO_LANGUAGE
                && selection.data.trim().chars().count() >= AUTO_DETECT_MIN_CHARS
        };
        tracing::debug!(kind = ?selection.kind, auto_detect, "Selection received");

        if auto_detect {
            self.detect_language().await
        } else {
            None
        }
    }

    /// Summarize the source text. Falls back to a truncated echo when no
    /// summarizer can run here.
    pub async fn summarize(&self) -> Option<Outcome> {
        let text = self.source_text().await?;
        let options = self.state.read().await.summarizer.clone();
        let markdown = options.format == ContentFormat::Markdown;
        let config = CapabilityConfig::Summarizer(options);
        let kind = CapabilityKind::Summarizer;
        let renderer = self.renderer(kind, false).with_markdown(markdown);

        let tier = match self.context.registry().resolve(kind) {
            None => None,
            Some(handle) => {
                let checked = self
                    .context
                    .invoker()
                    .check_availability(&handle, &config)
                    .await;
                match checked {
                    Ok(tier) => Some(tier),
                    Err(e) => {
                        let failed = ProgressiveResult::failed(kind, e);
                        return Some(self.run(renderer, failed).await);
                    }
                }
            }
        };
        let blocked = tier.is_none_or(|t| t.is_unavailable());

        if blocked {
            tracing::info!("Summarizer not usable, using local fallback");
            let summary = fallback_summary(&text);
            let payload = Payload::Text(summary.clone());
            renderer.complete(&payload, true);
            let outcome = Outcome {
                chunks: vec![summary.clone()],
                accumulated: summary,
                result: Ok(payload),
            };
            self.remember_output(&outcome).await;
            return Some(outcome);
        }

        let result = self.context.invoker().invoke(
            InvokeRequest::new(config, CapabilityInput::new(text)),
            self.options(kind, false),
        );
        Some(self.run(renderer, result).await)
    }

    pub async fn rewrite(&self, streaming: bool) -> Option<Outcome> {
        let text = self.source_text().await?;
        let options = self.state.read().await.compose.clone();
        Some(
            self.invoke(CapabilityConfig::Rewriter(options), text, streaming)
                .await,
        )
    }

    pub async fn write(&self, streaming: bool) -> Option<Outcome> {
        let text = self.source_text().await?;
        let options = self.state.read().await.compose.clone();
        Some(
            self.invoke(CapabilityConfig::Writer(options), text, streaming)
                .await,
        )
    }

    pub async fn translate(&self) -> Option<Outcome> {
        let text = self.source_text().await?;
        let pair = {
            let state = self.state.read().await;
            TranslatorConfig::new(&state.source_language, &state.target_language)
        };
        Some(
            self.invoke(CapabilityConfig::Translator(pair), text, false)
                .await,
        )
    }

    pub async fn proofread(&self) -> Option<ProofreadReport> {
        let text = self.source_text().await?;
        let options = self.state.read().await.proofreader.clone();
        let kind = CapabilityKind::Proofreader;
        let result = self.context.invoker().invoke(
            InvokeRequest::new(
                CapabilityConfig::Proofreader(options),
                CapabilityInput::new(text.clone()),
            ),
            self.options(kind, false),
        );
        let outcome = self.renderer(kind, false).render(result).await;

        let parsed = outcome
            .result
            .as_ref()
            .ok()
            .and_then(ProofreadResult::from_payload)
            .unwrap_or_else(|| ProofreadResult {
                corrected: String::new(),
                corrections: Vec::new(),
            });
        if outcome.is_ok() {
            self.state.write().await.last_output = Some(parsed.corrected.clone());
        }
        let corrections = parsed
            .corrections
            .into_iter()
            .map(|c| {
                let excerpt = c.excerpt(&text).to_string();
                (c, excerpt)
            })
            .collect();
        Some(ProofreadReport {
            outcome,
            corrected: parsed.corrected,
            corrections,
        })
    }

    /// Detect the language of the source text. A determined top result
    /// becomes the source language unless the user already picked one.
    pub async fn detect_language(&self) -> Option<DetectionReport> {
        let text = self.source_text().await?;
        let kind = CapabilityKind::Detector;
        let result = self.context.invoker().invoke(
            InvokeRequest::new(CapabilityConfig::Detector, CapabilityInput::new(text)),
            self.options(kind, false),
        );
        let outcome = self.renderer(kind, false).render(result).await;
        let detections = outcome
            .result
            .as_ref()
            .map(LanguageDetection::list_from_payload)
            .unwrap_or_default();

        if outcome.is_ok() {
            if let Err(e) = self
                .store()
                .set_value(LANGUAGE_DETECTOR_READY_KEY, &json!(true))
            {
                tracing::warn!("Failed to record detector readiness: {}", e);
            }
        }
        if let Some(top) = detections.first().filter(|d| !d.is_undetermined()) {
            let mut state = self.state.write().await;
            if state.source_language == AUTO_LANGUAGE {
                state.source_language = top.detected_language.clone();
            }
            drop(state);
            tracing::info!(
                language = %top.detected_language,
                confidence = top.confidence,
                "Detected source language"
            );
            emit(
                &self.bus,
                event_names::LANGUAGE_DETECTED,
                &LanguageDetectedEvent {
                    language: top.detected_language.clone(),
                    confidence: top.confidence,
                },
            );
        }
        Some(DetectionReport {
            outcome,
            detections,
        })
    }

    /// Run a prompt through the session, or an ephemeral one. Without
    /// explicit prompt text the source text is used. Completed prompts are
    /// remembered as the last prompt.
    pub async fn run_prompt(
        &self,
        prompt: Option<&str>,
        streaming: bool,
    ) -> Result<Option<Outcome>> {
        let text = match prompt.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => match self.source_text().await {
                Some(t) => t,
                None => return Ok(None),
            },
        };
        let kind = CapabilityKind::PromptModel;
        let request = self.state.read().await.prompt;
        let result = self.context.sessions().execute(
            CapabilityInput::new(text.clone()),
            request,
            self.options(kind, streaming),
        );
        let outcome = self.run(self.renderer(kind, streaming), result).await;

        if outcome.is_ok() {
            self.store().set_value(LAST_PROMPT_KEY, &json!(text))?;
            self.state.write().await.last_prompt = text;
        }
        Ok(Some(outcome))
    }

    async fn publish_session(&self) {
        let sessions = self.context.sessions();
        let state = sessions.state().await;
        let parameters = sessions.parameters().await;
        emit(
            &self.bus,
            event_names::SESSION_CHANGED,
            &SessionChangedEvent {
                state: state.as_str().to_string(),
                temperature: parameters.map(|p| p.temperature),
                top_k: parameters.map(|p| p.top_k),
            },
        );
    }

    pub async fn create_session(&self) -> Result<SessionParameters> {
        let request = self.state.read().await.prompt;
        let parameters = self
            .context
            .sessions()
            .create(
                request,
                Some(self.progress_callback(CapabilityKind::PromptModel)),
            )
            .await?;
        self.publish_session().await;
        Ok(parameters)
    }

    /// Clone the session for inspection and release the clone right away.
    pub async fn clone_session(&self) -> Result<()> {
        let clone = self.context.sessions().clone_session().await?;
        clone.release();
        Ok(())
    }

    pub async fn abort_session(&self) -> bool {
        let aborted = self.context.sessions().abort().await;
        if aborted {
            self.publish_session().await;
        }
        aborted
    }

    pub async fn destroy_session(&self) -> bool {
        let destroyed = self.context.sessions().destroy().await;
        if destroyed {
            self.publish_session().await;
        }
        destroyed
    }

    pub async fn session_state(&self) -> SessionState {
        self.context.sessions().state().await
    }

    /// Save the source text and the last output as a note.
    pub async fn save_note(&self) -> Result<Note> {
        let (source, output) = {
            let state = self.state.read().await;
            (state.source_text.clone(), state.last_output.clone())
        };
        let content = output
            .filter(|o| !o.trim().is_empty())
            .ok_or(PopupError::NothingToSave)?;
        let note = Note::new(source, content);
        self.notes.save(&note)?;
        tracing::info!(id = %note.id, "Saved note");
        emit(
            &self.bus,
            event_names::NOTES_CHANGED,
            &NotesChangedEvent {
                saved: Some(note.id),
                deleted: None,
            },
        );
        Ok(note)
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.notes.list_all()?)
    }

    pub fn delete_note(&self, id: &Uuid) -> Result<()> {
        self.notes.delete(id)?;
        tracing::info!(id = %id, "Deleted note");
        emit(
            &self.bus,
            event_names::NOTES_CHANGED,
            &NotesChangedEvent {
                saved: None,
                deleted: Some(*id),
            },
        );
        Ok(())
    }

    /// Install mocks for this process without persisting the choice.
    pub fn install_mocks(&self) {
        smartnotes_mocks::install(self.context.bindings(), self.mock_timing);
    }

    /// Persist the mock mode flag and swap the mock bindings. Takes effect
    /// on the next operation.
    pub async fn set_mock_mode(&self, enabled: bool) -> Result<()> {
        self.store().set_value(MOCK_MODE_KEY, &json!(enabled))?;
        if enabled {
            self.install_mocks();
        } else {
            smartnotes_mocks::uninstall(self.context.bindings());
        }
        self.state.write().await.mock_mode = enabled;
        emit(
            &self.bus,
            event_names::MOCK_MODE_CHANGED,
            &json!({ "enabled": enabled }),
        );
        Ok(())
    }

    pub async fn clear_caches(&self) {
        self.context.cache().clear().await;
        emit(&self.bus, event_names::CACHES_CLEARED, &json!({}));
    }
}
