//! Rewriter and writer mocks. Both share the compose options.

use crate::timing::{char_chunks, truncate_chars, MockTiming, CHUNK_CHARS};
use async_trait::async_trait;
use futures::stream::StreamExt;
use regex::Regex;
use smartnotes_capability::{
    AvailabilityTier, BackendError, CapabilityBackend, CapabilityConfig, CapabilityInput,
    CapabilityInstance, CapabilityKind, ChunkStream, ComposeConfig, CreateOptions,
    ExecutionSurface, InstanceRef, Payload,
};
use std::sync::{Arc, LazyLock};

const DOWNLOAD_STEPS: u32 = 6;
const REWRITE_MAX_CHARS: usize = 200;
const WRITE_MAX_CHARS: usize = 100;

static CANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(can't|cant)\b").expect("valid regex"));
static NOT_GOOD_ENOUGH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bIt's not good enough\b").expect("valid regex"));

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

pub(crate) fn rewrite(config: &ComposeConfig, text: &str) -> String {
    let softened = CANT.replace_all(text.trim(), "couldn't");
    let softened = NOT_GOOD_ENOUGH.replace_all(&softened, "It could be improved");
    format!(
        "Rewritten (tone={}): {}",
        or_default(&config.tone, "as-is"),
        truncate_chars(&softened, REWRITE_MAX_CHARS)
    )
}

pub(crate) fn write(config: &ComposeConfig, prompt: &str) -> String {
    let trimmed = prompt.trim();
    let mut body: String = trimmed.chars().take(WRITE_MAX_CHARS).collect();
    if prompt.chars().count() > WRITE_MAX_CHARS {
        body.push_str("...");
    }
    format!(
        "Written (tone={};len={}): {}",
        or_default(&config.tone, "default"),
        or_default(&config.length, "med"),
        body
    )
}

/// Which of the two compose capabilities an instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Rewrite,
    Write,
}

impl Mode {
    fn kind(self) -> CapabilityKind {
        match self {
            Mode::Rewrite => CapabilityKind::Rewriter,
            Mode::Write => CapabilityKind::Writer,
        }
    }
}

/// Softens wording and tags the output with the requested tone.
pub struct MockRewriter {
    timing: MockTiming,
}

impl MockRewriter {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

/// Echoes the prompt tagged with tone and length.
pub struct MockWriter {
    timing: MockTiming,
}

impl MockWriter {
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }
}

async fn create_compose(
    mode: Mode,
    timing: MockTiming,
    options: CreateOptions,
) -> Result<InstanceRef, BackendError> {
    let config = match (mode, options.config) {
        (Mode::Rewrite, CapabilityConfig::Rewriter(c))
        | (Mode::Write, CapabilityConfig::Writer(c)) => c,
        _ => return Err(crate::mismatched_options(mode.kind())),
    };
    timing
        .simulate_download(&options.monitor, DOWNLOAD_STEPS)
        .await;
    Ok(Arc::new(ComposeInstance {
        mode,
        config,
        timing,
    }))
}

#[async_trait]
impl CapabilityBackend for MockRewriter {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Rewriter
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Ok(AvailabilityTier::Available)
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        create_compose(Mode::Rewrite, self.timing, options).await
    }
}

#[async_trait]
impl CapabilityBackend for MockWriter {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Writer
    }

    async fn availability(
        &self,
        _config: &CapabilityConfig,
    ) -> Result<AvailabilityTier, BackendError> {
        Ok(AvailabilityTier::Available)
    }

    async fn create(&self, options: CreateOptions) -> Result<InstanceRef, BackendError> {
        create_compose(Mode::Write, self.timing, options).await
    }
}

struct ComposeInstance {
    mode: Mode,
    config: ComposeConfig,
    timing: MockTiming,
}

impl ComposeInstance {
    fn output(&self, text: &str) -> String {
        match self.mode {
            Mode::Rewrite => rewrite(&self.config, text),
            Mode::Write => write(&self.config, text),
        }
    }
}

#[async_trait]
impl CapabilityInstance for ComposeInstance {
    fn surface(&self) -> ExecutionSurface {
        ExecutionSurface::BOTH
    }

    async fn run_batch(&self, input: &CapabilityInput) -> Result<Payload, BackendError> {
        self.timing.before_call().await;
        Ok(self.output(&input.text).into())
    }

    fn run_streaming(&self, input: &CapabilityInput) -> Result<ChunkStream, BackendError> {
        let timing = self.timing;
        let chunks = char_chunks(&self.output(&input.text), CHUNK_CHARS);
        Ok(async_stream::stream! {
            for chunk in chunks {
                timing.before_chunk().await;
                yield Ok(chunk);
            }
        }
        .boxed())
    }
}
