use regex::Regex;
use smartnotes_capability::ProgressMonitor;
use std::sync::LazyLock;
use std::time::Duration;

/// Sentence-sized runs: text up to and including its closing punctuation.
pub(crate) static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid sentence regex"));

/// Chunk size of the character-sliced streaming mocks.
pub(crate) const CHUNK_CHARS: usize = 40;

/// Artificial latencies of the mock backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockTiming {
    /// Between two download progress events.
    pub progress_step: Duration,
    /// After the download, before the instance resolves.
    pub create_delay: Duration,
    /// Before a batch call resolves.
    pub call_delay: Duration,
    /// Before each streamed chunk.
    pub chunk_delay: Duration,
}

impl MockTiming {
    /// No sleeping at all. For tests.
    pub const fn instant() -> Self {
        Self {
            progress_step: Duration::ZERO,
            create_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Fake a model download of `steps` equal increments, then the
    /// creation latency.
    pub(crate) async fn simulate_download(&self, monitor: &ProgressMonitor, steps: u32) {
        for i in 1..=steps {
            pause(self.progress_step).await;
            monitor.report(f64::from(i) / f64::from(steps));
        }
        pause(self.create_delay).await;
    }

    pub(crate) async fn before_call(&self) {
        pause(self.call_delay).await;
    }

    pub(crate) async fn before_chunk(&self) {
        pause(self.chunk_delay).await;
    }
}

impl Default for MockTiming {
    fn default() -> Self {
        Self {
            progress_step: Duration::from_millis(40),
            create_delay: Duration::from_millis(120),
            call_delay: Duration::from_millis(100),
            chunk_delay: Duration::from_millis(60),
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// First `max` chars of `text`, with `...` when something was cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Slices of at most `size` chars. Concatenated they give back `text`.
pub(crate) fn char_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Sentence-sized slices. Concatenated they give back `text`.
pub(crate) fn sentence_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for m in SENTENCE.find_iter(text) {
        chunks.push(text[start..m.end()].to_string());
        start = m.end();
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}
