//! Content sniffing for generated text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static MARKDOWN_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^#\s)|(^-{3,}$)|\*\*|\*\w|\[.+\]\(.+\)").expect("markdown hint regex")
});

static HTML_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<([a-zA-Z]+)(\s|>|/)").expect("html hint regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Json,
    Html,
    Markdown,
    PlainText,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Json => "json",
            ContentKind::Html => "html",
            ContentKind::Markdown => "markdown",
            ContentKind::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Begins with an opening tag.
pub fn looks_like_html(text: &str) -> bool {
    HTML_HINT.is_match(text)
}

/// Has a heading, a rule, bold or italic markers, or link syntax.
pub fn looks_like_markdown(text: &str) -> bool {
    MARKDOWN_HINT.is_match(text)
}

/// Parses as strict JSON, scalars included.
pub fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Classify a complete result: JSON, then HTML, then Markdown.
pub fn classify(text: &str) -> ContentKind {
    if is_json(text) {
        ContentKind::Json
    } else if looks_like_html(text) {
        ContentKind::Html
    } else if looks_like_markdown(text) {
        ContentKind::Markdown
    } else {
        ContentKind::PlainText
    }
}

/// Classify a growing stream buffer. Markdown wins over HTML here and JSON
/// is never reported, since a partial document rarely parses.
pub fn classify_partial(buffer: &str) -> ContentKind {
    if looks_like_markdown(buffer) {
        ContentKind::Markdown
    } else if looks_like_html(buffer) {
        ContentKind::Html
    } else {
        ContentKind::PlainText
    }
}
