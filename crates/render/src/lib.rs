//! Formatting of generated text for display.
//!
//! Pure functions: classify a result, then turn it into something a front
//! end can show (pretty JSON, sanitized HTML, HTML from markdown, or the
//! text verbatim).

mod classify;
mod markdown;

pub use classify::{
    classify, classify_partial, is_json, looks_like_html, looks_like_markdown, ContentKind,
};
pub use markdown::{escape_html, render_markdown, sanitize_html};

/// A result prepared for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub kind: ContentKind,
    /// Text for a plain output area. JSON is pretty-printed.
    pub text: String,
    /// HTML for a rich output area, when rendering applies.
    pub html: Option<String>,
}

/// Re-indent JSON with two spaces. Returns the input unchanged when it
/// does not parse.
pub fn pretty_json(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_string())
}

fn html_for(kind: ContentKind, text: &str) -> Option<String> {
    match kind {
        ContentKind::Html => Some(sanitize_html(text)),
        ContentKind::Markdown => Some(render_markdown(text)),
        ContentKind::Json | ContentKind::PlainText => None,
    }
}

/// Prepare a complete result. `rich` enables HTML output.
pub fn render_final(text: &str, rich: bool) -> Rendered {
    let kind = classify(text);
    let display = match kind {
        ContentKind::Json => pretty_json(text),
        _ => text.to_string(),
    };
    Rendered {
        kind,
        html: if rich { html_for(kind, text) } else { None },
        text: display,
    }
}

/// Prepare the accumulated buffer of an in-flight stream.
pub fn render_partial(buffer: &str, rich: bool) -> Rendered {
    let kind = classify_partial(buffer);
    Rendered {
        kind,
        html: if rich { html_for(kind, buffer) } else { None },
        text: buffer.to_string(),
    }
}

/// Render text the caller already knows is markdown, such as summaries
/// requested in markdown format.
pub fn render_as_markdown(text: &str) -> Rendered {
    Rendered {
        kind: ContentKind::Markdown,
        text: text.to_string(),
        html: Some(render_markdown(text)),
    }
}
