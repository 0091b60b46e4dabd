//! Minimal markdown to HTML, plus HTML sanitizing.
//!
//! Covers headings 1-6, bold, italics, links and paragraphs. Input is
//! escaped first, so raw HTML inside markdown is shown as text.

use regex::Regex;
use std::sync::LazyLock;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("markdown rule regex"),
        replacement,
    }
}

// Order matters: longer heading prefixes first, bold before italics.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"(?m)^######\s*(.*)$", "<h6>${1}</h6>"),
        rule(r"(?m)^#####\s*(.*)$", "<h5>${1}</h5>"),
        rule(r"(?m)^####\s*(.*)$", "<h4>${1}</h4>"),
        rule(r"(?m)^###\s*(.*)$", "<h3>${1}</h3>"),
        rule(r"(?m)^##\s*(.*)$", "<h2>${1}</h2>"),
        rule(r"(?m)^#\s*(.*)$", "<h1>${1}</h1>"),
        rule(r"\*\*(.*?)\*\*", "<strong>${1}</strong>"),
        rule(r"\*(.*?)\*", "<em>${1}</em>"),
    ]
});

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").expect("link regex"));

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n+").expect("paragraph regex"));

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<script[\s\S]*?>[\s\S]*?</script>").expect("script regex")
});

/// Escape `&`, `<` and `>`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Quotes only. Applied to text that already went through [`escape_html`].
fn escape_quotes(text: &str) -> String {
    text.replace('"', "&quot;").replace('\'', "&#39;")
}

/// Scheme check ignores case and any whitespace or control characters
/// hidden inside the scheme name.
fn is_blocked_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();
    BLOCKED_SCHEMES.iter().any(|s| compact.starts_with(s))
}

fn render_links(escaped: &str) -> String {
    LINK.replace_all(escaped, |caps: &regex::Captures| {
        let text = &caps[1];
        let url = &caps[2];
        if is_blocked_url(url) {
            text.to_string()
        } else {
            format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                escape_quotes(url),
                text
            )
        }
    })
    .into_owned()
}

pub fn render_markdown(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }
    let mut out = escape_html(markdown);
    for rule in RULES.iter() {
        out = rule
            .pattern
            .replace_all(&out, rule.replacement)
            .into_owned();
    }
    out = render_links(&out);
    PARAGRAPH_BREAK
        .split(&out)
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br/>")))
        .collect()
}

/// Remove `<script>` blocks, contents included.
pub fn sanitize_html(html: &str) -> String {
    SCRIPT_BLOCK.replace_all(html, "").into_owned()
}
