//! URL cell parsing and body scanning.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'()\[\]{}]+"#).expect("valid URL regex")
});

const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?'];

fn looks_like_url(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}

fn push_unique(out: &mut Vec<String>, url: &str) {
    let url = url.trim().trim_end_matches(TRAILING_PUNCT);
    if url.is_empty() || !looks_like_url(url) {
        return;
    }
    if !out.iter().any(|u| u == url) {
        out.push(url.to_owned());
    }
}

/// Parse a `urls` cell: a JSON array of strings or a separated list.
///
/// Tokens that do not look like URLs are dropped, so numeric "has URL" flags
/// produce an empty list.
#[must_use]
pub fn parse_url_cell(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    let mut out = Vec::new();
    if cell.is_empty() {
        return out;
    }

    if cell.starts_with('[')
        && let Ok(items) = serde_json::from_str::<Vec<String>>(cell)
    {
        for item in &items {
            push_unique(&mut out, item);
        }
        return out;
    }

    for token in cell.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        push_unique(&mut out, token.trim_matches(|c| c == '"' || c == '\''));
    }
    out
}

/// Find URLs in free text, in order of first appearance.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for m in URL_RE.find_iter(text) {
        push_unique(&mut out, m.as_str());
    }
    out
}

/// URLs from the cell, or from the body when the cell yields none.
#[must_use]
pub fn resolve_urls(cell: &str, body: &str) -> Vec<String> {
    let urls = parse_url_cell(cell);
    if urls.is_empty() {
        extract_urls(body)
    } else {
        urls
    }
}
