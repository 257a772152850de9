//! URL cleanup for model-supplied tool arguments.
//!
//! Models sometimes pass a JSON object where a bare URL is expected, or drop
//! the scheme. Both are repaired here before a request leaves the process.

use std::sync::LazyLock;

use regex::Regex;

/// Matches the value of a `"url"` key inside a JSON-looking string.
static JSON_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""url"\s*:\s*"([^"]+)""#).ok());

/// Normalizes one URL argument.
///
/// 1. If the trimmed input starts with `{` and contains `"url":`, the value
///    of the `url` key is used instead of the whole string.
/// 2. Anything not starting with `http://` or `https://` gets `https://`
///    prepended.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let url = unwrap_json_url(raw).unwrap_or(raw);
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Normalizes every URL in a list, preserving order.
#[must_use]
pub fn normalize_urls(raw: &[String]) -> Vec<String> {
    raw.iter().map(|url| normalize_url(url)).collect()
}

fn unwrap_json_url(raw: &str) -> Option<&str> {
    if !raw.trim().starts_with('{') || !raw.contains("\"url\":") {
        return None;
    }
    JSON_URL
        .as_ref()?
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
