//! Plain-text rendering of research API responses.
//!
//! The model reads these strings verbatim, so layouts are fixed and every
//! empty response produces an explicit message instead of an empty string.

use std::fmt::Write;

use super::{CrawlPage, ExtractResponse, SearchResponse};

/// Characters of extracted page content shown per URL.
pub const EXTRACT_CONTENT_LIMIT: usize = 5000;
/// Characters of crawled page content shown per page.
pub const CRAWL_CONTENT_LIMIT: usize = 4000;
/// Image URLs listed per extracted page.
const IMAGES_SHOWN: usize = 3;

/// Formats ranked search results.
#[must_use]
pub fn format_search_results(response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return "No search results found.".to_string();
    }

    let blocks: Vec<String> = response
        .results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut block = format!(
                "\nRESULT {}:\nTitle: {}\nURL: {}\n",
                i + 1,
                hit.title.as_deref().unwrap_or("No title"),
                hit.url.as_deref().unwrap_or("No URL"),
            );
            match hit.raw_content.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => {
                    let _ = writeln!(block, "Raw Content: {raw}");
                }
                _ => {
                    let content = hit.content.as_deref().unwrap_or_default().trim();
                    let _ = writeln!(block, "Content: {content}");
                }
            }
            block
        })
        .collect();

    format!("\n{}", blocks.join("\n"))
}

/// Formats extracted pages, failed URLs and the provider response time.
#[must_use]
pub fn format_extract_results(response: &ExtractResponse) -> String {
    if response.results.is_empty() && response.failed_results.is_empty() {
        return "No extract results found.".to_string();
    }

    let mut out = String::from("\n");
    for (i, page) in response.results.iter().enumerate() {
        let _ = write!(
            out,
            "\nEXTRACT RESULT {}:\nURL: {}\n",
            i + 1,
            page.url.as_deref().unwrap_or("No URL")
        );

        match page.raw_content.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => write_content(&mut out, raw, EXTRACT_CONTENT_LIMIT),
            None => out.push_str("Content: No content extracted\n"),
        }

        if !page.images.is_empty() {
            let _ = writeln!(out, "Images found: {} images", page.images.len());
            for (j, image) in page.images.iter().take(IMAGES_SHOWN).enumerate() {
                let _ = writeln!(out, "  Image {}: {image}", j + 1);
            }
            if page.images.len() > IMAGES_SHOWN {
                let _ = writeln!(
                    out,
                    "  ... and {} more images",
                    page.images.len() - IMAGES_SHOWN
                );
            }
        }
    }

    if !response.failed_results.is_empty() {
        out.push_str("\nFAILED EXTRACTIONS:\n");
        for (i, failure) in response.failed_results.iter().enumerate() {
            let _ = writeln!(
                out,
                "Failed {}: {} - {}",
                i + 1,
                failure.url.as_deref().unwrap_or("Unknown URL"),
                failure.error.as_deref().unwrap_or("Unknown error"),
            );
        }
    }

    let _ = write!(
        out,
        "\nResponse time: {} seconds",
        format_seconds(response.response_time)
    );
    out
}

/// Formats crawled pages behind a dashed rule.
#[must_use]
pub fn format_crawl_results(pages: &[CrawlPage]) -> String {
    if pages.is_empty() {
        return "No crawl results found.".to_string();
    }

    let blocks: Vec<String> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let mut block = format!(
                "\nRESULT {}:\nURL: {}\n",
                i + 1,
                page.url.as_deref().unwrap_or("No URL")
            );
            if let Some(raw) = page.raw_content.as_deref().filter(|raw| !raw.is_empty()) {
                let title = raw.split('\n').next().unwrap_or_default();
                let _ = writeln!(block, "Title: {title}");
                write_content(&mut block, raw, CRAWL_CONTENT_LIMIT);
            }
            block
        })
        .collect();

    format!("\n{}{}", "-".repeat(40), blocks.join("\n"))
}

fn write_content(out: &mut String, raw: &str, limit: usize) {
    match truncate_chars(raw, limit) {
        Some(head) => {
            let _ = writeln!(out, "Content: {head}...");
        }
        None => {
            let _ = writeln!(out, "Content: {raw}");
        }
    }
}

/// Returns the first `limit` characters when `text` is longer than that.
fn truncate_chars(text: &str, limit: usize) -> Option<&str> {
    text.char_indices().nth(limit).map(|(idx, _)| &text[..idx])
}

/// Whole seconds keep one decimal place (`2.0`), matching the provider's
/// float rendering.
fn format_seconds(seconds: f64) -> String {
    if seconds.is_finite() && seconds.fract().abs() < f64::EPSILON {
        format!("{seconds:.1}")
    } else {
        seconds.to_string()
    }
}
