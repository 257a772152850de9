//! Web research backend and the tool adapters built on it.
//!
//! [`ResearchApi`] is the seam to the search provider (Tavily in
//! production, mocks in tests). The adapters in [`adapters`] turn model
//! tool-call arguments into API requests and API responses into the text
//! the model reads.

pub mod adapters;
pub mod format;
pub mod normalize;
pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchApiError;

pub use adapters::{ResearchTool, WebCrawl, WebExtract, WebSearch, research_tools};
pub use tavily::TavilyClient;

/// Maximum search results requested per query.
pub const SEARCH_MAX_RESULTS: u32 = 10;
/// Link depth followed by a crawl.
pub const CRAWL_MAX_DEPTH: u32 = 2;
/// Maximum pages returned by a crawl.
pub const CRAWL_LIMIT: u32 = 20;

/// Publication window for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// Last 24 hours.
    #[serde(alias = "d")]
    Day,
    /// Last 7 days.
    #[serde(alias = "w")]
    Week,
    /// Last 30 days.
    #[serde(alias = "m")]
    Month,
    /// Last 365 days.
    #[serde(alias = "y")]
    Year,
}

/// How thoroughly pages are extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractDepth {
    /// Standard extraction.
    #[default]
    Basic,
    /// Slower, more detailed extraction.
    Advanced,
}

/// A value the model may send either bare or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Search request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    /// Search query text.
    pub query: String,
    /// Upper bound on returned results.
    pub max_results: u32,
    /// Optional publication window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Domain allow-list; empty means any domain.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
}

/// One ranked search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Relevance snippet.
    #[serde(default)]
    pub content: Option<String>,
    /// Full page text, when available.
    #[serde(default)]
    pub raw_content: Option<String>,
}

/// Search response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchResponse {
    /// Hits ranked by relevance.
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// Extract request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractRequest {
    /// Normalized URLs to extract.
    pub urls: Vec<String>,
    /// Whether to return image URLs.
    pub include_images: bool,
    /// Extraction depth.
    pub extract_depth: ExtractDepth,
}

/// Content extracted from one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractedPage {
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Full page text, when available.
    #[serde(default)]
    pub raw_content: Option<String>,
    /// Image URLs found on the page.
    #[serde(default)]
    pub images: Vec<String>,
}

/// A URL the provider could not extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FailedExtraction {
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Provider error description.
    #[serde(default)]
    pub error: Option<String>,
}

/// Extract response body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractResponse {
    /// Pages extracted successfully.
    #[serde(default)]
    pub results: Vec<ExtractedPage>,
    /// URLs that could not be extracted.
    #[serde(default)]
    pub failed_results: Vec<FailedExtraction>,
    /// Provider-reported latency in seconds.
    #[serde(default)]
    pub response_time: f64,
}

/// Crawl request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlRequest {
    /// Root URL.
    pub url: String,
    /// Link depth to follow.
    pub max_depth: u32,
    /// Maximum pages to return.
    pub limit: u32,
    /// Natural-language guidance for the crawler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// One crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CrawlPage {
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Full page text, when available.
    #[serde(default)]
    pub raw_content: Option<String>,
}

/// The crawl endpoint answers with either a bare list or `{"results": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum CrawlResponse {
    Pages(Vec<CrawlPage>),
    Wrapped {
        #[serde(default)]
        results: Vec<CrawlPage>,
    },
}

impl CrawlResponse {
    pub(crate) fn into_pages(self) -> Vec<CrawlPage> {
        match self {
            Self::Pages(pages) | Self::Wrapped { results: pages } => pages,
        }
    }
}

/// Web search, extraction and crawling.
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// Ranked web search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ResearchApiError>;

    /// Full-content extraction for a set of URLs.
    async fn extract(&self, request: &ExtractRequest)
    -> Result<ExtractResponse, ResearchApiError>;

    /// Bounded crawl from a root URL.
    async fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawlPage>, ResearchApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_accepts_short_forms() {
        for (raw, expected) in [
            ("\"d\"", TimeRange::Day),
            ("\"week\"", TimeRange::Week),
            ("\"m\"", TimeRange::Month),
            ("\"year\"", TimeRange::Year),
        ] {
            let parsed: TimeRange = serde_json::from_str(raw).unwrap_or(TimeRange::Day);
            assert_eq!(parsed, expected, "{raw}");
        }
        assert!(serde_json::from_str::<TimeRange>("\"decade\"").is_err());
    }

    #[test]
    fn test_time_range_serializes_long_form() {
        let json = serde_json::to_string(&TimeRange::Week).unwrap_or_default();
        assert_eq!(json, "\"week\"");
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<String> =
            serde_json::from_str("\"example.com\"").unwrap_or(OneOrMany::Many(Vec::new()));
        assert_eq!(one.into_vec(), vec!["example.com".to_string()]);
        let many: OneOrMany<String> =
            serde_json::from_str(r#"["a","b"]"#).unwrap_or(OneOrMany::Many(Vec::new()));
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn test_crawl_response_shapes() {
        let bare: CrawlResponse =
            serde_json::from_str(r#"[{"url":"https://a","raw_content":"x"}]"#)
                .unwrap_or(CrawlResponse::Pages(Vec::new()));
        assert_eq!(bare.into_pages().len(), 1);

        let wrapped: CrawlResponse = serde_json::from_str(
            r#"{"base_url":"https://a","results":[{"url":"https://a/1"},{"url":"https://a/2"}]}"#,
        )
        .unwrap_or(CrawlResponse::Pages(Vec::new()));
        assert_eq!(wrapped.into_pages().len(), 2);
    }

    #[test]
    fn test_search_request_omits_unset_filters() {
        let request = SearchRequest {
            query: "rust".to_string(),
            max_results: SEARCH_MAX_RESULTS,
            time_range: None,
            include_domains: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(json["max_results"], 10);
        assert!(json.get("time_range").is_none());
        assert!(json.get("include_domains").is_none());
    }
}
