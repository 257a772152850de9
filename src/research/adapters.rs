//! Tool adapters exposed to the model.
//!
//! Each adapter parses the model's JSON arguments, normalizes them, calls
//! the [`ResearchApi`] and renders the response with [`super::format`].
//! Adapters never fail: every problem is reported as text naming what was
//! attempted, so the model can read it and adjust.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::format::{format_crawl_results, format_extract_results, format_search_results};
use super::normalize::{normalize_url, normalize_urls};
use super::{
    CRAWL_LIMIT, CRAWL_MAX_DEPTH, CrawlRequest, ExtractDepth, ExtractRequest, OneOrMany,
    ResearchApi, SEARCH_MAX_RESULTS, SearchRequest, TimeRange,
};
use crate::agent::tool::{
    ToolDefinition, WEB_CRAWL, WEB_EXTRACT, WEB_SEARCH, def_web_crawl, def_web_extract,
    def_web_search,
};
use crate::error::ResearchApiError;

/// A research capability the model can invoke by name.
#[async_trait]
pub trait ResearchTool: Send + Sync {
    /// Tool name as advertised to the model.
    fn name(&self) -> &'static str;

    /// JSON-schema definition sent with every model turn.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool with JSON-encoded arguments and returns result text.
    async fn invoke(&self, arguments: &str) -> String;
}

/// Builds the three research tools over one API backend.
pub fn research_tools(api: &Arc<dyn ResearchApi>) -> Vec<Arc<dyn ResearchTool>> {
    let search: Arc<dyn ResearchTool> = Arc::new(WebSearch::new(Arc::clone(api)));
    let extract: Arc<dyn ResearchTool> = Arc::new(WebExtract::new(Arc::clone(api)));
    let crawl: Arc<dyn ResearchTool> = Arc::new(WebCrawl::new(Arc::clone(api)));
    vec![search, extract, crawl]
}

fn invalid_arguments(tool: &str, error: &serde_json::Error, raw: &str) -> String {
    format!("Error: invalid arguments for {tool}: {error}\nArguments received: {raw}")
}

fn missing_key_text(error: &ResearchApiError) -> Option<String> {
    matches!(error, ResearchApiError::MissingApiKey).then(|| format!("Error: {error}"))
}

/// Ranked web search.
pub struct WebSearch {
    api: Arc<dyn ResearchApi>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    time_range: Option<TimeRange>,
    #[serde(default)]
    include_domains: Option<OneOrMany<String>>,
}

impl WebSearch {
    /// Creates the adapter.
    #[must_use]
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResearchTool for WebSearch {
    fn name(&self) -> &'static str {
        WEB_SEARCH
    }

    fn definition(&self) -> ToolDefinition {
        def_web_search()
    }

    async fn invoke(&self, arguments: &str) -> String {
        let args: SearchArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return invalid_arguments(WEB_SEARCH, &e, arguments),
        };

        let request = SearchRequest {
            query: args.query,
            max_results: SEARCH_MAX_RESULTS,
            time_range: args.time_range,
            include_domains: args
                .include_domains
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
        };
        debug!(query = %request.query, "web_search");

        match self.api.search(&request).await {
            Ok(response) => format_search_results(&response),
            Err(e) => missing_key_text(&e).unwrap_or_else(|| {
                warn!(error = %e, "web_search failed");
                format!(
                    "Error during search: {e}\nQuery attempted: {}\nFailed to retrieve search results.",
                    request.query
                )
            }),
        }
    }
}

/// Full-content extraction for one or more URLs.
pub struct WebExtract {
    api: Arc<dyn ResearchApi>,
}

#[derive(Debug, Deserialize)]
struct ExtractArgs {
    urls: OneOrMany<String>,
    #[serde(default)]
    include_images: bool,
    #[serde(default)]
    extract_depth: ExtractDepth,
}

impl WebExtract {
    /// Creates the adapter.
    #[must_use]
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResearchTool for WebExtract {
    fn name(&self) -> &'static str {
        WEB_EXTRACT
    }

    fn definition(&self) -> ToolDefinition {
        def_web_extract()
    }

    async fn invoke(&self, arguments: &str) -> String {
        let args: ExtractArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return invalid_arguments(WEB_EXTRACT, &e, arguments),
        };

        let attempted = args.urls.into_vec();
        let request = ExtractRequest {
            urls: normalize_urls(&attempted),
            include_images: args.include_images,
            extract_depth: args.extract_depth,
        };
        debug!(urls = ?request.urls, "web_extract");

        match self.api.extract(&request).await {
            Ok(response) => format_extract_results(&response),
            Err(e) => missing_key_text(&e).unwrap_or_else(|| {
                warn!(error = %e, "web_extract failed");
                format!(
                    "Error during extraction: {e}\nURLs attempted: {attempted:?}\nFailed to extract content."
                )
            }),
        }
    }
}

/// Bounded site crawl.
pub struct WebCrawl {
    api: Arc<dyn ResearchApi>,
}

#[derive(Debug, Deserialize)]
struct CrawlArgs {
    url: String,
    #[serde(default)]
    instructions: Option<String>,
}

impl WebCrawl {
    /// Creates the adapter.
    #[must_use]
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResearchTool for WebCrawl {
    fn name(&self) -> &'static str {
        WEB_CRAWL
    }

    fn definition(&self) -> ToolDefinition {
        def_web_crawl()
    }

    async fn invoke(&self, arguments: &str) -> String {
        let args: CrawlArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return invalid_arguments(WEB_CRAWL, &e, arguments),
        };

        let request = CrawlRequest {
            url: normalize_url(&args.url),
            max_depth: CRAWL_MAX_DEPTH,
            limit: CRAWL_LIMIT,
            instructions: args.instructions,
        };
        debug!(url = %request.url, "web_crawl");

        match self.api.crawl(&request).await {
            Ok(pages) => format_crawl_results(&pages),
            Err(e) => missing_key_text(&e).unwrap_or_else(|| {
                warn!(error = %e, "web_crawl failed");
                format!(
                    "Error: {e}\nURL attempted: {}\nFailed to crawl the website.",
                    request.url
                )
            }),
        }
    }
}
