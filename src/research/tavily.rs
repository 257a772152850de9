//! Tavily REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    CrawlPage, CrawlRequest, CrawlResponse, ExtractRequest, ExtractResponse, ResearchApi,
    SearchRequest, SearchResponse,
};
use crate::agent::config::AgentConfig;
use crate::error::ResearchApiError;

/// Bytes of an error body kept in [`ResearchApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// [`ResearchApi`] backed by the Tavily HTTP API.
///
/// A client without an API key is valid to construct; each call then fails
/// with [`ResearchApiError::MissingApiKey`] before any request is sent.
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl TavilyClient {
    /// Creates a client from agent configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig) -> Result<Self, ResearchApiError> {
        Self::with_settings(
            config.tavily_api_key.clone(),
            &config.tavily_base_url,
            config.timeout,
        )
    }

    /// Creates a client from explicit settings. Blank keys count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchApiError::Http`] if the HTTP client cannot be built.
    pub fn with_settings(
        api_key: Option<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ResearchApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deep-research/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns `true` if an API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ResearchApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ResearchApiError::MissingApiKey)?;
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, "research request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ResearchApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| ResearchApiError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResearchApi for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ResearchApiError> {
        self.post("search", request).await
    }

    async fn extract(
        &self,
        request: &ExtractRequest,
    ) -> Result<ExtractResponse, ResearchApiError> {
        self.post("extract", request).await
    }

    async fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawlPage>, ResearchApiError> {
        let response: CrawlResponse = self.post("crawl", request).await?;
        Ok(response.into_pages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::{CRAWL_LIMIT, CRAWL_MAX_DEPTH};

    fn config(tavily_key: Option<&str>) -> AgentConfig {
        let mut builder = AgentConfig::builder()
            .api_key("test-key")
            .tavily_base_url("http://127.0.0.1:9/");
        if let Some(key) = tavily_key {
            builder = builder.tavily_api_key(key);
        }
        builder.build().unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = TavilyClient::new(&config(None)).unwrap_or_else(|_| unreachable!());
        assert!(!client.has_api_key());
        let result = client
            .crawl(&CrawlRequest {
                url: "https://example.com".to_string(),
                max_depth: CRAWL_MAX_DEPTH,
                limit: CRAWL_LIMIT,
                instructions: None,
            })
            .await;
        assert!(matches!(result, Err(ResearchApiError::MissingApiKey)));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let client = TavilyClient::new(&config(Some("  "))).unwrap_or_else(|_| unreachable!());
        assert!(!client.has_api_key());
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            TavilyClient::new(&config(Some("tvly-secret"))).unwrap_or_else(|_| unreachable!());
        let debug = format!("{client:?}");
        assert!(!debug.contains("tvly-secret"));
        assert!(debug.contains("http://127.0.0.1:9"));
        assert!(!debug.contains("9/\""));
    }
}
