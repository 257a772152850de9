//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4o";
/// Default maximum tokens per model response.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default cap on tool-requesting model turns per `submit`.
const DEFAULT_MAX_ITERATIONS: usize = 25;
/// Default research provider endpoint.
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Configuration for the research agent.
#[derive(Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the model provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for both research turns and the formatting pass.
    pub model: String,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Sampling temperature. Research runs are deterministic by default.
    pub temperature: f32,
    /// Maximum number of model turns that may request tools before the loop
    /// is forced into formatting.
    pub max_iterations: usize,
    /// API key for the research provider. Missing keys are reported by the
    /// tools as text, not as a configuration error.
    pub tavily_api_key: Option<String>,
    /// Research provider base URL.
    pub tavily_base_url: String,
    /// HTTP request timeout for model and research calls.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// `SQLite` database for durable conversations. `None` keeps threads in
    /// memory for the lifetime of the process.
    pub db_path: Option<PathBuf>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field(
                "tavily_api_key",
                &self.tavily_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("tavily_base_url", &self.tavily_base_url)
            .field("timeout", &self.timeout)
            .field("prompt_dir", &self.prompt_dir)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    max_iterations: Option<usize>,
    tavily_api_key: Option<String>,
    tavily_base_url: Option<String>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RESEARCH_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("MODEL_ID").ok();
        }
        if self.max_tokens.is_none() {
            self.max_tokens = std::env::var("RESEARCH_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_iterations.is_none() {
            self.max_iterations = std::env::var("RESEARCH_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.tavily_api_key.is_none() {
            self.tavily_api_key = std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.tavily_base_url.is_none() {
            self.tavily_base_url = std::env::var("TAVILY_BASE_URL").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RESEARCH_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        if self.db_path.is_none() {
            self.db_path = std::env::var("RESEARCH_DB_PATH").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the model API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the max tokens per response.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the tool-turn cap.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the research provider API key.
    #[must_use]
    pub fn tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.tavily_api_key = Some(key.into());
        self
    }

    /// Sets the research provider base URL.
    #[must_use]
    pub fn tavily_base_url(mut self, url: impl Into<String>) -> Self {
        self.tavily_base_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the conversation database path.
    #[must_use]
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no model API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(0.0),
            max_iterations: self
                .max_iterations
                .unwrap_or(DEFAULT_MAX_ITERATIONS)
                .max(1),
            tavily_api_key: self.tavily_api_key,
            tavily_base_url: self
                .tavily_base_url
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string()),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
            db_path: self.db_path,
        })
    }
}
