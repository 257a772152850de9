//! Model provider factory.

use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Provider names accepted in [`AgentConfig::provider`]. Matching ignores
/// case and surrounding whitespace.
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai"];

/// Builds the model backend named by the configuration.
///
/// Every supported name currently maps to the `async-openai` client; the
/// configured base URL selects the actual endpoint.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Box<dyn LlmProvider>, AgentError> {
    let name = config.provider.trim().to_ascii_lowercase();
    if !SUPPORTED_PROVIDERS.contains(&name.as_str()) {
        return Err(AgentError::UnsupportedProvider {
            name: config.provider.clone(),
        });
    }
    debug!(
        provider = %name,
        model = %config.model,
        base_url = config.base_url.as_deref().unwrap_or("default"),
        "creating model provider"
    );
    Ok(Box::new(OpenAiProvider::new(config)?))
}
