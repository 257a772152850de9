//! Agent trait definition.
//!
//! The researcher and the formatter implement this trait, which turns a
//! conversation history into one model request.

use async_trait::async_trait;
use tracing::debug;

use super::message::{ChatMessage, ChatRequest, ChatResponse};
use super::provider::LlmProvider;
use super::tool::ToolDefinition;
use crate::error::AgentError;

/// A model role with a fixed configuration.
///
/// Agents do not own conversation state. The research loop hands them the
/// full ordered history on every turn and records what they return.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// Sampling temperature (0.0 = deterministic).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        4096
    }

    /// Tool definitions offered to the model on every turn.
    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Builds the request for one turn over `history`.
    fn build_request(&self, history: &[ChatMessage]) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: history.to_vec(),
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            tools: self.tools(),
        }
    }

    /// Issues one model call over `history`.
    ///
    /// # Errors
    ///
    /// Propagates provider failures unchanged; there is no retry here.
    async fn respond(
        &self,
        provider: &dyn LlmProvider,
        history: &[ChatMessage],
    ) -> Result<ChatResponse, AgentError> {
        let request = self.build_request(history);
        debug!(
            agent = self.name(),
            provider = provider.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "model request"
        );
        provider.chat(&request).await
    }
}
