//! Formatter agent for the final pass.
//!
//! Takes the whole research conversation and produces the cited markdown
//! answer. The formatting instruction is appended as a user message for
//! this request only and is never stored with the thread.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::message::{ChatMessage, ChatRequest, user_message};
use super::traits::Agent;

/// Agent that turns gathered research into the final answer.
pub struct FormatterAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    instruction: String,
}

impl FormatterAgent {
    /// Creates a formatter with the given instruction.
    #[must_use]
    pub fn new(config: &AgentConfig, instruction: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            instruction,
        }
    }

    /// The formatting instruction sent with the request.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

#[async_trait]
impl Agent for FormatterAgent {
    fn name(&self) -> &'static str {
        "formatter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn build_request(&self, history: &[ChatMessage]) -> ChatRequest {
        let mut messages = history.to_vec();
        messages.push(user_message(&self.instruction));
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            tools: Vec::new(),
        }
    }
}
