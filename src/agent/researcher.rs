//! Research agent: the tool-calling turn of the loop.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::tool::{ToolDefinition, research_definitions};
use super::traits::Agent;

/// Agent that plans, calls research tools and decides when it has enough.
///
/// Its system prompt lives in the conversation itself (persisted when the
/// thread is created), so the agent only carries model settings and the
/// tool schemas it advertises.
pub struct ResearcherAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    tools: Vec<ToolDefinition>,
}

impl ResearcherAgent {
    /// Creates a researcher advertising the standard research tools.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_tools(config, research_definitions())
    }

    /// Creates a researcher advertising the given tool definitions.
    #[must_use]
    pub fn with_tools(config: &AgentConfig, tools: Vec<ToolDefinition>) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            tools,
        }
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    fn name(&self) -> &'static str {
        "researcher"
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

    fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{system_message, user_message};
    use crate::agent::tool::{WEB_CRAWL, WEB_EXTRACT, WEB_SEARCH};

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .model("gpt-4o-mini")
            .max_tokens(2048)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_agent_properties() {
        let agent = ResearcherAgent::new(&config());
        assert_eq!(agent.name(), "researcher");
        assert_eq!(agent.model(), "gpt-4o-mini");
        assert!(agent.temperature().abs() < f32::EPSILON);
        assert_eq!(agent.max_tokens(), 2048);
    }

    #[test]
    fn test_request_carries_history_and_all_tools() {
        let agent = ResearcherAgent::new(&config());
        let history = vec![system_message("sys"), user_message("q")];
        let request = agent.build_request(&history);
        assert_eq!(request.messages, history);
        assert_eq!(request.max_tokens, Some(2048));
        let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![WEB_SEARCH, WEB_EXTRACT, WEB_CRAWL]);
    }
}
