//! Multi-turn research agent.
//!
//! A pluggable [`LlmProvider`] drives a tool-calling research loop over a
//! persisted conversation, followed by a formatting pass that produces a
//! cited markdown answer.
//!
//! # Architecture
//!
//! ```text
//! submit(query, thread) → Orchestrator
//!   ├── ThreadLocks (one writer per thread)
//!   ├── ConversationStore::get_or_create → prime history
//!   ├── ResearchLoop
//!   │   ├── ResearcherAgent ⇄ ToolExecutor (web_search / web_extract / web_crawl)
//!   │   └── FormatterAgent → final answer
//!   └── ConversationStore::append (one batch per committed turn)
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod executor;
pub mod formatter;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod researcher;
pub mod state;
pub mod tool;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use agentic_loop::{LoopPhase, ResearchEvent, ResearchLoop, ResearchOutcome};
pub use config::AgentConfig;
pub use executor::ToolExecutor;
pub use formatter::FormatterAgent;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{DEFAULT_THREAD_ID, Orchestrator};
pub use prompt::{COMPLETION_SENTINEL, PromptSet};
pub use provider::LlmProvider;
pub use researcher::ResearcherAgent;
pub use state::{ConversationState, PrimedConversation, prime_conversation};
pub use tool::{ToolCall, ToolDefinition, ToolResult, research_definitions};
pub use traits::Agent;
