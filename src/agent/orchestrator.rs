//! Orchestrator for multi-turn research conversations.
//!
//! Owns the collaborators of a run (model provider, conversation store,
//! tool executor, prompts) and serializes runs per thread identifier.
//! Distinct threads proceed concurrently.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::agentic_loop::{ResearchEvent, ResearchLoop, ResearchOutcome};
use super::client::create_provider;
use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::formatter::FormatterAgent;
use super::message::{ChatMessage, user_message};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::researcher::ResearcherAgent;
use super::state::prime_conversation;
use crate::error::AgentError;
use crate::research::{ResearchApi, ResearchTool, TavilyClient, research_tools};
use crate::storage::{
    ConversationStore, InMemoryConversationStore, SqliteConversationStore, ThreadLocks,
};

/// Thread identifier used when the caller does not pick one.
pub const DEFAULT_THREAD_ID: &str = "default";

/// Runs research turns against persisted conversation threads.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn ConversationStore>,
    executor: ToolExecutor,
    config: AgentConfig,
    prompts: PromptSet,
    locks: ThreadLocks,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit collaborators.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn ConversationStore>,
        tools: Vec<Arc<dyn ResearchTool>>,
        config: AgentConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            store,
            executor: ToolExecutor::new(tools),
            config,
            prompts,
            locks: ThreadLocks::new(),
        }
    }

    /// Builds the production stack: configured model provider, Tavily
    /// research tools, and a `SQLite` store when [`AgentConfig::db_path`]
    /// is set (in-memory otherwise).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] for an unknown provider,
    /// [`AgentError::Storage`] if the database cannot be opened, and
    /// [`AgentError::Orchestration`] if an HTTP client cannot be built.
    pub fn from_config(config: AgentConfig) -> Result<Self, AgentError> {
        let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config)?);
        let store: Arc<dyn ConversationStore> = match config.db_path.as_deref() {
            Some(path) => Arc::new(SqliteConversationStore::open(path)?),
            None => Arc::new(InMemoryConversationStore::new()),
        };
        let api: Arc<dyn ResearchApi> =
            Arc::new(
                TavilyClient::new(&config).map_err(|e| AgentError::Orchestration {
                    message: format!("failed to build research client: {e}"),
                })?,
            );
        debug!(
            provider = provider.name(),
            store = store.name(),
            persistent = store.is_persistent(),
            "orchestrator ready"
        );
        Ok(Self::new(provider, store, research_tools(&api), config))
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// The conversation store backing this orchestrator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Runs one research turn for `query` and returns the formatted answer.
    ///
    /// Repeated calls with the same `thread_id` continue the same
    /// conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidInput`] for an empty query (before any
    /// model call) and propagates model and store failures.
    pub async fn submit(&self, query: &str, thread_id: &str) -> Result<String, AgentError> {
        let outcome = self
            .run_inner(thread_id, Self::query_messages(query)?, None)
            .await?;
        Ok(outcome.answer)
    }

    /// Like [`submit`](Self::submit), reporting progress on `events`.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub async fn submit_with_events(
        &self,
        query: &str,
        thread_id: &str,
        events: &UnboundedSender<ResearchEvent>,
    ) -> Result<ResearchOutcome, AgentError> {
        self.run_inner(thread_id, Self::query_messages(query)?, Some(events))
            .await
    }

    /// Runs one research turn with arbitrary input messages.
    ///
    /// A system message in `messages` is used only when the thread has none
    /// yet; otherwise the stored one wins.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidInput`] if there is no user, assistant or
    /// tool message to respond to, and propagates model and store failures.
    pub async fn run(
        &self,
        thread_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ResearchOutcome, AgentError> {
        self.run_inner(thread_id, messages, None).await
    }

    fn query_messages(query: &str) -> Result<Vec<ChatMessage>, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                message: "query cannot be empty".to_string(),
            });
        }
        Ok(vec![user_message(query)])
    }

    async fn run_inner(
        &self,
        thread_id: &str,
        messages: Vec<ChatMessage>,
        events: Option<&UnboundedSender<ResearchEvent>>,
    ) -> Result<ResearchOutcome, AgentError> {
        if thread_id.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                message: "thread id cannot be empty".to_string(),
            });
        }

        let _guard = self.locks.acquire(thread_id).await?;
        let existing = self.store.get_or_create(thread_id).await?;
        let primed = prime_conversation(&existing, messages, || {
            self.prompts.system_prompt_for_today()
        });
        if primed.non_system_count() == 0 {
            return Err(AgentError::InvalidInput {
                message: "at least one non-system message (user, assistant or tool) is required"
                    .to_string(),
            });
        }

        info!(
            thread_id,
            history = primed.history.len(),
            new_messages = primed.new_messages.len(),
            "starting research turn"
        );
        self.store.set_completion(thread_id, false).await?;

        let researcher = ResearcherAgent::with_tools(&self.config, self.executor.definitions());
        let formatter = FormatterAgent::new(&self.config, self.prompts.formatter.clone());
        ResearchLoop {
            provider: &*self.provider,
            store: &*self.store,
            executor: &self.executor,
            researcher: &researcher,
            formatter: &formatter,
            max_iterations: self.config.max_iterations,
            events,
        }
        .run(thread_id, primed)
        .await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("store", &self.store.name())
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
