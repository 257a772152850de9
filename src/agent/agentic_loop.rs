//! Research loop state machine.
//!
//! Drives the model ↔ tool round-trip for one `submit`: the researcher is
//! called with the full history, any tool calls it makes are executed
//! concurrently, and the cycle repeats until the researcher stops calling
//! tools, emits the completion sentinel or exhausts its iteration budget.
//! A final formatting pass then produces the answer.
//!
//! ```text
//! AwaitingModel ──tool calls──▶ ExecutingTools ──results──▶ AwaitingModel
//!       │                              │
//!       │ no calls / sentinel          │ iteration cap
//!       ▼                              ▼
//!   Formatting ◀───────────────────────┘
//!       │
//!       ▼
//!     Done
//! ```
//!
//! Every assistant turn is committed to the store together with all of its
//! tool results, so a cancelled or failed run never leaves a tool call
//! without its answer.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::executor::ToolExecutor;
use super::formatter::FormatterAgent;
use super::message::{ChatMessage, TokenUsage, assistant_message, tool_message};
use super::prompt::contains_sentinel;
use super::provider::LlmProvider;
use super::researcher::ResearcherAgent;
use super::state::{PrimedConversation, assign_call_ids};
use super::tool::{ToolCall, ToolResult};
use super::traits::Agent;
use crate::error::AgentError;
use crate::storage::ConversationStore;

/// Phase of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// Waiting for the researcher's next response.
    AwaitingModel,
    /// Running the tool calls of the latest assistant turn.
    ExecutingTools,
    /// Producing the final formatted answer.
    Formatting,
    /// Finished; the answer is the last stored message.
    Done,
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Formatting => "formatting",
            Self::Done => "done",
        })
    }
}

/// Progress notifications for streaming front ends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// The loop moved to a new phase.
    PhaseChanged {
        /// Phase entered.
        phase: LoopPhase,
    },
    /// The researcher answered.
    ModelResponded {
        /// 1-based research turn.
        iteration: usize,
        /// Response text (may be empty when only tools were requested).
        content: String,
        /// Names of the requested tools, in call order.
        tool_calls: Vec<String>,
    },
    /// All tool calls of a turn finished.
    ToolsExecuted {
        /// One result per call, in call order.
        results: Vec<ToolResult>,
    },
    /// The formatting pass finished.
    FinalAnswer {
        /// The formatted answer.
        content: String,
    },
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    /// Content of the final formatted message.
    pub answer: String,
    /// Every phase entered, starting with [`LoopPhase::AwaitingModel`].
    pub transitions: Vec<LoopPhase>,
    /// Number of researcher turns.
    pub iterations: usize,
    /// Number of tool calls executed.
    pub tool_calls_executed: usize,
    /// Whether the iteration cap forced the formatting pass.
    pub hit_iteration_limit: bool,
    /// Token usage summed over every model call, formatting included.
    pub usage: TokenUsage,
}

/// Collaborators for one run.
pub struct ResearchLoop<'a> {
    /// Model backend.
    pub provider: &'a dyn LlmProvider,
    /// Conversation persistence.
    pub store: &'a dyn ConversationStore,
    /// Tool dispatch.
    pub executor: &'a ToolExecutor,
    /// Tool-calling agent.
    pub researcher: &'a ResearcherAgent,
    /// Final-pass agent.
    pub formatter: &'a FormatterAgent,
    /// Maximum researcher turns that may request tools.
    pub max_iterations: usize,
    /// Optional progress channel.
    pub events: Option<&'a UnboundedSender<ResearchEvent>>,
}

impl ResearchLoop<'_> {
    /// Runs the state machine to [`LoopPhase::Done`].
    ///
    /// The caller must hold the thread's write lock. `primed.new_messages`
    /// are committed together with the first researcher turn.
    ///
    /// # Errors
    ///
    /// Model failures abort the run with the provider's error; store
    /// failures abort with [`AgentError::Storage`]. Either way the thread
    /// ends at its last fully committed turn.
    pub async fn run(
        &self,
        thread_id: &str,
        primed: PrimedConversation,
    ) -> Result<ResearchOutcome, AgentError> {
        let mut history = primed.history;
        let mut uncommitted = primed.new_messages;
        let mut pending_calls: Vec<ToolCall> = Vec::new();
        let mut research_summary = String::new();

        let mut phase = LoopPhase::AwaitingModel;
        let mut outcome = ResearchOutcome {
            answer: String::new(),
            transitions: vec![phase],
            iterations: 0,
            tool_calls_executed: 0,
            hit_iteration_limit: false,
            usage: TokenUsage::default(),
        };
        self.emit(ResearchEvent::PhaseChanged { phase });
        let mut tool_turns = 0usize;

        loop {
            let next = match phase {
                LoopPhase::AwaitingModel => {
                    let mut response = self.researcher.respond(self.provider, &history).await?;
                    outcome.iterations += 1;
                    let renamed = assign_call_ids(&mut response.tool_calls, outcome.iterations);
                    if renamed > 0 {
                        warn!(
                            thread_id,
                            iteration = outcome.iterations,
                            renamed,
                            "model returned blank or repeated tool call ids"
                        );
                    }
                    outcome.usage.accumulate(response.usage);

                    let complete = contains_sentinel(&response.content);
                    if complete {
                        self.store.set_completion(thread_id, true).await?;
                    }
                    debug!(
                        thread_id,
                        iteration = outcome.iterations,
                        tool_calls = response.tool_calls.len(),
                        complete,
                        "researcher responded"
                    );
                    self.emit(ResearchEvent::ModelResponded {
                        iteration: outcome.iterations,
                        content: response.content.clone(),
                        tool_calls: response.tool_calls.iter().map(|c| c.name.clone()).collect(),
                    });

                    research_summary.clone_from(&response.content);
                    if !response.tool_calls.is_empty() && !complete {
                        pending_calls = response.tool_calls.clone();
                        let message = response.into_message();
                        history.push(message.clone());
                        uncommitted.push(message);
                        LoopPhase::ExecutingTools
                    } else {
                        // Tool requests alongside the sentinel are dropped so
                        // the stored turn has no unanswered calls.
                        let message = assistant_message(&response.content, Vec::new());
                        history.push(message.clone());
                        uncommitted.push(message);
                        self.commit(thread_id, &mut uncommitted).await?;
                        LoopPhase::Formatting
                    }
                }

                LoopPhase::ExecutingTools => {
                    let calls = std::mem::take(&mut pending_calls);
                    let results = self.executor.execute_all(&calls).await;
                    outcome.tool_calls_executed += results.len();

                    let messages: Vec<ChatMessage> = results
                        .iter()
                        .map(|r| tool_message(&r.tool_call_id, &r.content))
                        .collect();
                    history.extend(messages.iter().cloned());
                    uncommitted.extend(messages);
                    self.commit(thread_id, &mut uncommitted).await?;
                    self.emit(ResearchEvent::ToolsExecuted { results });

                    tool_turns += 1;
                    if tool_turns >= self.max_iterations {
                        warn!(
                            thread_id,
                            max_iterations = self.max_iterations,
                            "iteration limit reached, formatting gathered research"
                        );
                        outcome.hit_iteration_limit = true;
                        LoopPhase::Formatting
                    } else {
                        LoopPhase::AwaitingModel
                    }
                }

                LoopPhase::Formatting => {
                    self.store
                        .set_research_content(thread_id, &research_summary)
                        .await?;
                    let response = self.formatter.respond(self.provider, &history).await?;
                    outcome.usage.accumulate(response.usage);

                    let message = assistant_message(&response.content, Vec::new());
                    self.store.append(thread_id, vec![message]).await?;
                    outcome.answer = response.content;
                    self.emit(ResearchEvent::FinalAnswer {
                        content: outcome.answer.clone(),
                    });
                    LoopPhase::Done
                }

                LoopPhase::Done => break,
            };

            debug!(thread_id, from = %phase, to = %next, "phase transition");
            phase = next;
            outcome.transitions.push(phase);
            self.emit(ResearchEvent::PhaseChanged { phase });
        }

        info!(
            thread_id,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls_executed,
            total_tokens = outcome.usage.total_tokens,
            "research complete"
        );
        Ok(outcome)
    }

    async fn commit(
        &self,
        thread_id: &str,
        uncommitted: &mut Vec<ChatMessage>,
    ) -> Result<(), AgentError> {
        let batch = std::mem::take(uncommitted);
        self.store.append(thread_id, batch).await?;
        Ok(())
    }

    fn emit(&self, event: ResearchEvent) {
        if let Some(tx) = self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::config::AgentConfig;
    use crate::agent::message::{Role, system_message, user_message};
    use crate::agent::prompt::FORMATTER_PROMPT;
    use crate::agent::state::{ConversationState, prime_conversation};
    use crate::agent::testing::{CountingTool, FailingApi, ScriptedProvider, text, tools};
    use crate::error::StorageError;
    use crate::research::{ResearchApi, ResearchTool, WebExtract};
    use crate::storage::InMemoryConversationStore;

    use std::sync::Arc;

    use LoopPhase::{AwaitingModel, Done, ExecutingTools, Formatting};

    struct Fixture {
        config: AgentConfig,
        store: InMemoryConversationStore,
        search: Arc<CountingTool>,
        executor: ToolExecutor,
    }

    impl Fixture {
        fn new(max_iterations: usize) -> Self {
            Self::with_extra_tools(max_iterations, Vec::new())
        }

        fn with_extra_tools(max_iterations: usize, extra: Vec<Arc<dyn ResearchTool>>) -> Self {
            let search = CountingTool::new("web_search", "No search results found.");
            let tool: Arc<dyn ResearchTool> = search.clone();
            let mut tools = vec![tool];
            tools.extend(extra);
            Self {
                config: AgentConfig::builder()
                    .api_key("test")
                    .max_iterations(max_iterations)
                    .build()
                    .unwrap_or_else(|_| unreachable!()),
                store: InMemoryConversationStore::new(),
                search,
                executor: ToolExecutor::new(tools),
            }
        }

        async fn run(
            &self,
            provider: &ScriptedProvider,
            query: &str,
            events: Option<&UnboundedSender<ResearchEvent>>,
        ) -> Result<ResearchOutcome, AgentError> {
            let researcher = ResearcherAgent::with_tools(&self.config, self.executor.definitions());
            let formatter = FormatterAgent::new(&self.config, FORMATTER_PROMPT.to_string());
            let existing = self.store.get_or_create("t").await?;
            let primed =
                prime_conversation(&existing, vec![user_message(query)], || "sys".to_string());
            ResearchLoop {
                provider,
                store: &self.store,
                executor: &self.executor,
                researcher: &researcher,
                formatter: &formatter,
                max_iterations: self.config.max_iterations,
                events,
            }
            .run("t", primed)
            .await
        }

        async fn state(&self) -> ConversationState {
            self.store.get_or_create("t").await.unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn test_direct_answer_skips_tools() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![text("4"), text("**4** [1]")]);

        let outcome = fx
            .run(&provider, "What is 2+2?", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        assert_eq!(outcome.transitions, vec![AwaitingModel, Formatting, Done]);
        assert_eq!(outcome.answer, "**4** [1]");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(fx.search.invocations(), 0);
        assert_eq!(outcome.usage.total_tokens, 30);

        let state = fx.state().await;
        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Assistant]
        );
        assert_eq!(state.messages[3].content, "**4** [1]");
        assert_eq!(state.research_content, "4");
    }

    #[tokio::test]
    async fn test_every_call_answered_before_next_model_call() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("", &[("a", "web_search"), ("b", "web_search"), ("c", "web_search")]),
            text("summary RESEARCH_COMPLETE"),
            text("final"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(
            outcome.transitions,
            vec![AwaitingModel, ExecutingTools, AwaitingModel, Formatting, Done]
        );
        assert_eq!(fx.search.invocations(), 3);
        assert_eq!(outcome.tool_calls_executed, 3);

        let requests = provider.requests();
        let second = &requests[1].messages;
        let tail: Vec<(Role, Option<&str>)> = second[3..]
            .iter()
            .map(|m| (m.role, m.tool_call_id.as_deref()))
            .collect();
        assert_eq!(
            tail,
            vec![
                (Role::Tool, Some("a")),
                (Role::Tool, Some("b")),
                (Role::Tool, Some("c"))
            ]
        );
        assert!(second.iter().skip(1).all(|m| !m.is_system()));
        assert!(fx.state().await.is_research_complete);
    }

    #[tokio::test]
    async fn test_sentinel_with_tool_calls_goes_to_formatting() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("done RESEARCH_COMPLETE", &[("a", "web_search")]),
            text("final"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(outcome.transitions, vec![AwaitingModel, Formatting, Done]);
        assert_eq!(fx.search.invocations(), 0);

        let state = fx.state().await;
        assert!(state.is_research_complete);
        assert!(state.pending_tool_calls().is_empty());
        assert!(state.messages.iter().all(|m| m.tool_calls.is_empty()));
    }

    #[tokio::test]
    async fn test_iteration_limit_forces_formatting() {
        let fx = Fixture::new(2);
        let provider = ScriptedProvider::new(vec![
            tools("", &[("a", "web_search")]),
            tools("", &[("b", "web_search")]),
            text("best effort answer"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert!(outcome.hit_iteration_limit);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.answer, "best effort answer");
        assert_eq!(outcome.transitions.last(), Some(&Done));
        assert!(provider.requests()[2].tools.is_empty());
    }

    #[tokio::test]
    async fn test_model_error_leaves_last_committed_turn() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("", &[("a", "web_search")]),
            Err(AgentError::ApiRequest {
                message: "connection reset".to_string(),
                status: None,
            }),
        ]);

        let result = fx.run(&provider, "q", None).await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));

        let state = fx.state().await;
        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool]
        );
        assert!(state.pending_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_model_error_commits_nothing() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![Err(AgentError::ApiRequest {
            message: "unauthorized".to_string(),
            status: Some(401),
        })]);
        assert!(fx.run(&provider, "q", None).await.is_err());
        assert!(fx.state().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_result_keeps_loop_going() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("", &[("a", "web_teleport")]),
            text("could not use that tool"),
            text("final"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(outcome.answer, "final");
        let second = &provider.requests()[1].messages;
        let last = second.last().unwrap_or_else(|| panic!("empty request"));
        assert_eq!(last.role, Role::Tool);
        assert!(last.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("looking", &[("a", "web_search")]),
            text("RESEARCH_COMPLETE"),
            text("final"),
        ]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let outcome = fx
            .run(&provider, "q", Some(&tx))
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        drop(tx);

        let mut phases = Vec::new();
        let mut finals = Vec::new();
        let mut tool_batches = 0;
        while let Some(event) = rx.recv().await {
            match event {
                ResearchEvent::PhaseChanged { phase } => phases.push(phase),
                ResearchEvent::ToolsExecuted { results } => {
                    tool_batches += 1;
                    assert_eq!(results.len(), 1);
                }
                ResearchEvent::FinalAnswer { content } => finals.push(content),
                ResearchEvent::ModelResponded { .. } => {}
            }
        }
        assert_eq!(phases, outcome.transitions);
        assert_eq!(tool_batches, 1);
        assert_eq!(finals, vec!["final".to_string()]);
    }

    #[tokio::test]
    async fn test_system_message_never_interleaved() {
        let fx = Fixture::new(25);
        fx.store
            .append("t", vec![system_message("stored"), user_message("earlier")])
            .await
            .unwrap_or_else(|e: StorageError| panic!("{e}"));
        let provider = ScriptedProvider::new(vec![text("a"), text("b")]);
        fx.run(&provider, "later", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        for request in provider.requests() {
            assert!(request.messages[0].is_system());
            assert_eq!(request.messages.iter().filter(|m| m.is_system()).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_blank_repeated_call_ids_are_made_distinct() {
        let fx = Fixture::new(25);
        let provider = ScriptedProvider::new(vec![
            tools("", &[("", "web_search"), ("", "web_search")]),
            text("RESEARCH_COMPLETE"),
            text("final"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(outcome.answer, "final");
        assert_eq!(fx.search.invocations(), 2);

        let state = fx.state().await;
        assert!(state.pending_tool_calls().is_empty());
        let assistant = &state.messages[2];
        let ids: Vec<&str> = assistant.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_1_0", "call_1_1"]);
        let answered: Vec<Option<&str>> = state.messages[3..5]
            .iter()
            .map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(answered, vec![Some("call_1_0"), Some("call_1_1")]);
    }

    #[tokio::test]
    async fn test_failed_extraction_is_reported_and_loop_continues() {
        let api = FailingApi::new();
        let shared: Arc<dyn ResearchApi> = api.clone();
        let extract: Arc<dyn ResearchTool> = Arc::new(WebExtract::new(shared));
        let fx = Fixture::with_extra_tools(25, vec![extract]);
        let mut extract_turn =
            tools("", &[("x1", "web_extract")]).unwrap_or_else(|_| unreachable!());
        extract_turn.tool_calls[0].arguments = r#"{"urls":"example.com/a"}"#.to_string();
        let provider = ScriptedProvider::new(vec![
            Ok(extract_turn),
            text("extraction failed, answering from memory RESEARCH_COMPLETE"),
            text("final"),
        ]);

        let outcome = fx
            .run(&provider, "q", None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(api.calls(), 1);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(
            outcome.transitions,
            vec![AwaitingModel, ExecutingTools, AwaitingModel, Formatting, Done]
        );

        let second = &provider.requests()[1].messages;
        let result = second.last().unwrap_or_else(|| panic!("empty request"));
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("x1"));
        assert!(result.content.starts_with("Error during extraction: "));
        assert!(result.content.contains("HTTP 502"));
        assert!(result.content.contains("example.com/a"));
        assert!(result.content.ends_with("Failed to extract content."));
    }
}
