//! Conversation state threaded through the research loop.
//!
//! A [`ConversationState`] is owned by one thread identifier. Messages are
//! append-only and their order is meaningful: every tool-result message
//! must answer a call id requested by the latest assistant turn, once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, Role, system_message};
use super::tool::ToolCall;
use crate::error::StorageError;

/// Persisted state for one conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered message history.
    pub messages: Vec<ChatMessage>,
    /// Set by the loop when the model signals that research is done.
    pub is_research_complete: bool,
    /// Accumulated research notes. Kept with the thread but not read by the
    /// formatting pass.
    #[serde(default)]
    pub research_content: String,
}

impl ConversationState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the history already holds a system message.
    #[must_use]
    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(ChatMessage::is_system)
    }

    /// Number of user, assistant and tool messages.
    #[must_use]
    pub fn non_system_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }

    /// Call ids of the latest assistant turn that have no tool result yet.
    #[must_use]
    pub fn pending_tool_calls(&self) -> Vec<String> {
        let tracker = CallTracker::over(&self.messages);
        tracker.pending()
    }

    /// Checks that `batch` can be appended without breaking call/result
    /// pairing. Nothing is modified.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownToolCall`] for a result whose call id
    /// was not requested by the latest assistant turn and
    /// [`StorageError::DuplicateToolResult`] for a second result to the same
    /// call.
    pub fn validate_batch(&self, thread_id: &str, batch: &[ChatMessage]) -> Result<(), StorageError> {
        let mut tracker = CallTracker::over(&self.messages);
        for message in batch {
            tracker.observe(thread_id, message)?;
        }
        Ok(())
    }

    /// Validates and appends a batch of messages. Either the whole batch is
    /// appended or none of it.
    ///
    /// # Errors
    ///
    /// See [`ConversationState::validate_batch`].
    pub fn append_batch(
        &mut self,
        thread_id: &str,
        batch: Vec<ChatMessage>,
    ) -> Result<(), StorageError> {
        self.validate_batch(thread_id, &batch)?;
        self.messages.extend(batch);
        Ok(())
    }
}

/// Tracks which call ids of the latest assistant turn have been answered.
#[derive(Debug, Default)]
struct CallTracker {
    requested: Vec<String>,
    answered: HashSet<String>,
}

impl CallTracker {
    /// Builds a tracker from an already-valid history.
    fn over(messages: &[ChatMessage]) -> Self {
        let mut tracker = Self::default();
        for message in messages {
            tracker.record(message);
        }
        tracker
    }

    fn record(&mut self, message: &ChatMessage) {
        match message.role {
            Role::Assistant => {
                self.requested = message.tool_calls.iter().map(|c| c.id.clone()).collect();
                self.answered.clear();
            }
            Role::Tool => {
                if let Some(id) = &message.tool_call_id {
                    self.answered.insert(id.clone());
                }
            }
            Role::System | Role::User => {}
        }
    }

    fn observe(&mut self, thread_id: &str, message: &ChatMessage) -> Result<(), StorageError> {
        if message.role == Role::Tool {
            let call_id = message.tool_call_id.clone().unwrap_or_default();
            if !self.requested.contains(&call_id) {
                return Err(StorageError::UnknownToolCall {
                    thread_id: thread_id.to_string(),
                    call_id,
                });
            }
            if self.answered.contains(&call_id) {
                return Err(StorageError::DuplicateToolResult {
                    thread_id: thread_id.to_string(),
                    call_id,
                });
            }
        }
        self.record(message);
        Ok(())
    }

    fn pending(&self) -> Vec<String> {
        self.requested
            .iter()
            .filter(|id| !self.answered.contains(*id))
            .cloned()
            .collect()
    }
}

/// A conversation ready for the first model call of a run.
#[derive(Debug, Clone)]
pub struct PrimedConversation {
    /// Full request history: system message first, then every other message
    /// in original order.
    pub history: Vec<ChatMessage>,
    /// Messages that are new to the thread and must be committed with the
    /// first turn (a generated system prompt, if any, then the input).
    pub new_messages: Vec<ChatMessage>,
}

impl PrimedConversation {
    /// Number of non-system messages in the request history.
    #[must_use]
    pub fn non_system_count(&self) -> usize {
        self.history.iter().filter(|m| !m.is_system()).count()
    }
}

/// Primes a conversation for a new run.
///
/// System messages (stored ones, else caller-supplied ones, else the
/// generated prompt) come first; all other messages keep their order with
/// the new input last. `system_prompt` is only called when no system message
/// exists.
pub fn prime_conversation(
    existing: &ConversationState,
    input: Vec<ChatMessage>,
    system_prompt: impl FnOnce() -> String,
) -> PrimedConversation {
    let (input_system, input_rest): (Vec<_>, Vec<_>) =
        input.into_iter().partition(ChatMessage::is_system);

    let mut new_messages = Vec::new();
    let mut systems: Vec<ChatMessage> = existing
        .messages
        .iter()
        .filter(|m| m.is_system())
        .cloned()
        .collect();

    if systems.is_empty() {
        let injected = if input_system.is_empty() {
            vec![system_message(&system_prompt())]
        } else {
            input_system
        };
        new_messages.extend(injected.iter().cloned());
        systems = injected;
    }

    new_messages.extend(input_rest.iter().cloned());

    let mut history = systems;
    history.extend(existing.messages.iter().filter(|m| !m.is_system()).cloned());
    history.extend(input_rest);

    PrimedConversation {
        history,
        new_messages,
    }
}

/// Gives every call of one assistant turn a distinct, non-empty id.
///
/// Some compatible endpoints repeat ids (often `""`) across parallel calls,
/// which would make their results indistinguishable. The first call keeps
/// a repeated id; later ones, and blank ids, become `call_{turn}_{index}`.
/// Returns how many ids were replaced.
pub fn assign_call_ids(calls: &mut [ToolCall], turn: usize) -> usize {
    let mut taken: HashSet<String> = HashSet::new();
    let mut replaced = 0;
    for index in 0..calls.len() {
        let id = &calls[index].id;
        if !id.trim().is_empty() && !taken.contains(id) {
            taken.insert(id.clone());
            continue;
        }
        let mut candidate = format!("call_{turn}_{index}");
        let mut suffix = 0usize;
        while taken.contains(&candidate) || calls.iter().any(|c| c.id == candidate) {
            suffix += 1;
            candidate = format!("call_{turn}_{index}_{suffix}");
        }
        taken.insert(candidate.clone());
        calls[index].id = candidate;
        replaced += 1;
    }
    replaced
}
