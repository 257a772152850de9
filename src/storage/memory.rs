//! In-memory conversation store (non-persistent).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ConversationStore;
use crate::agent::message::ChatMessage;
use crate::agent::state::ConversationState;
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Threads {
    states: HashMap<String, ConversationState>,
    order: Vec<String>,
}

impl Threads {
    fn entry(&mut self, thread_id: &str) -> &mut ConversationState {
        if !self.states.contains_key(thread_id) {
            self.order.push(thread_id.to_string());
        }
        self.states.entry(thread_id.to_string()).or_default()
    }
}

/// Keeps conversation threads in a `HashMap` for the process lifetime.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    threads: RwLock<Threads>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn get_or_create(&self, thread_id: &str) -> Result<ConversationState, StorageError> {
        if let Some(state) = self.threads.read().await.states.get(thread_id) {
            return Ok(state.clone());
        }
        Ok(self.threads.write().await.entry(thread_id).clone())
    }

    async fn append(
        &self,
        thread_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<(), StorageError> {
        let count = messages.len();
        self.threads
            .write()
            .await
            .entry(thread_id)
            .append_batch(thread_id, messages)?;
        debug!(thread_id, count, "appended messages");
        Ok(())
    }

    async fn set_completion(&self, thread_id: &str, complete: bool) -> Result<(), StorageError> {
        self.threads.write().await.entry(thread_id).is_research_complete = complete;
        Ok(())
    }

    async fn set_research_content(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), StorageError> {
        self.threads.write().await.entry(thread_id).research_content = content.to_string();
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.threads.read().await.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{tool_message, user_message};

    #[tokio::test]
    async fn test_get_or_create_returns_same_logical_state() {
        let store = InMemoryConversationStore::new();
        let fresh = store
            .get_or_create("t1")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(fresh.messages.is_empty());

        store
            .append("t1", vec![user_message("hello")])
            .await
            .unwrap_or_else(|_| unreachable!());
        store
            .set_completion("t1", true)
            .await
            .unwrap_or_else(|_| unreachable!());

        let again = store
            .get_or_create("t1")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(again.messages.len(), 1);
        assert!(again.is_research_complete);
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_thread_untouched() {
        let store = InMemoryConversationStore::new();
        store
            .append("t1", vec![user_message("q")])
            .await
            .unwrap_or_else(|_| unreachable!());
        let result = store
            .append("t1", vec![user_message("more"), tool_message("nope", "x")])
            .await;
        assert!(matches!(result, Err(StorageError::UnknownToolCall { .. })));
        let state = store
            .get_or_create("t1")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(state.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_threads_are_independent_and_listed_in_order() {
        let store = InMemoryConversationStore::new();
        store
            .append("b", vec![user_message("for b")])
            .await
            .unwrap_or_else(|_| unreachable!());
        store
            .set_research_content("a", "notes")
            .await
            .unwrap_or_else(|_| unreachable!());

        let a = store.get_or_create("a").await.unwrap_or_default();
        assert!(a.messages.is_empty());
        assert_eq!(a.research_content, "notes");
        assert_eq!(
            store.list_threads().await.unwrap_or_default(),
            vec!["b".to_string(), "a".to_string()]
        );
    }
}
