//! Conversation persistence keyed by thread identifier.
//!
//! The research loop talks to an injected [`ConversationStore`]; two
//! backends ship with the crate:
//!
//! - [`InMemoryConversationStore`]: process-lifetime threads (default)
//! - [`SqliteConversationStore`]: durable threads in a `SQLite` file
//!
//! Writers for the same thread are serialized with [`ThreadLocks`].

mod memory;
mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::agent::message::ChatMessage;
use crate::agent::state::ConversationState;
use crate::error::StorageError;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;

/// Mapping from thread identifier to [`ConversationState`].
///
/// Implementations must make [`append`](ConversationStore::append) atomic:
/// a batch is validated with [`ConversationState::validate_batch`] and then
/// written completely, or rejected without writing anything.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Whether threads survive a process restart.
    fn is_persistent(&self) -> bool;

    /// Returns the thread's state, creating an empty one on first use.
    async fn get_or_create(&self, thread_id: &str) -> Result<ConversationState, StorageError>;

    /// Appends a batch of messages to the thread.
    async fn append(&self, thread_id: &str, messages: Vec<ChatMessage>)
    -> Result<(), StorageError>;

    /// Sets the thread's completion flag.
    async fn set_completion(&self, thread_id: &str, complete: bool) -> Result<(), StorageError>;

    /// Replaces the thread's accumulated research text.
    async fn set_research_content(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), StorageError>;

    /// Lists known thread identifiers in creation order.
    async fn list_threads(&self) -> Result<Vec<String>, StorageError>;
}

/// One async mutex per thread identifier.
///
/// Holding the guard returned by [`ThreadLocks::acquire`] gives the caller
/// exclusive write access to that thread; other threads are unaffected.
/// Idle entries are dropped on the next acquire, so the table only grows
/// with the number of threads in use at once.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] if the lock table was poisoned.
    pub async fn acquire(&self, thread_id: &str) -> Result<OwnedMutexGuard<()>, StorageError> {
        let lock = {
            let mut table = self.locks.lock().map_err(|_| StorageError::Lock)?;
            // Entries only the table references are neither held nor awaited.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                table
                    .entry(thread_id.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        Ok(lock.lock_owned().await)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .map_or(0, |table| table.len())
    }
}
