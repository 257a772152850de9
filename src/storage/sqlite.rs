//! `SQLite`-backed conversation store.
//!
//! Threads survive process restarts. The connection lives behind a
//! `std::sync::Mutex`; every operation is a short synchronous statement,
//! and `append` runs inside a transaction so a batch is all-or-nothing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::ConversationStore;
use crate::agent::message::{ChatMessage, Role};
use crate::agent::state::ConversationState;
use crate::error::StorageError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS threads (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    is_research_complete INTEGER NOT NULL DEFAULT 0,
    research_content TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL REFERENCES threads(id),
    position INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_calls TEXT,
    tool_call_id TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (thread_id, position)
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, position);
";

/// Persists conversation threads in a `SQLite` database.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Opens (or creates) a database file and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the parent directory cannot be
    /// created, and [`StorageError::Database`] if the file cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Creates a store backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }

    fn ensure_thread(conn: &Connection, thread_id: &str) -> Result<(), StorageError> {
        conn.execute(
            "INSERT OR IGNORE INTO threads (id, created_at) VALUES (?1, ?2)",
            params![thread_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn load(conn: &Connection, thread_id: &str) -> Result<ConversationState, StorageError> {
        let flags: Option<(bool, String)> = conn
            .query_row(
                "SELECT is_research_complete, research_content FROM threads WHERE id = ?1",
                params![thread_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (is_research_complete, research_content) = flags.unwrap_or_default();

        let mut stmt = conn.prepare(
            "SELECT role, content, tool_calls, tool_call_id FROM messages \
             WHERE thread_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![thread_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let messages = rows
            .into_iter()
            .map(|(role, content, tool_calls, tool_call_id)| {
                Ok(ChatMessage {
                    role: serde_json::from_value::<Role>(serde_json::Value::String(role))?,
                    content,
                    tool_calls: tool_calls
                        .map(|json| serde_json::from_str(&json))
                        .transpose()?
                        .unwrap_or_default(),
                    tool_call_id,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(ConversationState {
            messages,
            is_research_complete,
            research_content,
        })
    }
}

impl std::fmt::Debug for SqliteConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConversationStore")
            .field("conn", &"<rusqlite::Connection>")
            .finish()
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn get_or_create(&self, thread_id: &str) -> Result<ConversationState, StorageError> {
        let conn = self.conn()?;
        Self::ensure_thread(&conn, thread_id)?;
        Self::load(&conn, thread_id)
    }

    async fn append(
        &self,
        thread_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        Self::ensure_thread(&conn, thread_id)?;
        let state = Self::load(&conn, thread_id)?;
        state.validate_batch(thread_id, &messages)?;

        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages \
                 (thread_id, position, role, content, tool_calls, tool_call_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (offset, message) in messages.iter().enumerate() {
                let position = i64::try_from(state.messages.len() + offset).unwrap_or(i64::MAX);
                let tool_calls = if message.tool_calls.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&message.tool_calls)?)
                };
                stmt.execute(params![
                    thread_id,
                    position,
                    message.role.as_str(),
                    message.content,
                    tool_calls,
                    message.tool_call_id,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        debug!(thread_id, count = messages.len(), "committed messages");
        Ok(())
    }

    async fn set_completion(&self, thread_id: &str, complete: bool) -> Result<(), StorageError> {
        let conn = self.conn()?;
        Self::ensure_thread(&conn, thread_id)?;
        conn.execute(
            "UPDATE threads SET is_research_complete = ?2 WHERE id = ?1",
            params![thread_id, complete],
        )?;
        Ok(())
    }

    async fn set_research_content(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn()?;
        Self::ensure_thread(&conn, thread_id)?;
        conn.execute(
            "UPDATE threads SET research_content = ?2 WHERE id = ?1",
            params![thread_id, content],
        )?;
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM threads ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
