//! Error types for deep-research.
//!
//! Each layer owns a `thiserror` enum: [`AgentError`] for the research loop
//! and model calls, [`StorageError`] for conversation persistence,
//! [`ResearchApiError`] for the web research provider, and [`CommandError`]
//! for the CLI. [`Error`] wraps them all at the binary boundary.

use thiserror::Error;

/// Convenience alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Research loop or model failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Conversation store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised by the research loop and its model collaborator.
///
/// Tool failures never show up here: adapters turn them into tool-result
/// text so the model can react to them.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured for the model provider.
    #[error("model API key not found (set OPENAI_API_KEY or RESEARCH_API_KEY)")]
    ApiKeyMissing,

    /// Provider name not recognised by the factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name that was requested.
        name: String,
    },

    /// The model endpoint returned an error or could not be reached.
    #[error("model request failed: {message}")]
    ApiRequest {
        /// Error description from the client.
        message: String,
        /// HTTP status code, when known.
        status: Option<u16>,
    },

    /// Input rejected before any model call was made.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input.
        message: String,
    },

    /// Conversation store failure during a run.
    #[error("conversation store error: {0}")]
    Storage(#[from] StorageError),

    /// Internal orchestration failure (task join, channel, etc).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },
}

/// Errors raised by [`ConversationStore`](crate::storage::ConversationStore)
/// implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Message (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tool-result message answers a call id that no pending assistant
    /// turn requested.
    #[error("tool result references unknown call id '{call_id}' in thread '{thread_id}'")]
    UnknownToolCall {
        /// Thread the batch was appended to.
        thread_id: String,
        /// Offending call id.
        call_id: String,
    },

    /// A second tool-result message for a call id that already has one.
    #[error("duplicate tool result for call id '{call_id}' in thread '{thread_id}'")]
    DuplicateToolResult {
        /// Thread the batch was appended to.
        thread_id: String,
        /// Offending call id.
        call_id: String,
    },

    /// The database directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Lock,
}

/// Errors raised by a [`ResearchApi`](crate::research::ResearchApi) backend.
#[derive(Debug, Error)]
pub enum ResearchApiError {
    /// No API key configured for the research provider.
    #[error("TAVILY_API_KEY not found in environment variables.")]
    MissingApiKey,

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed to execute.
    #[error("{0}")]
    ExecutionFailed(String),

    /// I/O failure while scaffolding prompt templates.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_message_matches_tool_text() {
        assert_eq!(
            ResearchApiError::MissingApiKey.to_string(),
            "TAVILY_API_KEY not found in environment variables."
        );
    }

    #[test]
    fn test_storage_error_converts_into_agent_error() {
        let err: AgentError = StorageError::UnknownToolCall {
            thread_id: "t".to_string(),
            call_id: "call_9".to_string(),
        }
        .into();
        assert!(matches!(err, AgentError::Storage(_)));
        assert!(err.to_string().contains("call_9"));
    }

    #[test]
    fn test_top_level_wraps_command_error() {
        let err: Error = CommandError::ExecutionFailed("boom".to_string()).into();
        assert_eq!(err.to_string(), "boom");
    }
}
