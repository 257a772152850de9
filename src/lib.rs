//! # deep-research
//!
//! A multi-turn research agent. A tool-calling language model works a
//! question through web search, page extraction and site crawling, signals
//! when it has gathered enough, and a final formatting pass turns the
//! conversation into a cited markdown answer.
//!
//! Conversations are keyed by thread identifier and persisted through a
//! [`ConversationStore`](storage::ConversationStore), in memory or in
//! `SQLite`, so follow-up questions continue where the last one stopped.
//!
//! ```no_run
//! use deep_research::agent::{AgentConfig, DEFAULT_THREAD_ID, Orchestrator};
//!
//! # async fn run() -> Result<(), deep_research::Error> {
//! let config = AgentConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(config)?;
//! let answer = orchestrator
//!     .submit("What changed in HTTP/3?", DEFAULT_THREAD_ID)
//!     .await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod research;
pub mod storage;

pub use agent::{AgentConfig, Orchestrator, ResearchOutcome};
pub use error::{AgentError, CommandError, Error, ResearchApiError, Result, StorageError};
pub use storage::{ConversationStore, InMemoryConversationStore, SqliteConversationStore};
