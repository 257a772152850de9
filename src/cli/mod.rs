//! CLI layer for deep-research.
//!
//! Provides the command-line interface using clap, with commands for
//! asking research questions, inspecting stored threads, and invoking the
//! research tools directly.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ToolCommands};
