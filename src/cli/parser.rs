//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::DEFAULT_THREAD_ID;

/// deep-research: multi-turn web research agent.
///
/// An LLM drives web search, extract and crawl tools over a persisted
/// conversation, then writes a cited markdown answer.
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the conversation database.
    ///
    /// Without it, threads live in memory for a single invocation.
    #[arg(short, long, env = "RESEARCH_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a research question.
    ///
    /// Runs the research loop on the thread and prints the formatted answer.
    #[command(after_help = r#"Examples:
  deep-research ask "What changed in HTTP/3?"
  deep-research --db-path ./research.db ask "Follow up on QUIC" --thread quic
  deep-research ask "Rust 2024 edition highlights" --stream
"#)]
    Ask {
        /// The research question.
        query: String,

        /// Conversation thread to continue.
        #[arg(short, long, default_value = DEFAULT_THREAD_ID)]
        thread: String,

        /// Print loop progress to stderr while researching.
        #[arg(long)]
        stream: bool,
    },

    /// Show the stored conversation of a thread.
    #[command(after_help = r#"Examples:
  deep-research --db-path ./research.db history
  deep-research --db-path ./research.db history --thread quic --format json
"#)]
    History {
        /// Thread to show.
        #[arg(short, long, default_value = DEFAULT_THREAD_ID)]
        thread: String,
    },

    /// List stored thread identifiers.
    Threads,

    /// Invoke a research tool directly.
    #[command(subcommand)]
    Tool(ToolCommands),

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  deep-research init-prompts
  deep-research init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory (default: ~/.config/deep-research/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Research tool subcommands.
#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// Search the web.
    #[command(after_help = r#"Examples:
  deep-research tool search "rust async runtimes"
  deep-research tool search "quic adoption" --time-range month --include-domain ietf.org
"#)]
    Search {
        /// Search query.
        query: String,

        /// Restrict results to a publication window.
        #[arg(long, value_parser = ["day", "week", "month", "year", "d", "w", "m", "y"])]
        time_range: Option<String>,

        /// Restrict results to a domain (repeatable).
        #[arg(long = "include-domain")]
        include_domains: Vec<String>,
    },

    /// Extract full page content.
    Extract {
        /// URLs to extract.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Include image URLs found on the pages.
        #[arg(long)]
        include_images: bool,

        /// Extraction depth.
        #[arg(long, default_value = "basic", value_parser = ["basic", "advanced"])]
        depth: String,
    },

    /// Crawl a site from a starting URL.
    Crawl {
        /// Starting URL.
        url: String,

        /// What to look for while crawling.
        #[arg(long)]
        instructions: Option<String>,
    },
}
