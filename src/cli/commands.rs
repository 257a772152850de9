//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Async work runs on a
//! tokio runtime created per invocation.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use crate::agent::config::{DEFAULT_TAVILY_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::agent::{AgentConfig, Orchestrator, PromptSet};
use crate::cli::output::{OutputFormat, format_event, format_history, format_threads};
use crate::cli::parser::{Cli, Commands, ToolCommands};
use crate::error::{CommandError, Result};
use crate::research::{ResearchApi, ResearchTool, TavilyClient, WebCrawl, WebExtract, WebSearch};
use crate::storage::{ConversationStore, SqliteConversationStore};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.db_path.as_deref();

    match &cli.command {
        Commands::Ask {
            query,
            thread,
            stream,
        } => cmd_ask(db_path, query, thread, *stream, format),
        Commands::History { thread } => cmd_history(db_path, thread, format),
        Commands::Threads => cmd_threads(db_path, format),
        Commands::Tool(sub) => cmd_tool(sub, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn open_store(db_path: Option<&Path>) -> Result<SqliteConversationStore> {
    let path = db_path.ok_or_else(|| {
        CommandError::ExecutionFailed(
            "No conversation database configured (use --db-path or RESEARCH_DB_PATH)".to_string(),
        )
    })?;
    Ok(SqliteConversationStore::open(path)?)
}

fn cmd_ask(
    db_path: Option<&Path>,
    query: &str,
    thread: &str,
    stream: bool,
    format: OutputFormat,
) -> Result<String> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(path) = db_path {
        builder = builder.db_path(path);
    }
    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;
    let orchestrator = Orchestrator::from_config(config)?;

    let rt = runtime()?;
    let outcome = rt.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if stream {
                    let line = format_event(&event, format);
                    let _ = std::io::stderr().lock().write_all(line.as_bytes());
                }
            }
        });
        let result = orchestrator.submit_with_events(query, thread, &tx).await;
        drop(tx);
        let _ = printer.await;
        result
    })?;

    match format {
        OutputFormat::Text => {
            let mut output = outcome.answer;
            if !output.ends_with('\n') {
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&json!({
            "thread_id": thread,
            "answer": outcome.answer,
            "iterations": outcome.iterations,
            "tool_calls_executed": outcome.tool_calls_executed,
            "hit_iteration_limit": outcome.hit_iteration_limit,
            "transitions": outcome.transitions,
            "usage": outcome.usage,
        }))),
    }
}

fn cmd_history(db_path: Option<&Path>, thread: &str, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let state = runtime()?.block_on(store.get_or_create(thread))?;
    Ok(format_history(thread, &state, format))
}

fn cmd_threads(db_path: Option<&Path>, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let threads = runtime()?.block_on(store.list_threads())?;
    Ok(format_threads(&threads, format))
}

/// Builds the research client from the environment alone, so tools can be
/// exercised without a model API key.
fn research_api() -> Result<Arc<dyn ResearchApi>> {
    let base_url =
        std::env::var("TAVILY_BASE_URL").unwrap_or_else(|_| DEFAULT_TAVILY_BASE_URL.to_string());
    let client = TavilyClient::with_settings(
        std::env::var("TAVILY_API_KEY").ok(),
        &base_url,
        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    )
    .map_err(|e| CommandError::ExecutionFailed(format!("Failed to build research client: {e}")))?;
    Ok(Arc::new(client))
}

fn cmd_tool(sub: &ToolCommands, format: OutputFormat) -> Result<String> {
    let api = research_api()?;
    let (tool, arguments) = match sub {
        ToolCommands::Search {
            query,
            time_range,
            include_domains,
        } => {
            let mut args = json!({ "query": query });
            if let Some(range) = time_range {
                args["time_range"] = json!(range);
            }
            if !include_domains.is_empty() {
                args["include_domains"] = json!(include_domains);
            }
            let tool: Arc<dyn ResearchTool> = Arc::new(WebSearch::new(api));
            (tool, args)
        }
        ToolCommands::Extract {
            urls,
            include_images,
            depth,
        } => {
            let tool: Arc<dyn ResearchTool> = Arc::new(WebExtract::new(api));
            let args = json!({
                "urls": urls,
                "include_images": include_images,
                "extract_depth": depth,
            });
            (tool, args)
        }
        ToolCommands::Crawl { url, instructions } => {
            let mut args = json!({ "url": url });
            if let Some(instructions) = instructions {
                args["instructions"] = json!(instructions);
            }
            let tool: Arc<dyn ResearchTool> = Arc::new(WebCrawl::new(api));
            (tool, args)
        }
    };

    let output = runtime()?.block_on(tool.invoke(&arguments.to_string()));
    match format {
        OutputFormat::Text => Ok(format!("{output}\n")),
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&json!({
            "tool": tool.name(),
            "arguments": arguments,
            "output": output,
        }))),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(CommandError::Io)?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown"),
                );
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the research prompts.\n");
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&json!({
            "directory": target_dir,
            "written": written,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::user_message;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let db_path = temp_dir.path().join("research.db");
        (temp_dir, db_path)
    }

    #[test]
    fn test_threads_on_fresh_database() {
        let (_temp_dir, db_path) = setup();
        let out = cmd_threads(Some(&db_path), OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        assert_eq!(out, "No threads stored.\n");
        assert!(db_path.exists());
    }

    #[test]
    fn test_threads_and_history_read_stored_conversations() {
        let (_temp_dir, db_path) = setup();
        {
            let store = SqliteConversationStore::open(&db_path).unwrap_or_else(|_| unreachable!());
            runtime()
                .unwrap_or_else(|_| unreachable!())
                .block_on(store.append("quic", vec![user_message("what is quic")]))
                .unwrap_or_else(|_| unreachable!());
        }

        let threads =
            cmd_threads(Some(&db_path), OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        assert_eq!(threads, "quic\n");

        let history = cmd_history(Some(&db_path), "quic", OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(history.contains("[0] user\nwhat is quic"));
    }

    #[test]
    fn test_history_without_database_is_an_error() {
        let err = cmd_history(None, "default", OutputFormat::Text);
        assert!(matches!(
            err,
            Err(crate::error::Error::Command(CommandError::ExecutionFailed(_)))
        ));
    }

    #[test]
    fn test_init_prompts_writes_then_skips() {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let dir = temp_dir.path().join("prompts");

        let first =
            cmd_init_prompts(Some(&dir), OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        assert!(first.starts_with("Wrote 2 prompt template(s)"));
        assert!(dir.join("system.md").exists());
        assert!(dir.join("formatter.md").exists());

        let second =
            cmd_init_prompts(Some(&dir), OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        assert!(second.starts_with("All prompt templates already exist"));
    }
}
