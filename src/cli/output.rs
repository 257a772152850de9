//! Output formatting for CLI commands.

use serde::Serialize;
use std::fmt::Write as _;

use crate::agent::{ChatMessage, ConversationState, ResearchEvent};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One compact JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for anything unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavour.
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        let mut out = rendered.unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#));
        out.push('\n');
        out
    }
}

/// Renders a stored thread.
pub fn format_history(thread_id: &str, state: &ConversationState, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if state.messages.is_empty() {
                return format!("Thread '{thread_id}' has no messages.\n");
            }
            let mut out = format!(
                "Thread: {thread_id} ({} messages, research complete: {})\n",
                state.messages.len(),
                state.is_research_complete
            );
            for (index, message) in state.messages.iter().enumerate() {
                out.push('\n');
                write_message(&mut out, index, message);
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(&serde_json::json!({
            "thread_id": thread_id,
            "is_research_complete": state.is_research_complete,
            "research_content": state.research_content,
            "messages": state.messages,
        })),
    }
}

fn write_message(out: &mut String, index: usize, message: &ChatMessage) {
    let _ = write!(out, "[{index}] {}", message.role);
    if let Some(call_id) = &message.tool_call_id {
        let _ = write!(out, " ({call_id})");
    }
    out.push('\n');
    if !message.content.is_empty() {
        let _ = writeln!(out, "{}", message.content);
    }
    for call in &message.tool_calls {
        let _ = writeln!(out, "  -> {} [{}] {}", call.name, call.id, call.arguments);
    }
}

/// Renders the list of thread identifiers.
pub fn format_threads(threads: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if threads.is_empty() {
                return "No threads stored.\n".to_string();
            }
            let mut out = String::new();
            for id in threads {
                let _ = writeln!(out, "{id}");
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            format.to_json(&serde_json::json!({ "threads": threads }))
        }
    }
}

/// One progress line for `ask --stream`.
pub fn format_event(event: &ResearchEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => OutputFormat::Ndjson.to_json(event),
        OutputFormat::Text => match event {
            ResearchEvent::PhaseChanged { phase } => format!("[phase] {phase}\n"),
            ResearchEvent::ModelResponded {
                iteration,
                tool_calls,
                ..
            } => {
                if tool_calls.is_empty() {
                    format!("[turn {iteration}] model responded\n")
                } else {
                    format!("[turn {iteration}] tools: {}\n", tool_calls.join(", "))
                }
            }
            ResearchEvent::ToolsExecuted { results } => {
                let mut out = String::new();
                for result in results {
                    let _ = writeln!(
                        out,
                        "[tool] {} ({} chars)",
                        result.tool_call_id,
                        result.content.chars().count()
                    );
                }
                out
            }
            ResearchEvent::FinalAnswer { content } => {
                format!("[done] answer ready ({} chars)\n", content.chars().count())
            }
        },
    }
}
