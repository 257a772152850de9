//! Tool executor that dispatches tool calls to registered research tools.
//!
//! Maps tool names to [`ResearchTool`] adapters. All calls of one assistant
//! turn run concurrently and results come back in call order.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use super::tool::{ToolCall, ToolDefinition, ToolResult};
use crate::research::ResearchTool;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Executes tool calls by dispatching to registered [`ResearchTool`]s.
#[derive(Clone, Default)]
pub struct ToolExecutor {
    tools: HashMap<&'static str, Arc<dyn ResearchTool>>,
    order: Vec<&'static str>,
}

impl ToolExecutor {
    /// Creates an executor over the given tools. A later tool replaces an
    /// earlier one with the same name.
    #[must_use]
    pub fn new(tools: Vec<Arc<dyn ResearchTool>>) -> Self {
        let mut executor = Self::default();
        for tool in tools {
            executor.register(tool);
        }
        executor
    }

    /// Registers a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn ResearchTool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    /// Definitions of every registered tool, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatches one tool call.
    ///
    /// Unknown tools and oversized arguments produce an error result; the
    /// adapters themselves never fail.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "Error: tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
            };
        }

        let Some(tool) = self.tools.get(call.name.as_str()) else {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!("Error: unknown tool '{}'", call.name),
                is_error: true,
            };
        };

        let content = tool.invoke(&call.arguments).await;
        debug!(
            tool = call.name,
            call_id = call.id,
            bytes = content.len(),
            "tool execution complete"
        );
        ToolResult {
            tool_call_id: call.id.clone(),
            content,
            is_error: false,
        }
    }

    /// Runs every call concurrently and returns one result per call, in
    /// call order.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.order)
            .finish()
    }
}
