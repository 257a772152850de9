//! Tool type definitions for function-calling.
//!
//! Provider-agnostic tool definitions, calls and results, plus the JSON
//! schemas of the three research tools.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Name of the web search tool.
pub const WEB_SEARCH: &str = "web_search";
/// Name of the web extract tool.
pub const WEB_EXTRACT: &str = "web_extract";
/// Name of the web crawl tool.
pub const WEB_CRAWL: &str = "web_crawl";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a registered adapter in the executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content. Always text, including for failures.
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// Definitions offered to the researcher on every turn, in a fixed order.
///
/// The formatting pass is offered none.
#[must_use]
pub fn research_definitions() -> Vec<ToolDefinition> {
    vec![def_web_search(), def_web_extract(), def_web_crawl()]
}

/// Defines the `web_search` tool.
pub fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: WEB_SEARCH.to_string(),
        description: "Perform a web search. Returns the title, url, and content of up to 10 \
                       results ranked by relevance."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to be sent for the web search."
                },
                "time_range": {
                    "type": "string",
                    "enum": ["day", "week", "month", "year", "d", "w", "m", "y"],
                    "description": "Limits results to content published within this timeframe."
                },
                "include_domains": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only return results from these domains."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `web_extract` tool.
pub fn def_web_extract() -> ToolDefinition {
    ToolDefinition {
        name: WEB_EXTRACT.to_string(),
        description: "Extract content from one or more web pages. Returns the content of each \
                       URL, any images found (if requested), and the URLs that failed."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "urls": {
                    "description": "A single URL or a list of URLs to extract content from.",
                    "anyOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" }, "minItems": 1 }
                    ]
                },
                "include_images": {
                    "type": "boolean",
                    "description": "Whether to also extract image URLs. Defaults to false.",
                    "default": false
                },
                "extract_depth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "description": "Extraction depth. Defaults to 'basic'.",
                    "default": "basic"
                }
            },
            "required": ["urls"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `web_crawl` tool.
pub fn def_web_crawl() -> ToolDefinition {
    ToolDefinition {
        name: WEB_CRAWL.to_string(),
        description: "Crawl a website starting from a URL and return the content of the \
                       nested pages that were discovered."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the website to crawl."
                },
                "instructions": {
                    "type": "string",
                    "description": "Natural-language guidance for the crawler, such as which \
                                    kinds of pages to focus on or avoid."
                }
            },
            "required": ["url"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_definitions_in_order() {
        let names: Vec<String> = research_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![WEB_SEARCH, WEB_EXTRACT, WEB_CRAWL]);
    }

    #[test]
    fn test_all_definitions_have_valid_schemas() {
        for def in research_definitions() {
            assert!(!def.name.is_empty());
            assert!(!def.description.is_empty());
            assert!(def.parameters.is_object());
            assert_eq!(def.parameters["type"], "object");
            assert!(def.parameters["required"].is_array());
        }
    }

    #[test]
    fn test_tool_call_round_trips_through_json() {
        let call = ToolCall {
            id: "call_123".to_string(),
            name: WEB_SEARCH.to_string(),
            arguments: r#"{"query":"rust async"}"#.to_string(),
        };
        let json = serde_json::to_string(&call).unwrap_or_default();
        let back: ToolCall = serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(back, call);
    }
}
