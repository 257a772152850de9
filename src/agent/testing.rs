//! Scripted collaborators shared by the loop and orchestrator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::tool::{ToolCall, ToolDefinition, def_web_search};
use crate::error::{AgentError, ResearchApiError};
use crate::research::{
    CrawlPage, CrawlRequest, ExtractRequest, ExtractResponse, ResearchApi, ResearchTool,
    SearchRequest, SearchResponse,
};

/// Provider that replays a fixed script and records every request.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ChatResponse, AgentError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::Orchestration {
                    message: "script exhausted".to_string(),
                })
            })
    }
}

/// A plain text reply.
pub fn text(content: &str) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    })
}

/// A reply requesting tools; each entry is `(call id, tool name)`.
pub fn tools(content: &str, calls: &[(&str, &str)]) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        tool_calls: calls
            .iter()
            .map(|(id, name)| ToolCall {
                id: (*id).to_string(),
                name: (*name).to_string(),
                arguments: r#"{"query":"q"}"#.to_string(),
            })
            .collect(),
        finish_reason: Some("tool_calls".to_string()),
    })
}

/// Tool that counts invocations and returns a fixed string.
pub struct CountingTool {
    name: &'static str,
    output: String,
    invocations: AtomicUsize,
}

impl CountingTool {
    pub fn new(name: &'static str, output: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: output.to_string(),
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchTool for CountingTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            ..def_web_search()
        }
    }

    async fn invoke(&self, _arguments: &str) -> String {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.output.clone()
    }
}

/// Research backend whose every request fails with a gateway error.
pub struct FailingApi {
    calls: AtomicUsize,
}

impl FailingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> ResearchApiError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ResearchApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }
    }
}

#[async_trait]
impl ResearchApi for FailingApi {
    async fn search(&self, _request: &SearchRequest) -> Result<SearchResponse, ResearchApiError> {
        Err(self.fail())
    }

    async fn extract(
        &self,
        _request: &ExtractRequest,
    ) -> Result<ExtractResponse, ResearchApiError> {
        Err(self.fail())
    }

    async fn crawl(&self, _request: &CrawlRequest) -> Result<Vec<CrawlPage>, ResearchApiError> {
        Err(self.fail())
    }
}

/// Provider that holds every call open for `delay` and records how many
/// calls were in flight at once. Replies come from a shared script.
pub struct PacedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PacedProvider {
    pub fn new(script: Vec<Result<ChatResponse, AgentError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Highest number of overlapping `chat` calls seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for PacedProvider {
    fn name(&self) -> &'static str {
        "paced"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::Orchestration {
                    message: "script exhausted".to_string(),
                })
            })
    }
}
