//! `OpenAI`-compatible chat completions via `async-openai`.
//!
//! The base URL override in [`AgentConfig`] points the client at Azure,
//! local proxies or any other endpoint speaking the same protocol.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatChoice, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CompletionUsage, CreateChatCompletionRequest, FinishReason,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// Chat completions against an `OpenAI`-compatible endpoint.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a provider from agent configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let mut sdk_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = config.base_url.as_deref() {
            sdk_config = sdk_config.with_api_base(base_url);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Orchestration {
                message: format!("failed to build model HTTP client: {e}"),
            })?;

        Ok(Self {
            client: Client::with_config(sdk_config).with_http_client(http),
        })
    }
}

fn sdk_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

/// Maps a stored message onto the wire type.
///
/// Assistant turns that only requested tools go out without content; an
/// assistant turn with neither keeps an empty string so the endpoint
/// accepts it.
fn sdk_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(text),
            name: None,
        }),
        Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }),
        Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
            content: ChatCompletionRequestToolMessageContent::Text(text),
            tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
        }),
        Role::Assistant => {
            let has_calls = !msg.tool_calls.is_empty();
            let content = (!text.is_empty() || !has_calls)
                .then(|| ChatCompletionRequestAssistantMessageContent::Text(text));
            let tool_calls =
                has_calls.then(|| msg.tool_calls.iter().map(sdk_tool_call).collect());

            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content,
                name: None,
                tool_calls,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}

fn sdk_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()),
            parameters: Some(def.parameters.clone()),
            strict: None,
        },
    }
}

fn sdk_request(request: &ChatRequest) -> CreateChatCompletionRequest {
    let tools: Vec<ChatCompletionTool> = request.tools.iter().map(sdk_tool).collect();
    let has_tools = !tools.is_empty();
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(sdk_message).collect(),
        temperature: request.temperature,
        max_completion_tokens: request.max_tokens,
        parallel_tool_calls: has_tools.then_some(true),
        tools: has_tools.then_some(tools),
        ..Default::default()
    }
}

const fn finish_reason_name(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
        FinishReason::FunctionCall => "function_call",
    }
}

fn usage_from(usage: Option<&CompletionUsage>) -> TokenUsage {
    usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    })
}

/// Only the first choice is used; a response without one reads as empty.
fn response_from(choice: Option<ChatChoice>, usage: TokenUsage) -> ChatResponse {
    let Some(choice) = choice else {
        return ChatResponse {
            content: String::new(),
            usage,
            tool_calls: Vec::new(),
            finish_reason: None,
        };
    };
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();
    ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .map(|reason| finish_reason_name(reason).to_string()),
    }
}

fn request_error(error: &OpenAIError) -> AgentError {
    let status = match error {
        OpenAIError::Reqwest(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    };
    AgentError::ApiRequest {
        message: error.to_string(),
        status,
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completion request"
        );

        let response = self
            .client
            .chat()
            .create(sdk_request(request))
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion failed");
                request_error(&e)
            })?;

        let usage = usage_from(response.usage.as_ref());
        Ok(response_from(response.choices.into_iter().next(), usage))
    }
}
