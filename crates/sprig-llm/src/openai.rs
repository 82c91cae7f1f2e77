//! OpenAI-compatible chat completions backend.
//!
//! Works against OpenAI itself or any service exposing the same
//! `/chat/completions` contract with function calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{LlmBackend, with_retry};
use crate::error::{LlmError, Result, parse_retry_after_header};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BACKEND_NAME: &str = "openai";

/// Connection settings for [`OpenAiBackend`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Without a trailing slash.
    pub base_url: String,
    /// Used when a request leaves its model empty.
    pub model: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl OpenAiConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: None,
            timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let model = if request.model.is_empty() {
            self.config.model.clone().unwrap_or_default()
        } else {
            request.model.clone()
        };

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage::plain("system", system.clone()));
        }
        for message in &request.messages {
            append_message(&mut messages, message);
        }

        let tools = request
            .tools
            .iter()
            .map(|tool| ChatTool {
                kind: "function",
                function: ChatFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect();

        ChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            tools,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&response.text().await?)?;
        parsed.into_completion()
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.chat_request(&request);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            BACKEND_NAME,
            || self.send(&body),
        )
        .await
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}

/// Flatten one message into chat turns.
///
/// Each tool result becomes its own `tool` turn; an assistant message with
/// tool calls keeps its text alongside the calls.
fn append_message(out: &mut Vec<ChatMessage>, message: &Message) {
    let mut text = String::new();
    let mut calls = Vec::new();

    for block in &message.content {
        match block {
            ContentBlock::Text(t) => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => calls.push(ChatToolCall {
                id: id.clone(),
                kind: "function".to_string(),
                function: ChatFunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::ToolResult(result) => out.push(ChatMessage {
                role: "tool",
                content: Some(result.content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.tool_use_id.clone()),
            }),
        }
    }

    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    if !calls.is_empty() {
        out.push(ChatMessage {
            role,
            content: (!text.is_empty()).then_some(text),
            tool_calls: calls,
            tool_call_id: None,
        });
    } else if !text.is_empty() {
        out.push(ChatMessage::plain(role, text));
    }
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

    match status.as_u16() {
        401 | 403 => LlmError::Auth(message),
        429 => LlmError::RateLimit {
            message,
            retry_after,
        },
        500..=599 => LlmError::Network(format!("Server error: {}", message)),
        _ => LlmError::Backend(message),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

impl ChatResponse {
    fn into_completion(self) -> Result<CompletionResponse> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Backend("completion returned no choices".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text(text));
        }
        for call in choice.message.tool_calls {
            // Unparseable arguments reach the tool as `{}` and fail its own validation.
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| Value::Object(Default::default()));
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse {
            model: self.model,
            content,
            stop_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolDefinition, ToolResultBlock};
    use serde_json::json;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(
            OpenAiConfig::openai("sk-test")
                .with_base_url("http://localhost:9999/v1/")
                .with_model("gpt-4o-mini"),
        )
        .unwrap()
    }

    fn parse(body: &str) -> Result<CompletionResponse> {
        serde_json::from_str::<ChatResponse>(body)
            .unwrap()
            .into_completion()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(backend().endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_text_reply() {
        let response = parse(
            r#"{"model": "gpt-4o-mini",
                "choices": [{"message": {"content": "{\"domain\":\"Food\"}"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();

        assert_eq!(response.text(), "{\"domain\":\"Food\"}");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert!(response.tool_calls().is_empty());
    }

    #[test]
    fn test_tool_call_reply() {
        let response = parse(
            r#"{"choices": [{
                "message": {"content": null, "tool_calls": [
                    {"id": "call_9", "type": "function",
                     "function": {"name": "mark_detail_processed", "arguments": "{\"detail_id\":\"d1\"}"}},
                    {"id": "call_10", "type": "function",
                     "function": {"name": "list_pending_details", "arguments": "not json"}}
                ]},
                "finish_reason": "tool_calls"}]}"#,
        )
        .unwrap();

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        let calls = response.tool_calls();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].input["detail_id"], "d1");
        assert_eq!(calls[1].input, &json!({}));
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        assert!(matches!(
            parse(r#"{"model": "m", "choices": []}"#),
            Err(LlmError::Backend(_))
        ));
    }

    #[test]
    fn test_chat_request_flattens_tool_turns() {
        let request = CompletionRequest::new(
            "",
            vec![
                Message::user("consolidate"),
                Message::assistant(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "list_pending_details".to_string(),
                    input: json!({"limit": 5}),
                }]),
                Message::tool_results(vec![
                    ToolResultBlock::success("call_1", "[]"),
                    ToolResultBlock::error("call_2", "unknown tool"),
                ]),
            ],
            512,
        )
        .with_system("You consolidate memories.")
        .with_tools(vec![ToolDefinition::new(
            "list_pending_details",
            "List details awaiting insight processing",
            json!({"type": "object"}),
        )]);

        let body = backend().chat_request(&request);
        assert_eq!(body.model, "gpt-4o-mini");
        let roles: Vec<&str> = body.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool", "tool"]);
        assert!(body.messages[2].content.is_none());
        assert_eq!(body.messages[2].tool_calls[0].function.arguments, r#"{"limit":5}"#);
        assert_eq!(body.messages[4].tool_call_id.as_deref(), Some("call_2"));

        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["tools"][0]["type"], "function");
        assert!(wire["messages"][1].get("tool_calls").is_none());
    }

    #[test]
    fn test_status_error_mapping() {
        let body = r#"{"error": {"message": "Incorrect API key"}}"#;
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, body),
            LlmError::Auth(m) if m == "Incorrect API key"
        ));

        let limited = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            "slow down",
        );
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));

        assert!(status_error(StatusCode::BAD_GATEWAY, None, "").is_retryable());
        assert!(!status_error(StatusCode::BAD_REQUEST, None, "bad").is_retryable());
    }
}
