//! The reasoner: a bounded tool-calling loop over an LLM backend.

use async_trait::async_trait;
use sprig_llm::{CompletionRequest, Message, SharedBackend, StopReason, ToolResultBlock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tool::CommandHandler;

/// Text returned when the loop hits its iteration bound.
pub const TRUNCATED_RESPONSE: &str = "[Response truncated: max iterations exceeded]";

/// Something that can drive memory tools from a prompt.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run to completion, executing tool calls through `handler`.
    async fn run(&self, prompt: &str, handler: &dyn CommandHandler) -> Result<String>;

    /// A single tool-less exchange.
    async fn ask(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Configuration for [`ToolLoopReasoner`].
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub system_prompt: Option<String>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            max_iterations: 12,
            system_prompt: None,
        }
    }
}

/// Reasoner backed by an [`LlmBackend`](sprig_llm::LlmBackend) with native tool calls.
pub struct ToolLoopReasoner {
    backend: SharedBackend,
    config: ReasonerConfig,
}

impl ToolLoopReasoner {
    pub fn new(backend: SharedBackend, config: ReasonerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    fn request(&self, messages: &[Message]) -> CompletionRequest {
        let request =
            CompletionRequest::new(&self.config.model, messages.to_vec(), self.config.max_tokens);
        match &self.config.system_prompt {
            Some(system) => request.with_system(system),
            None => request,
        }
    }
}

#[async_trait]
impl Reasoner for ToolLoopReasoner {
    async fn run(&self, prompt: &str, handler: &dyn CommandHandler) -> Result<String> {
        let tools = handler.definitions();
        let mut messages = vec![Message::user(prompt)];
        let mut iterations = 0u32;

        loop {
            iterations += 1;
            if iterations > self.config.max_iterations {
                warn!(
                    iterations,
                    max_iterations = self.config.max_iterations,
                    "Max iterations exceeded"
                );
                return Ok(TRUNCATED_RESPONSE.to_string());
            }

            let request = self.request(&messages).with_tools(tools.clone());
            debug!(
                iteration = iterations,
                messages = messages.len(),
                tools = tools.len(),
                model = %request.model,
                "Calling LLM"
            );
            let response = self.backend.complete(request).await?;

            let calls = response.tool_calls();
            if calls.is_empty() {
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(max_tokens = self.config.max_tokens, "Response cut at token limit");
                }
                let text = response.text();
                info!(iterations, response_len = text.len(), "Reasoner finished");
                return Ok(text);
            }

            let mut results = Vec::new();
            for call in calls {
                let result = handler.handle(call.name, call.input.clone()).await;
                debug!(tool = %call.name, is_error = result.is_error(), "Tool executed");
                results.push(if result.is_error() {
                    ToolResultBlock::error(call.id, result.to_text())
                } else {
                    ToolResultBlock::success(call.id, result.to_text())
                });
            }

            messages.push(Message::assistant(response.content.clone()));
            messages.push(Message::tool_results(results));
        }
    }

    async fn ask(&self, system: &str, prompt: &str) -> Result<String> {
        let request = self
            .request(&[Message::user(prompt)])
            .with_system(system);
        let response = self.backend.complete(request).await?;
        Ok(response.text())
    }
}
