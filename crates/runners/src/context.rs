//! Context runner: single-shot prompt assembly and completion.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch::{RECORD_UNAVAILABLE, Runner};
use proto::{AgentRuntimeDefinition, LlmError, Result, TaskRequest, TaskResponse};
use serde_json::{Value, json};
use tracing::debug;

use crate::llm::{Completion, CompletionRequest, LlmClient, PromptMessage, TokenUsage};

/// Registry type string for the context runner.
pub const CONTEXT_RUNNER_TYPE: &str = "context";

/// Prompt-assembly runner: system prompt from the agent definition, transcript
/// from `payload.history`, one completion call, no tools.
pub struct ContextRunner {
    llm: Arc<dyn LlmClient>,
    fallback_model: String,
}

impl ContextRunner {
    /// Creates a context runner over the given client. `fallback_model` is
    /// used when the agent definition does not pin a model.
    pub fn new(llm: Arc<dyn LlmClient>, fallback_model: impl Into<String>) -> Self {
        Self {
            llm,
            fallback_model: fallback_model.into(),
        }
    }
}

#[async_trait]
impl Runner for ContextRunner {
    async fn execute(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let Some(definition) = definition else {
            return Ok(TaskResponse::failure(request.mode, RECORD_UNAVAILABLE));
        };

        let model = definition
            .model
            .clone()
            .unwrap_or_else(|| self.fallback_model.clone());
        debug!(
            org = %org_slug,
            agent = %definition.agent_slug,
            model = %model,
            "Context completion"
        );

        let completion = self
            .llm
            .complete(CompletionRequest {
                messages: prompt_messages(definition, request),
                tools: Vec::new(),
                model,
            })
            .await?;

        match completion {
            Completion::Text(text, usage) => Ok(TaskResponse::ok(
                request.mode,
                json!({ "message": text }),
            )
            .with_meta_entries(usage_entries(&usage))),
            Completion::ToolCalls(..) => Err(LlmError::InvalidResponse(
                "tool directives from a tool-less completion".to_string(),
            )
            .into()),
        }
    }
}

/// Assembles the prompt: system instruction, transcript, then the live
/// message. History entries are either `{role, content}` objects or plain
/// strings (treated as user turns).
pub(crate) fn prompt_messages(
    definition: &AgentRuntimeDefinition,
    request: &TaskRequest,
) -> Vec<PromptMessage> {
    let mut messages = Vec::new();
    if !definition.system_prompt.is_empty() {
        messages.push(PromptMessage::system(definition.system_prompt.clone()));
    }

    if let Some(history) = request.payload.get("history").and_then(Value::as_array) {
        for entry in history {
            match entry {
                Value::String(text) => messages.push(PromptMessage::user(text.clone())),
                Value::Object(map) => {
                    let content = map
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let role = map.get("role").and_then(Value::as_str).unwrap_or("user");
                    if role == "assistant" || role == "agent" {
                        messages.push(PromptMessage::assistant(content));
                    } else {
                        messages.push(PromptMessage::user(content));
                    }
                }
                _ => {}
            }
        }
    }

    if !request.user_message.is_empty() {
        messages.push(PromptMessage::user(request.user_message.clone()));
    }
    messages
}

/// Token-usage entries attached to runner response metadata.
pub(crate) fn usage_entries(usage: &TokenUsage) -> [(&'static str, Value); 2] {
    [
        ("promptTokens", json!(usage.prompt_tokens)),
        ("completionTokens", json!(usage.completion_tokens)),
    ]
}
