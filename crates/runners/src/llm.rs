//! LLM client abstraction shared by the prompt-assembling runners.

use async_trait::async_trait;
use proto::Result;
use serde_json::Value;

/// Semantic role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// System instruction.
    System,
    /// End-user text.
    User,
    /// Model output.
    Assistant,
    /// Tool result fed back to the model.
    Tool,
}

/// One message in the prompt handed to the model
#[derive(Debug, Clone)]
pub struct PromptMessage {
    /// Semantic role of this message.
    pub role: PromptRole,
    /// Text content.
    pub content: String,
    /// Tool call id when this is a tool result.
    pub tool_call_id: Option<String>,
    /// Tool name when this is a tool result.
    pub tool_name: Option<String>,
    /// Tool directives carried by assistant messages.
    pub directives: Option<Vec<ToolDirective>>,
}

impl PromptMessage {
    /// Creates a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            directives: None,
        }
    }

    /// Creates a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            directives: None,
        }
    }

    /// Creates an assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            directives: None,
        }
    }

    /// Creates an assistant-role message carrying tool directives.
    pub fn tool_directives(directives: Vec<ToolDirective>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_name: None,
            directives: Some(directives),
        }
    }

    /// Creates a tool-result message linking a call id, tool name, and output.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: PromptRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            directives: None,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone)]
pub struct ToolDirective {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Structured arguments.
    pub arguments: Value,
}

/// One completion request to the model
#[derive(Debug)]
pub struct CompletionRequest {
    /// Full prompt including system/user/assistant/tool messages.
    pub messages: Vec<PromptMessage>,
    /// Tool schemas the model may call into. Empty disables tool use.
    pub tools: Vec<Value>,
    /// Target model id.
    pub model: String,
}

/// Token usage reported by the model for a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens in the generated output.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Outcome of one completion call
#[derive(Debug)]
pub enum Completion {
    /// Final assistant text.
    Text(String, TokenUsage),
    /// The model requested one or more tool invocations.
    ToolCalls(Vec<ToolDirective>, TokenUsage),
}

/// Provider-agnostic completion client implemented by external services.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one completion request and returns either text or directives.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
