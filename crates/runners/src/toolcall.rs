//! Tool-call runner: bounded completion/tool loop.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch::{RECORD_UNAVAILABLE, Runner};
use proto::{AgentRuntimeDefinition, LlmError, Result, TaskRequest, TaskResponse};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::context::{prompt_messages, usage_entries};
use crate::llm::{Completion, CompletionRequest, LlmClient, PromptMessage, TokenUsage};

/// Registry type string for the tool-call runner.
pub const TOOLCALL_RUNNER_TYPE: &str = "toolcall";

/// Tool invocation backend consumed by the tool-call runner.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool schemas advertised to the model.
    fn schemas(&self) -> Vec<Value>;

    /// Runs one tool invocation and returns its structured output.
    async fn run_tool(&self, name: &str, arguments: &Value, org_slug: &str) -> Result<Value>;
}

/// Bounded tool loop: the model may answer with tool directives, whose
/// results are fed back until it produces text or the round limit trips.
pub struct ToolCallRunner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolExecutor>,
    fallback_model: String,
    max_rounds: usize,
}

impl ToolCallRunner {
    /// Creates a tool-call runner with the given round limit.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolExecutor>,
        fallback_model: impl Into<String>,
        max_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            fallback_model: fallback_model.into(),
            max_rounds,
        }
    }
}

#[async_trait]
impl Runner for ToolCallRunner {
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
        let schemas = self.tools.schemas();
        let mut messages = prompt_messages(definition, request);
        let mut total_usage = TokenUsage::default();

        for round in 0..self.max_rounds {
            let completion = self
                .llm
                .complete(CompletionRequest {
                    messages: messages.clone(),
                    tools: schemas.clone(),
                    model: model.clone(),
                })
                .await?;

            match completion {
                Completion::Text(text, usage) => {
                    total_usage.add(&usage);
                    return Ok(TaskResponse::ok(request.mode, json!({ "message": text }))
                        .with_meta_entries(usage_entries(&total_usage)));
                }
                Completion::ToolCalls(directives, usage) => {
                    total_usage.add(&usage);
                    debug!(
                        agent = %definition.agent_slug,
                        round,
                        count = directives.len(),
                        "Executing tool directives"
                    );
                    messages.push(PromptMessage::tool_directives(directives.clone()));
                    for directive in directives {
                        let content = match self
                            .tools
                            .run_tool(&directive.name, &directive.arguments, org_slug)
                            .await
                        {
                            Ok(output) => output.to_string(),
                            Err(err) => {
                                warn!(tool = %directive.name, "Tool failed: {err}");
                                json!({ "error": err.to_string() }).to_string()
                            }
                        };
                        messages.push(PromptMessage::tool_result(
                            directive.id,
                            directive.name,
                            content,
                        ));
                    }
                }
            }
        }

        Err(LlmError::MaxToolRounds.into())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use proto::{Error, ExecutionContext, ExecutionFlags, TaskMode};

    use super::*;
    use crate::llm::ToolDirective;

    struct ScriptedClient {
        completions: Mutex<VecDeque<Completion>>,
    }

    impl ScriptedClient {
        fn new(completions: Vec<Completion>) -> Self {
            Self {
                completions: Mutex::new(completions.into()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            Ok(self
                .completions
                .lock()
                .expect("completions lock")
                .pop_front()
                .expect("completion scripted"))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ToolExecutor for RecordingExecutor {
        fn schemas(&self) -> Vec<Value> {
            vec![json!({ "name": "search" })]
        }

        async fn run_tool(&self, name: &str, arguments: &Value, _org_slug: &str) -> Result<Value> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((name.to_string(), arguments.clone()));
            Ok(json!({ "rows": 3 }))
        }
    }

    fn definition() -> AgentRuntimeDefinition {
        AgentRuntimeDefinition {
            agent_slug: "ops-agent".to_string(),
            org_slug: "acme".to_string(),
            agent_type: TOOLCALL_RUNNER_TYPE.to_string(),
            execution: ExecutionFlags::default(),
            system_prompt: "You operate tools.".to_string(),
            provider: None,
            model: Some("llama3".to_string()),
            require_local_model: false,
            metadata: serde_json::Map::new(),
        }
    }

    fn request() -> TaskRequest {
        TaskRequest::new(
            TaskMode::Build,
            ExecutionContext::new("acme", "ops-agent"),
            "count the rows",
        )
    }

    fn directive() -> ToolDirective {
        ToolDirective {
            id: "call-1".to_string(),
            name: "search".to_string(),
            arguments: json!({ "query": "rows" }),
        }
    }

    fn usage() -> TokenUsage {
        TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        }
    }

    #[tokio::test]
    async fn loops_through_tool_calls_to_a_text_answer() {
        let client = Arc::new(ScriptedClient::new(vec![
            Completion::ToolCalls(vec![directive()], usage()),
            Completion::Text("3 rows found.".to_string(), usage()),
        ]));
        let tools = Arc::new(RecordingExecutor::default());
        let runner = ToolCallRunner::new(client, tools.clone(), "default-model", 4);

        let resp = runner
            .execute(Some(&definition()), &request(), "acme")
            .await
            .expect("execute");

        assert!(resp.success);
        assert_eq!(resp.payload.content["message"], "3 rows found.");
        // Usage accumulates across both rounds.
        assert_eq!(resp.payload.metadata["promptTokens"], 20);

        let calls = tools.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "search");
        assert_eq!(calls[0].1["query"], "rows");
    }

    #[tokio::test]
    async fn round_limit_raises_max_tool_rounds() {
        let client = Arc::new(ScriptedClient::new(vec![
            Completion::ToolCalls(vec![directive()], usage()),
            Completion::ToolCalls(vec![directive()], usage()),
        ]));
        let runner = ToolCallRunner::new(
            client,
            Arc::new(RecordingExecutor::default()),
            "default-model",
            2,
        );

        let err = runner
            .execute(Some(&definition()), &request(), "acme")
            .await
            .expect_err("should exhaust rounds");
        match err {
            Error::Llm(LlmError::MaxToolRounds) => {}
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn direct_text_answer_skips_tools() {
        let client = Arc::new(ScriptedClient::new(vec![Completion::Text(
            "No tools needed.".to_string(),
            usage(),
        )]));
        let tools = Arc::new(RecordingExecutor::default());
        let runner = ToolCallRunner::new(client, tools.clone(), "default-model", 4);

        let resp = runner
            .execute(Some(&definition()), &request(), "acme")
            .await
            .expect("execute");
        assert!(resp.success);
        assert!(tools.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn missing_definition_is_a_structured_failure() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let runner = ToolCallRunner::new(
            client,
            Arc::new(RecordingExecutor::default()),
            "default-model",
            4,
        );

        let resp = runner
            .execute(None, &request(), "acme")
            .await
            .expect("execute");
        assert!(!resp.success);
        assert_eq!(resp.reason(), Some(RECORD_UNAVAILABLE));
    }
}
