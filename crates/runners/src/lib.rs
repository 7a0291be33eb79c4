//! Built-in execution runners, one per agent type.
//!
//! Construction is two-phase: runners are registered into a mutable
//! [`RunnerRegistry`] first, then the shared registry and the resume flow
//! (which wraps the gateway, built later) are bound onto the handles this
//! crate returns.

use std::sync::Arc;

use dispatch::{API_RUNNER_TYPE, ApprovalStore, RunnerRegistry};
use serde::Deserialize;

pub mod api;
pub mod context;
pub mod delegate;
pub mod llm;
pub mod orchestrator;
pub mod toolcall;

/// Re-export of the api runner.
pub use api::ApiRunner;
/// Re-export of the context runner.
pub use context::{CONTEXT_RUNNER_TYPE, ContextRunner};
/// Re-export of the delegate runner and its collaborator trait.
pub use delegate::{DELEGATE_RUNNER_TYPE, DelegateRunner, ExternalDelegate};
/// Re-export of the LLM client abstraction.
pub use llm::{
    Completion, CompletionRequest, LlmClient, PromptMessage, PromptRole, TokenUsage,
    ToolDirective,
};
/// Re-export of the orchestrator runner.
pub use orchestrator::{ORCHESTRATOR_RUNNER_TYPE, OrchestratorRunner};
/// Re-export of the tool-call runner and its collaborator trait.
pub use toolcall::{TOOLCALL_RUNNER_TYPE, ToolCallRunner, ToolExecutor};

/// Model used when neither the agent definition nor the settings pin one.
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";
/// Default bound on completion/tool rounds in the tool-call runner.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Tunables shared by the built-in runners.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Model used when the agent definition does not pin one.
    pub fallback_model: String,
    /// Bound on completion/tool rounds in the tool-call runner.
    pub max_tool_rounds: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// Handles to the runners that need late binding after registration.
pub struct BuiltinRunners {
    /// The api runner; bind the resume flow once the gateway exists.
    pub api: Arc<ApiRunner>,
    /// The orchestrator; bind the shared registry once it is frozen.
    pub orchestrator: Arc<OrchestratorRunner>,
}

/// Registers the full built-in runner set and returns the late-binding
/// handles. The caller freezes the registry into an `Arc` afterwards and
/// calls [`OrchestratorRunner::bind_registry`] and [`ApiRunner::bind_resume`].
pub fn register_builtin_runners(
    registry: &mut RunnerRegistry,
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolExecutor>,
    delegate: Arc<dyn ExternalDelegate>,
    approvals: Arc<dyn ApprovalStore>,
    settings: &RunnerSettings,
) -> BuiltinRunners {
    let api = Arc::new(ApiRunner::new(approvals));
    let orchestrator = Arc::new(OrchestratorRunner::new());

    registry.register(
        CONTEXT_RUNNER_TYPE,
        Arc::new(ContextRunner::new(
            llm.clone(),
            settings.fallback_model.clone(),
        )),
    );
    registry.register(
        TOOLCALL_RUNNER_TYPE,
        Arc::new(ToolCallRunner::new(
            llm,
            tools,
            settings.fallback_model.clone(),
            settings.max_tool_rounds,
        )),
    );
    registry.register(DELEGATE_RUNNER_TYPE, Arc::new(DelegateRunner::new(delegate)));
    registry.register(ORCHESTRATOR_RUNNER_TYPE, orchestrator.clone());
    registry.register(API_RUNNER_TYPE, api.clone());

    BuiltinRunners { api, orchestrator }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use proto::{ApprovalRecord, ApprovalStatus, RecordId, Result};
    use serde_json::Value;

    use super::*;
    use crate::llm::Completion;

    struct NullClient;

    #[async_trait]
    impl LlmClient for NullClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            Ok(Completion::Text(String::new(), TokenUsage::default()))
        }
    }

    struct NullTools;

    #[async_trait]
    impl ToolExecutor for NullTools {
        fn schemas(&self) -> Vec<Value> {
            Vec::new()
        }

        async fn run_tool(
            &self,
            _name: &str,
            _arguments: &Value,
            _org_slug: &str,
        ) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    struct NullDelegate;

    #[async_trait]
    impl ExternalDelegate for NullDelegate {
        async fn deliver(
            &self,
            _definition: &proto::AgentRuntimeDefinition,
            _request: &proto::TaskRequest,
            _org_slug: &str,
        ) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    struct NullStore;

    #[async_trait]
    impl ApprovalStore for NullStore {
        async fn get(&self, _id: &str) -> Result<Option<ApprovalRecord>> {
            Ok(None)
        }

        async fn create(&self, _record: ApprovalRecord) -> Result<()> {
            Ok(())
        }

        async fn set_status(
            &self,
            _id: &str,
            _status: ApprovalStatus,
            _acting_user: &RecordId,
        ) -> Result<()> {
            Ok(())
        }

        async fn list_pending(&self, _org_slug: &str) -> Result<Vec<ApprovalRecord>> {
            Ok(Vec::new())
        }

        async fn list_for_conversation(
            &self,
            _conversation_id: &RecordId,
        ) -> Result<Vec<ApprovalRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn registers_the_full_builtin_set() {
        let mut registry = RunnerRegistry::new();
        let handles = register_builtin_runners(
            &mut registry,
            Arc::new(NullClient),
            Arc::new(NullTools),
            Arc::new(NullDelegate),
            Arc::new(NullStore),
            &RunnerSettings::default(),
        );

        assert_eq!(
            registry.runner_types(),
            vec![
                API_RUNNER_TYPE,
                CONTEXT_RUNNER_TYPE,
                DELEGATE_RUNNER_TYPE,
                ORCHESTRATOR_RUNNER_TYPE,
                TOOLCALL_RUNNER_TYPE,
            ]
        );

        let registry = Arc::new(registry);
        handles.orchestrator.bind_registry(registry.clone());
        assert!(registry.has(API_RUNNER_TYPE));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: RunnerSettings = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(settings.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert_eq!(settings.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
    }
}
