//! Delegate runner: hands the task to an external execution surface.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch::{RECORD_UNAVAILABLE, Runner};
use proto::{AgentRuntimeDefinition, Result, TaskRequest, TaskResponse};
use serde_json::Value;
use tracing::debug;

/// Registry type string for the delegate runner.
pub const DELEGATE_RUNNER_TYPE: &str = "delegate";

/// External system that executes delegated tasks (webhook target, partner
/// API, workflow engine).
#[async_trait]
pub trait ExternalDelegate: Send + Sync {
    /// Delivers the task and returns the delegate's structured payload.
    async fn deliver(
        &self,
        definition: &AgentRuntimeDefinition,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<Value>;
}

/// Forwards the task to an [`ExternalDelegate`] and wraps its payload.
pub struct DelegateRunner {
    delegate: Arc<dyn ExternalDelegate>,
}

impl DelegateRunner {
    /// Creates a delegate runner over the given delivery backend.
    pub fn new(delegate: Arc<dyn ExternalDelegate>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl Runner for DelegateRunner {
    async fn execute(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let Some(definition) = definition else {
            return Ok(TaskResponse::failure(request.mode, RECORD_UNAVAILABLE));
        };

        debug!(
            org = %org_slug,
            agent = %definition.agent_slug,
            "Delegating task"
        );
        let payload = self.delegate.deliver(definition, request, org_slug).await?;
        Ok(TaskResponse::ok(request.mode, payload))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use proto::{DispatchError, Error, ExecutionContext, ExecutionFlags, TaskMode};
    use serde_json::json;

    use super::*;

    struct ScriptedDelegate {
        outcome: Mutex<Option<Result<Value>>>,
    }

    #[async_trait]
    impl ExternalDelegate for ScriptedDelegate {
        async fn deliver(
            &self,
            _definition: &AgentRuntimeDefinition,
            _request: &TaskRequest,
            _org_slug: &str,
        ) -> Result<Value> {
            self.outcome
                .lock()
                .expect("outcome lock")
                .take()
                .expect("one delivery scripted")
        }
    }

    fn definition() -> AgentRuntimeDefinition {
        AgentRuntimeDefinition {
            agent_slug: "partner-agent".to_string(),
            org_slug: "acme".to_string(),
            agent_type: DELEGATE_RUNNER_TYPE.to_string(),
            execution: ExecutionFlags::default(),
            system_prompt: String::new(),
            provider: None,
            model: None,
            require_local_model: false,
            metadata: serde_json::Map::new(),
        }
    }

    fn request() -> TaskRequest {
        TaskRequest::new(
            TaskMode::Build,
            ExecutionContext::new("acme", "partner-agent"),
            "ship it",
        )
    }

    #[tokio::test]
    async fn wraps_delegate_payload_in_a_success_response() {
        let delegate = Arc::new(ScriptedDelegate {
            outcome: Mutex::new(Some(Ok(json!({ "ticket": "T-42" })))),
        });
        let runner = DelegateRunner::new(delegate);

        let resp = runner
            .execute(Some(&definition()), &request(), "acme")
            .await
            .expect("execute");
        assert!(resp.success);
        assert_eq!(resp.payload.content["ticket"], "T-42");
    }

    #[tokio::test]
    async fn delivery_errors_propagate() {
        let delegate = Arc::new(ScriptedDelegate {
            outcome: Mutex::new(Some(Err(DispatchError::Delegate(
                "endpoint unreachable".to_string(),
            )
            .into()))),
        });
        let runner = DelegateRunner::new(delegate);

        let err = runner
            .execute(Some(&definition()), &request(), "acme")
            .await
            .expect_err("delivery failure should propagate");
        match err {
            Error::Dispatch(DispatchError::Delegate(msg)) => {
                assert_eq!(msg, "endpoint unreachable")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_definition_is_a_structured_failure() {
        let delegate = Arc::new(ScriptedDelegate {
            outcome: Mutex::new(None),
        });
        let runner = DelegateRunner::new(delegate);

        let resp = runner
            .execute(None, &request(), "acme")
            .await
            .expect("execute");
        assert!(!resp.success);
        assert_eq!(resp.reason(), Some(RECORD_UNAVAILABLE));
    }
}
