//! Orchestrator runner: executes plan steps through other runners.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use dispatch::{RECORD_UNAVAILABLE, Runner, RunnerRegistry};
use proto::{AgentRuntimeDefinition, DispatchError, Result, TaskRequest, TaskResponse};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Registry type string for the orchestrator runner.
pub const ORCHESTRATOR_RUNNER_TYPE: &str = "orchestrator";

/// Composite runner: walks `payload.plan.steps` sequentially, dispatching
/// each step to the runner named by its `agentType` and aggregating outputs.
/// A failing step short-circuits the plan.
///
/// The registry handle is late-bound: the orchestrator is registered while
/// the registry is still being built, so the shared `Arc` only exists
/// afterwards.
pub struct OrchestratorRunner {
    registry: OnceLock<Arc<RunnerRegistry>>,
}

impl OrchestratorRunner {
    /// Creates an unbound orchestrator; call [`bind_registry`] before use.
    ///
    /// [`bind_registry`]: OrchestratorRunner::bind_registry
    pub fn new() -> Self {
        Self {
            registry: OnceLock::new(),
        }
    }

    /// Binds the shared registry. Later calls are ignored.
    pub fn bind_registry(&self, registry: Arc<RunnerRegistry>) {
        let _ = self.registry.set(registry);
    }

    fn registry(&self) -> Result<&Arc<RunnerRegistry>> {
        self.registry
            .get()
            .ok_or_else(|| DispatchError::NotWired("orchestrator registry".to_string()).into())
    }
}

impl Default for OrchestratorRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for OrchestratorRunner {
    async fn execute(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let Some(definition) = definition else {
            return Ok(TaskResponse::failure(request.mode, RECORD_UNAVAILABLE));
        };
        let registry = self.registry()?;

        let steps = match request
            .payload
            .get("plan")
            .and_then(|plan| plan.get("steps"))
            .and_then(Value::as_array)
        {
            Some(steps) if !steps.is_empty() => steps,
            _ => {
                return Ok(TaskResponse::failure(
                    request.mode,
                    "Plan has no executable steps",
                ));
            }
        };

        info!(
            org = %org_slug,
            agent = %definition.agent_slug,
            steps = steps.len(),
            "Orchestrating plan"
        );

        let mut outputs = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let Some(agent_type) = step.get("agentType").and_then(Value::as_str) else {
                return Ok(TaskResponse::failure(
                    request.mode,
                    format!("Plan step {index} is missing an agentType"),
                ));
            };
            if agent_type == ORCHESTRATOR_RUNNER_TYPE {
                return Ok(TaskResponse::failure(
                    request.mode,
                    format!("Plan step {index} nests an orchestrator"),
                ));
            }
            let runner = registry
                .get(agent_type)
                .ok_or_else(|| DispatchError::RunnerMissing(agent_type.to_string()))?;

            let step_request = step_request(request, step);
            debug!(step = index, runner = %agent_type, "Dispatching plan step");
            let step_response = runner
                .execute(Some(definition), &step_request, org_slug)
                .await?;

            if !step_response.success {
                return Ok(step_response.with_meta_entries([("failedStep", json!(index))]));
            }
            outputs.push(step_response.payload.content);
        }

        Ok(TaskResponse::ok(request.mode, json!({ "steps": outputs })))
    }
}

/// Builds the sub-request for one plan step: the step's message becomes the
/// user message and the plan itself is stripped so step runners never see it.
fn step_request(request: &TaskRequest, step: &Value) -> TaskRequest {
    let mut sub = request.clone();
    sub.user_message = step
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Value::Object(payload) = &mut sub.payload {
        payload.remove("plan");
        if let Some(input) = step.get("input") {
            payload.insert("input".to_string(), input.clone());
        }
    }
    sub
}
