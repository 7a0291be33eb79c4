//! Routing policy gate: summarizes a request and asks the external decision
//! service whether it may proceed.

use std::sync::Arc;

use proto::{AgentRecord, Result, RoutingAssessment, TaskRequest};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::DispatchConfig;
use crate::traits::RoutingDecider;

/// Adapter over the external routing decision service.
///
/// Evaluated on every dispatch, including resumed ones; an earlier approval
/// never disables the gate for future requests.
pub struct RoutingPolicyGate {
    decider: Arc<dyn RoutingDecider>,
    config: Arc<DispatchConfig>,
}

impl RoutingPolicyGate {
    /// Creates a gate backed by the given decision service.
    pub fn new(decider: Arc<dyn RoutingDecider>, config: Arc<DispatchConfig>) -> Self {
        Self { decider, config }
    }

    /// Evaluates the request against the target agent record.
    pub async fn evaluate(
        &self,
        request: &TaskRequest,
        record: &AgentRecord,
    ) -> Result<RoutingAssessment> {
        let prompt = self.build_prompt(request);
        let options = build_options(request, record);

        let decision = self.decider.decide(&prompt, &options).await?;
        debug!(
            agent = %record.slug,
            route = decision.route_to_agent,
            "Routing decision received"
        );

        let mut metadata: Map<String, Value> = decision.detail.clone();
        metadata.insert("routeToAgent".to_string(), Value::Bool(decision.route_to_agent));

        if decision.route_to_agent {
            Ok(RoutingAssessment::clear(metadata))
        } else {
            Ok(RoutingAssessment::showstopper(
                decision.blocking_reason.clone(),
                metadata,
            ))
        }
    }

    /// Builds a natural-language summary of the request: user message,
    /// trailing transcript lines, and a plan snippet when one is attached.
    fn build_prompt(&self, request: &TaskRequest) -> String {
        let mut prompt = format!(
            "Task ({mode}) for agent '{agent}': {message}",
            mode = request.mode,
            agent = request.context.agent_slug,
            message = request.user_message,
        );

        if let Some(history) = request.payload.get("history").and_then(Value::as_array)
            && !history.is_empty()
        {
            let keep = self.config.policy_history_lines;
            let start = history.len().saturating_sub(keep);
            prompt.push_str("\nRecent transcript:");
            for entry in &history[start..] {
                let line = entry
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| entry.to_string());
                prompt.push_str("\n- ");
                prompt.push_str(&line);
            }
        }

        if let Some(plan) = request.payload.get("plan") {
            prompt.push_str("\nPlan snippet: ");
            prompt.push_str(&plan.to_string());
        }

        prompt
    }
}

/// Structured options handed to the decision service alongside the prompt.
fn build_options(request: &TaskRequest, record: &AgentRecord) -> Value {
    let ctx = &request.context;
    json!({
        "mode": request.mode,
        "agentSlug": record.slug,
        "agentType": record.agent_type,
        "orgSlug": ctx.org_slug,
        "conversationId": ctx.conversation_id,
        "taskId": ctx.task_id,
        "planId": ctx.plan_id,
        "provider": request.provider_hint(),
        "model": ctx.model,
        "metadata": request.metadata,
    })
}
