//! Execution gateway: the single entry point for task dispatch.

use std::sync::Arc;

use proto::{
    AgentRecord, AgentRuntimeDefinition, ApprovalRecord, DispatchError, ExecutionContext,
    Result, RoutingAssessment, TaskMode, TaskRequest, TaskResponse,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::policy::RoutingPolicyGate;
use crate::router::{DispatchTask, ModeRouter};
use crate::traits::{
    AgentDirectory, ApprovalStore, LifecycleEvent, LifecycleEventKind, LifecycleNotifier,
};

/// Failure tag attached when the routing policy gate blocks a dispatch.
pub const ROUTING_SHOWSTOPPER: &str = "routing_showstopper";

/// Single entry point for executing agent tasks.
///
/// Normalizes every outcome (success, policy block, capability rejection,
/// runtime error) into one response shape and brackets the dispatch with
/// best-effort lifecycle notifications.
pub struct ExecutionGateway {
    directory: Arc<dyn AgentDirectory>,
    policy: RoutingPolicyGate,
    router: ModeRouter,
    approvals: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn LifecycleNotifier>,
    config: Arc<DispatchConfig>,
}

impl ExecutionGateway {
    /// Wires a gateway over its collaborators.
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        policy: RoutingPolicyGate,
        router: ModeRouter,
        approvals: Arc<dyn ApprovalStore>,
        notifier: Arc<dyn LifecycleNotifier>,
        config: Arc<DispatchConfig>,
    ) -> Self {
        Self {
            directory,
            policy,
            router,
            approvals,
            notifier,
            config,
        }
    }

    /// Executes one task. Steps are strictly ordered: resolve, build
    /// definition, policy gate, capability check, route. A blocked request
    /// never reaches a runner. Errors after the "started" notification
    /// re-raise unchanged, with a "failed" notification emitted first.
    pub async fn execute(
        &self,
        context: ExecutionContext,
        request: TaskRequest,
    ) -> Result<TaskResponse> {
        let record = self
            .directory
            .get_agent(&context.org_slug, &context.agent_slug)
            .await?
            .ok_or_else(|| DispatchError::AgentNotFound {
                org_slug: context.org_slug.clone(),
                agent_slug: context.agent_slug.clone(),
            })?;

        let definition = AgentRuntimeDefinition::from_record(&record);

        self.notify_detached(LifecycleEventKind::Started, &context, &request, Map::new());

        let outcome = self.dispatch(&context, &request, record, definition).await;
        self.notify_outcome(&context, &request, &outcome);
        outcome
    }

    /// Gate, capability check, and runner dispatch, in that order.
    async fn dispatch(
        &self,
        context: &ExecutionContext,
        request: &TaskRequest,
        record: AgentRecord,
        definition: AgentRuntimeDefinition,
    ) -> Result<TaskResponse> {
        let assessment = self.policy.evaluate(request, &record).await?;
        if assessment.blocked {
            return self.pause_for_review(context, request, assessment).await;
        }

        let is_hitl = request.mode == TaskMode::Hitl || request.hitl_method()?.is_some();
        if !is_hitl && !definition.execution.allows(request.mode) {
            debug!(
                agent = %context.agent_slug,
                mode = %request.mode,
                "Capability rejection"
            );
            return Ok(TaskResponse::failure(
                request.mode,
                format!("Mode '{}' not supported by agent", request.mode),
            ));
        }

        let task = DispatchTask {
            context: context.clone(),
            definition: Some(definition),
            request: request.clone(),
            routing_metadata: merge_agent_metadata(assessment.metadata, &record),
        };
        self.router.execute(task).await
    }

    /// Blocked path: persist a pending approval holding the request fragment,
    /// then return a human-response outcome. Nothing further runs.
    async fn pause_for_review(
        &self,
        context: &ExecutionContext,
        request: &TaskRequest,
        assessment: RoutingAssessment,
    ) -> Result<TaskResponse> {
        let fragment = json!({
            "mode": request.mode,
            "userMessage": request.user_message,
            "payload": request.payload,
            "metadata": request.metadata,
            "context": context,
        });
        let approval = ApprovalRecord::pending(
            context.org_slug.clone(),
            context.agent_slug.clone(),
            context.conversation_id.clone(),
            context.user_id.clone(),
            json!({
                "request": fragment,
                "assessment": assessment.metadata,
            }),
        );
        let approval_id = approval.id.clone();
        self.approvals.create(approval).await?;

        info!(
            agent = %context.agent_slug,
            approval = %approval_id,
            "Dispatch blocked by routing policy"
        );

        let message = assessment
            .human_message
            .unwrap_or_else(|| self.config.default_review_message.clone());
        Ok(
            TaskResponse::human_gate(request.mode, message, ROUTING_SHOWSTOPPER)
                .with_meta_entries([("approvalId", Value::String(approval_id))]),
        )
    }

    /// Emits the completed/failed notification matching the outcome.
    fn notify_outcome(
        &self,
        context: &ExecutionContext,
        request: &TaskRequest,
        outcome: &Result<TaskResponse>,
    ) {
        let (kind, detail) = match outcome {
            Ok(resp) if resp.success => (LifecycleEventKind::Completed, Map::new()),
            Ok(resp) => {
                let mut detail = Map::new();
                if let Some(reason) = resp.reason() {
                    detail.insert("reason".to_string(), Value::String(reason.to_string()));
                }
                (LifecycleEventKind::Failed, detail)
            }
            Err(err) => {
                let mut detail = Map::new();
                detail.insert("error".to_string(), Value::String(err.to_string()));
                (LifecycleEventKind::Failed, detail)
            }
        };
        self.notify_detached(kind, context, request, detail);
    }

    /// Fires a lifecycle notification on a detached task. The notifier
    /// returns `()` and runs outside this call's control flow, so it can
    /// neither block nor fail the dispatch.
    fn notify_detached(
        &self,
        kind: LifecycleEventKind,
        context: &ExecutionContext,
        request: &TaskRequest,
        detail: Map<String, Value>,
    ) {
        let notifier = Arc::clone(&self.notifier);
        let event = LifecycleEvent {
            kind,
            org_slug: context.org_slug.clone(),
            agent_slug: context.agent_slug.clone(),
            mode: request.mode,
            task_id: context.task_id.clone(),
            detail,
        };
        tokio::spawn(async move {
            notifier.notify(event).await;
            debug!("Lifecycle notification delivered: {}", kind.as_str());
        });
    }
}

/// Routing metadata handed to the router: gate observability plus the
/// agent's own metadata bag (gate entries win on collision).
fn merge_agent_metadata(
    mut routing_metadata: Map<String, Value>,
    record: &AgentRecord,
) -> Map<String, Value> {
    for (key, value) in &record.metadata {
        routing_metadata
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    routing_metadata
}
