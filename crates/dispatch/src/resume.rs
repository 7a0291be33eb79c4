//! Approval resume flow: approve a paused task and re-enter the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use proto::{
    ApprovalError, ApprovalRecord, ApprovalStatus, ExecutionContext, RecordId, Result,
    TaskMode, TaskRequest, TaskResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::gateway::ExecutionGateway;
use crate::traits::ApprovalStore;

/// Caller-supplied overrides merged on top of the stored request fragment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResumeOverrides {
    /// Entries merged into the stored payload (overrides win).
    pub payload: Option<Value>,
    /// Entries shallow-merged into `payload.options`.
    pub options: Option<Value>,
    /// Entries merged into the stored metadata (overrides win).
    pub metadata: Option<Value>,
}

/// Re-entry point that turns an approved pause back into a live dispatch.
///
/// Approval is a distinct fact from execution outcome: once a record is
/// marked approved it stays approved even when the re-invoked dispatch
/// fails, so an approved-but-failed run can be retried without re-approving.
pub struct ApprovalResumeFlow {
    approvals: Arc<dyn ApprovalStore>,
    gateway: Arc<ExecutionGateway>,
}

impl ApprovalResumeFlow {
    /// Creates the flow over the approval store and gateway.
    pub fn new(approvals: Arc<dyn ApprovalStore>, gateway: Arc<ExecutionGateway>) -> Self {
        Self { approvals, gateway }
    }

    /// Approves the record, rehydrates the stored request merged with the
    /// overrides, and re-invokes the execution gateway.
    pub async fn continue_approval(
        &self,
        org_slug: &str,
        agent_slug: &str,
        approval_id: &str,
        overrides: ResumeOverrides,
        acting_user: RecordId,
    ) -> Result<TaskResponse> {
        let record = self
            .approvals
            .get(approval_id)
            .await?
            .filter(|r| r.org_slug == org_slug && r.agent_slug == agent_slug)
            .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;

        self.approvals
            .set_status(approval_id, ApprovalStatus::Approved, &acting_user)
            .await?;
        info!(approval = %approval_id, "Approval marked approved");

        let request = rehydrate_request(&record, overrides);
        let context = request.context.clone();

        let response = self.gateway.execute(context, request).await?;
        Ok(response.with_meta_entries([
            ("approvalId", Value::String(approval_id.to_string())),
            (
                "approvalStatus",
                Value::String(ApprovalStatus::Approved.to_string()),
            ),
        ]))
    }
}

/// HITL resume seam for the api runner; late-bound to break the
/// registry → runner → gateway construction cycle.
#[async_trait]
pub trait ResumeExecutor: Send + Sync {
    /// Approves and continues a paused task.
    async fn continue_approval(
        &self,
        org_slug: &str,
        agent_slug: &str,
        approval_id: &str,
        overrides: ResumeOverrides,
        acting_user: RecordId,
    ) -> Result<TaskResponse>;
}

#[async_trait]
impl ResumeExecutor for ApprovalResumeFlow {
    async fn continue_approval(
        &self,
        org_slug: &str,
        agent_slug: &str,
        approval_id: &str,
        overrides: ResumeOverrides,
        acting_user: RecordId,
    ) -> Result<TaskResponse> {
        ApprovalResumeFlow::continue_approval(
            self,
            org_slug,
            agent_slug,
            approval_id,
            overrides,
            acting_user,
        )
        .await
    }
}

/// Rebuilds the task request from the stored fragment plus overrides.
///
/// Merging is shallow and one level deep; only the `options` sub-bag gets
/// its own shallow merge into `payload.options`. Overrides win on collision.
fn rehydrate_request(record: &ApprovalRecord, overrides: ResumeOverrides) -> TaskRequest {
    let fragment = record.stored_request().cloned().unwrap_or_else(|| json!({}));

    let mode = fragment
        .get("mode")
        .and_then(Value::as_str)
        .and_then(|m| m.parse::<TaskMode>().ok())
        .unwrap_or(TaskMode::Build);
    let user_message = fragment
        .get("userMessage")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut payload = fragment
        .get("payload")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let mut metadata = fragment
        .get("metadata")
        .cloned()
        .unwrap_or_else(|| json!({}));

    if let Some(over) = &overrides.payload {
        shallow_merge(&mut payload, over);
    }
    if let Some(options) = &overrides.options {
        let target = payload
            .as_object_mut()
            .map(|map| map.entry("options").or_insert_with(|| json!({})));
        if let Some(target) = target {
            shallow_merge(target, options);
        }
    }
    if let Some(over) = &overrides.metadata {
        shallow_merge(&mut metadata, over);
    }

    // Streaming must activate consistently no matter which layer carried the
    // flag: mirror the stream id into payload.metadata and set both flags.
    let stream_id = metadata
        .get("streamId")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(stream_id) = stream_id {
        if let Some(map) = payload.as_object_mut() {
            let nested = map.entry("metadata").or_insert_with(|| json!({}));
            if let Some(nested) = nested.as_object_mut() {
                nested.insert("streamId".to_string(), Value::String(stream_id));
            }
            map.insert("stream".to_string(), Value::Bool(true));
        }
        if let Some(map) = metadata.as_object_mut() {
            map.insert("stream".to_string(), Value::Bool(true));
        }
    }

    let context = rehydrate_stored_context(record, &fragment);
    let mut request = TaskRequest::new(mode, context, user_message);
    request.payload = payload;
    request.metadata = metadata;
    request
}

/// Rebuilds the execution context from stored values, defaulting fields the
/// original approval predates to the nil identifier so older approvals stay
/// resumable without migration.
fn rehydrate_stored_context(record: &ApprovalRecord, fragment: &Value) -> ExecutionContext {
    let stored = fragment.get("context");
    let id_field = |key: &str| -> RecordId {
        stored
            .and_then(|ctx| ctx.get(key))
            .and_then(Value::as_str)
            .map(RecordId::new)
            .unwrap_or_else(RecordId::nil)
    };
    let hint = |key: &str| -> Option<String> {
        stored
            .and_then(|ctx| ctx.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let mut context = ExecutionContext::new(record.org_slug.clone(), record.agent_slug.clone());
    context.user_id = id_field("userId");
    context.conversation_id = match id_field("conversationId") {
        id if id.is_nil() => record.conversation_id.clone(),
        id => id,
    };
    context.task_id = id_field("taskId");
    context.plan_id = id_field("planId");
    context.deliverable_id = id_field("deliverableId");
    context.agent_id = id_field("agentId");
    context.agent_type = hint("agentType");
    context.provider = hint("provider");
    context.model = hint("model");
    context
}

/// One-level merge: `over`'s top-level entries replace `base`'s.
fn shallow_merge(base: &mut Value, over: &Value) {
    if let (Value::Object(base), Value::Object(over)) = (base, over) {
        for (key, value) in over {
            base.insert(key.clone(), value.clone());
        }
    }
}
