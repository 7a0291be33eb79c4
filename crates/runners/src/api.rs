//! API runner: the fixed home of every HITL state operation.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use dispatch::{ApprovalStore, ResumeExecutor, ResumeOverrides, Runner};
use proto::{
    AgentRuntimeDefinition, ApprovalError, ApprovalRecord, DispatchError, HitlMethod,
    ProtoError, Result, TaskRequest, TaskResponse,
};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Owns approval state queries and the resume entry point, regardless of
/// which runner produced the original pause.
///
/// The resume handle is late-bound: the resume flow wraps the gateway, which
/// is built after the registry this runner lives in.
pub struct ApiRunner {
    approvals: Arc<dyn ApprovalStore>,
    resume: OnceLock<Arc<dyn ResumeExecutor>>,
}

impl ApiRunner {
    /// Creates an api runner; call [`bind_resume`] before serving
    /// `hitl.resume`.
    ///
    /// [`bind_resume`]: ApiRunner::bind_resume
    pub fn new(approvals: Arc<dyn ApprovalStore>) -> Self {
        Self {
            approvals,
            resume: OnceLock::new(),
        }
    }

    /// Binds the resume flow. Later calls are ignored.
    pub fn bind_resume(&self, resume: Arc<dyn ResumeExecutor>) {
        let _ = self.resume.set(resume);
    }

    async fn pending(&self, request: &TaskRequest, org_slug: &str) -> Result<TaskResponse> {
        let records = self.approvals.list_pending(org_slug).await?;
        debug!(org = %org_slug, count = records.len(), "Pending approvals listed");
        Ok(TaskResponse::ok(
            request.mode,
            json!({ "approvals": to_json(&records)? }),
        ))
    }

    async fn status(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let approval_id = required_approval_id(request)?;
        let record = self
            .approvals
            .get(approval_id)
            .await?
            .filter(|r| in_scope(r, definition, org_slug))
            .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;
        Ok(TaskResponse::ok(
            request.mode,
            json!({ "approval": to_json(&record)? }),
        ))
    }

    async fn history(&self, request: &TaskRequest, org_slug: &str) -> Result<TaskResponse> {
        let records = self
            .approvals
            .list_for_conversation(&request.context.conversation_id)
            .await?;
        let records: Vec<ApprovalRecord> = records
            .into_iter()
            .filter(|r| r.org_slug == org_slug)
            .collect();
        Ok(TaskResponse::ok(
            request.mode,
            json!({ "approvals": to_json(&records)? }),
        ))
    }

    async fn resume(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let executor = self
            .resume
            .get()
            .ok_or_else(|| DispatchError::NotWired("resume executor".to_string()))?;

        let approval_id = required_approval_id(request)?;
        let agent_slug = definition
            .map(|d| d.agent_slug.as_str())
            .unwrap_or(&request.context.agent_slug);
        let overrides = match request.payload.get("overrides") {
            Some(raw) => serde_json::from_value::<ResumeOverrides>(raw.clone())
                .map_err(|e| ProtoError::Serialization(e.to_string()))?,
            None => ResumeOverrides::default(),
        };

        info!(approval = %approval_id, agent = %agent_slug, "Resuming approved task");
        executor
            .continue_approval(
                org_slug,
                agent_slug,
                approval_id,
                overrides,
                request.context.user_id.clone(),
            )
            .await
    }
}

#[async_trait]
impl Runner for ApiRunner {
    async fn execute(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse> {
        let method = request
            .payload
            .get("hitlMethod")
            .and_then(Value::as_str)
            .or_else(|| request.method())
            .ok_or_else(|| ProtoError::InvalidHitlMethod("<missing>".to_string()))?
            .parse::<HitlMethod>()?;

        match method {
            HitlMethod::Pending => self.pending(request, org_slug).await,
            HitlMethod::Status => self.status(definition, request, org_slug).await,
            HitlMethod::History => self.history(request, org_slug).await,
            HitlMethod::Resume => self.resume(definition, request, org_slug).await,
        }
    }
}

/// An approval is visible when its tenant matches; with a concrete agent
/// definition the agent must match too.
fn in_scope(
    record: &ApprovalRecord,
    definition: Option<&AgentRuntimeDefinition>,
    org_slug: &str,
) -> bool {
    record.org_slug == org_slug
        && definition.is_none_or(|d| d.agent_slug == record.agent_slug)
}

fn required_approval_id(request: &TaskRequest) -> Result<&str> {
    request
        .payload
        .get("approvalId")
        .and_then(Value::as_str)
        .ok_or_else(|| ApprovalError::NotFound("no approvalId provided".to_string()).into())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ProtoError::Serialization(e.to_string()).into())
}
