//! Collaborator contracts consumed by the dispatch core.
//!
//! The core depends on these seams but does not implement them (beyond test
//! fakes): agent lookup, routing decisions, approval persistence, and
//! lifecycle notification all live in external services.

use async_trait::async_trait;
use proto::{
    AgentRecord, AgentRuntimeDefinition, ApprovalRecord, ApprovalStatus, RecordId, Result,
    RoutingDecision, TaskMode, TaskRequest, TaskResponse,
};
use serde_json::{Map, Value};

/// Read access to persisted agent records.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Resolves an agent record by tenant and slug. `None` when absent.
    async fn get_agent(&self, org_slug: &str, agent_slug: &str) -> Result<Option<AgentRecord>>;
}

/// External decision function behind the routing policy gate.
#[async_trait]
pub trait RoutingDecider: Send + Sync {
    /// Decides whether a summarized request may proceed.
    async fn decide(&self, prompt: &str, options: &Value) -> Result<RoutingDecision>;
}

/// Persistence for approval records.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Loads an approval by id. `None` when absent.
    async fn get(&self, id: &str) -> Result<Option<ApprovalRecord>>;

    /// Persists a newly created approval.
    async fn create(&self, record: ApprovalRecord) -> Result<()>;

    /// Transitions an approval's status, attributing the acting user
    /// (nil when unattributed).
    async fn set_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        acting_user: &RecordId,
    ) -> Result<()>;

    /// Lists pending approvals for a tenant, across agents.
    async fn list_pending(&self, org_slug: &str) -> Result<Vec<ApprovalRecord>>;

    /// Lists approvals recorded against a conversation.
    async fn list_for_conversation(
        &self,
        conversation_id: &RecordId,
    ) -> Result<Vec<ApprovalRecord>>;
}

/// Kind of a lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventKind {
    /// Dispatch accepted and about to run.
    Started,
    /// Dispatch returned a successful response.
    Completed,
    /// Dispatch returned a failure response or raised an error.
    Failed,
}

impl LifecycleEventKind {
    /// Canonical string form used in notification payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One lifecycle notification emitted around a dispatch
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    /// Event kind.
    pub kind: LifecycleEventKind,
    /// Tenant slug.
    pub org_slug: String,
    /// Agent slug.
    pub agent_slug: String,
    /// Mode of the dispatch.
    pub mode: TaskMode,
    /// Task correlation id.
    pub task_id: RecordId,
    /// Extra detail (failure reason, error message).
    pub detail: Map<String, Value>,
}

/// Fire-and-forget lifecycle sink.
///
/// `notify` returns `()` so a notification cannot fail across the boundary;
/// implementations swallow their own errors. The gateway additionally runs
/// every call on a detached task so it can never block the dispatch path.
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    /// Delivers one lifecycle event.
    async fn notify(&self, event: LifecycleEvent);
}

/// One execution strategy per agent type.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Executes a task. `definition` is `None` only on the cross-agent
    /// `hitl.pending` path; every other dispatch carries a concrete one.
    async fn execute(
        &self,
        definition: Option<&AgentRuntimeDefinition>,
        request: &TaskRequest,
        org_slug: &str,
    ) -> Result<TaskResponse>;
}
