use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::RecordId;
use crate::error::ProtoError;

/// Metadata key holding the stored request fragment on an approval.
pub const STORED_REQUEST_KEY: &str = "request";

/// Lifecycle state of an approval record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// Approved for continuation.
    Approved,
    /// Rejected; the paused task will not continue.
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(ProtoError::InvalidStatus(other.to_string())),
        }
    }
}

/// A paused task awaiting human review
///
/// Created when the routing policy gate blocks a dispatch; the stored
/// request fragment under `metadata.request` is what the resume flow
/// rehydrates later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    /// Unique approval id.
    pub id: String,
    /// Owning tenant slug.
    pub org_slug: String,
    /// Agent the paused task targets.
    pub agent_slug: String,
    /// Conversation the paused task belongs to.
    #[serde(default)]
    pub conversation_id: RecordId,
    /// Current lifecycle state.
    pub status: ApprovalStatus,
    /// User who triggered the original request, when known.
    #[serde(default)]
    pub requested_by: RecordId,
    /// User who decided the approval; nil until decided or unattributed.
    #[serde(default)]
    pub decided_by: RecordId,
    /// Open metadata bag; holds the stored request fragment.
    #[serde(default)]
    pub metadata: Value,
    /// Creation timestamp in UTC.
    pub created_at: DateTime<Utc>,
    /// Decision timestamp, once decided.
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    /// Creates a pending approval with a fresh id.
    pub fn pending(
        org_slug: impl Into<String>,
        agent_slug: impl Into<String>,
        conversation_id: RecordId,
        requested_by: RecordId,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_slug: org_slug.into(),
            agent_slug: agent_slug.into(),
            conversation_id,
            status: ApprovalStatus::Pending,
            requested_by,
            decided_by: RecordId::nil(),
            metadata,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    /// The stored request fragment, when one was recorded.
    pub fn stored_request(&self) -> Option<&Value> {
        self.metadata.get(STORED_REQUEST_KEY)
    }
}
