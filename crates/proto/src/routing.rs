use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Verdict returned by the external routing decision service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Whether the request may proceed to a runner.
    pub route_to_agent: bool,
    /// Human-readable reason when the request is blocked.
    #[serde(default)]
    pub blocking_reason: Option<String>,
    /// Additional decision payload, carried through for observability.
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

/// Assessment produced by the routing policy gate for one dispatch
///
/// Ephemeral: produced and consumed within a single dispatch, never
/// persisted. The decision to pause is persisted separately as an approval
/// record.
#[derive(Debug, Clone)]
pub struct RoutingAssessment {
    /// Whether execution is blocked pending human review.
    pub blocked: bool,
    /// Human-readable reason for the block.
    pub human_message: Option<String>,
    /// Decision payload carried as observability metadata.
    pub metadata: Map<String, Value>,
}

impl RoutingAssessment {
    /// Assessment allowing the request through.
    pub fn clear(metadata: Map<String, Value>) -> Self {
        Self {
            blocked: false,
            human_message: None,
            metadata,
        }
    }

    /// Assessment blocking the request for human review.
    pub fn showstopper(human_message: Option<String>, metadata: Map<String, Value>) -> Self {
        Self {
            blocked: true,
            human_message,
            metadata,
        }
    }
}
