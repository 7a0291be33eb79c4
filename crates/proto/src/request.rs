use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ProtoError;

/// Dotted prefix marking a HITL method call inside `payload.method`.
pub const HITL_METHOD_PREFIX: &str = "hitl.";

/// Kind of operation requested of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Conversational exchange.
    Converse,
    /// Plan drafting/refinement.
    Plan,
    /// Deliverable production.
    Build,
    /// Human-in-the-loop method call.
    Hitl,
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskMode::Converse => write!(f, "converse"),
            TaskMode::Plan => write!(f, "plan"),
            TaskMode::Build => write!(f, "build"),
            TaskMode::Hitl => write!(f, "hitl"),
        }
    }
}

impl std::str::FromStr for TaskMode {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "converse" => Ok(TaskMode::Converse),
            "plan" => Ok(TaskMode::Plan),
            "build" => Ok(TaskMode::Build),
            "hitl" => Ok(TaskMode::Hitl),
            other => Err(ProtoError::InvalidMode(other.to_string())),
        }
    }
}

/// HITL sub-method carried as a dotted string in `payload.method`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitlMethod {
    /// Approve and continue a paused task.
    Resume,
    /// Query the status of one approval.
    Status,
    /// List approvals for a conversation.
    History,
    /// List pending approvals across agents.
    Pending,
}

impl HitlMethod {
    /// Returns the dotted wire form, e.g. `hitl.resume`.
    pub fn as_method_str(&self) -> &'static str {
        match self {
            HitlMethod::Resume => "hitl.resume",
            HitlMethod::Status => "hitl.status",
            HitlMethod::History => "hitl.history",
            HitlMethod::Pending => "hitl.pending",
        }
    }
}

impl std::fmt::Display for HitlMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_method_str())
    }
}

impl std::str::FromStr for HitlMethod {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hitl.resume" => Ok(HitlMethod::Resume),
            "hitl.status" => Ok(HitlMethod::Status),
            "hitl.history" => Ok(HitlMethod::History),
            "hitl.pending" => Ok(HitlMethod::Pending),
            other => Err(ProtoError::InvalidHitlMethod(other.to_string())),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A unit of work addressed to a named, tenant-scoped agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Requested operation kind.
    pub mode: TaskMode,
    /// Identity capsule for this dispatch.
    pub context: ExecutionContext,
    /// User text payload.
    #[serde(default)]
    pub user_message: String,
    /// Open key-value bag carried with the request.
    #[serde(default = "empty_object")]
    pub payload: Value,
    /// Open key-value bag of caller metadata.
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

impl TaskRequest {
    /// Creates a request with empty payload and metadata bags.
    pub fn new(mode: TaskMode, context: ExecutionContext, user_message: impl Into<String>) -> Self {
        Self {
            mode,
            context,
            user_message: user_message.into(),
            payload: empty_object(),
            metadata: empty_object(),
        }
    }

    /// Raw `payload.method` string, when present.
    pub fn method(&self) -> Option<&str> {
        self.payload.get("method").and_then(Value::as_str)
    }

    /// Parses `payload.method` into a [`HitlMethod`] when it carries the
    /// `hitl.` prefix. Unknown `hitl.*` strings are an error; a non-HITL or
    /// absent method is `Ok(None)`.
    pub fn hitl_method(&self) -> Result<Option<HitlMethod>, ProtoError> {
        match self.method() {
            Some(m) if m.starts_with(HITL_METHOD_PREFIX) => m.parse().map(Some),
            _ => Ok(None),
        }
    }

    /// Returns `true` when the payload or metadata bag requests streaming.
    pub fn wants_stream(&self) -> bool {
        bag_flag(&self.payload, "stream") || bag_flag(&self.metadata, "stream")
    }

    /// Stream identifier supplied by the caller, when present.
    pub fn stream_id(&self) -> Option<&str> {
        self.metadata
            .get("streamId")
            .or_else(|| self.payload.get("metadata").and_then(|m| m.get("streamId")))
            .and_then(Value::as_str)
    }

    /// Declared provider for this request: context hint first, then payload.
    pub fn provider_hint(&self) -> Option<&str> {
        self.context
            .provider
            .as_deref()
            .or_else(|| self.payload.get("provider").and_then(Value::as_str))
    }

    /// Inserts an entry into the payload bag.
    pub fn insert_payload(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.payload {
            map.insert(key.into(), value);
        }
    }

    /// Inserts an entry into the metadata bag.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.into(), value);
        }
    }
}

fn bag_flag(bag: &Value, key: &str) -> bool {
    bag.get(key).and_then(Value::as_bool).unwrap_or(false)
}
