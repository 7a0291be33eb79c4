use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::TaskMode;

/// Machine-readable failure reason key inside `payload.metadata`.
pub const REASON_KEY: &str = "reason";

/// Message surfaced to a human when execution pauses for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanResponse {
    /// Human-readable review message.
    pub message: String,
    /// Machine-readable tag for the pause, when classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response payload: content plus observability metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Structured response content.
    #[serde(default)]
    pub content: Value,
    /// Open metadata bag; failures always carry [`REASON_KEY`] here.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Normalized outcome of a task dispatch
///
/// A response is never partially successful: `success=false` always carries
/// a machine-readable reason in `payload.metadata.reason`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    /// Whether the task ran to completion.
    pub success: bool,
    /// Mode the request was dispatched under.
    pub mode: TaskMode,
    /// Content and metadata produced by the dispatch.
    pub payload: ResponsePayload,
    /// Present when the task paused for human review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_response: Option<HumanResponse>,
}

impl TaskResponse {
    /// Creates a successful response with the given content.
    pub fn ok(mode: TaskMode, content: Value) -> Self {
        Self {
            success: true,
            mode,
            payload: ResponsePayload {
                content,
                metadata: Map::new(),
            },
            human_response: None,
        }
    }

    /// Creates a structured failure response carrying the reason in
    /// `payload.metadata.reason`.
    pub fn failure(mode: TaskMode, reason: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(REASON_KEY.to_string(), Value::String(reason.into()));
        Self {
            success: false,
            mode,
            payload: ResponsePayload {
                content: Value::Null,
                metadata,
            },
            human_response: None,
        }
    }

    /// Creates a blocked-for-review response: `success=false`, a populated
    /// human response, and the failure tag in `payload.metadata.reason`.
    pub fn human_gate(mode: TaskMode, message: impl Into<String>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let mut metadata = Map::new();
        metadata.insert(REASON_KEY.to_string(), Value::String(tag.clone()));
        Self {
            success: false,
            mode,
            payload: ResponsePayload {
                content: Value::Null,
                metadata,
            },
            human_response: Some(HumanResponse {
                message: message.into(),
                reason: Some(tag),
            }),
        }
    }

    /// Returns the failure reason, when one is recorded.
    pub fn reason(&self) -> Option<&str> {
        self.payload.metadata.get(REASON_KEY).and_then(Value::as_str)
    }

    /// Returns a new response with the given entries merged into the payload
    /// metadata. The original response is left untouched.
    pub fn with_meta_entries<I, K>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut next = self.clone();
        for (key, value) in entries {
            next.payload.metadata.insert(key.into(), value);
        }
        next
    }
}
