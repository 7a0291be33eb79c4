//! Shared protocol types for the task dispatch core.
//!
//! This crate defines the serializable request/response shapes, the agent
//! record and its runtime projection, approval records, routing assessments,
//! stream chunk types, and strongly-typed error enums shared across the
//! workspace.

pub mod agent;
pub mod approval;
pub mod context;
pub mod error;
pub mod request;
pub mod response;
pub mod routing;
pub mod stream;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of agent record/definition types.
pub use agent::{
    AgentPrompts, AgentRecord, AgentRuntimeDefinition, ExecutionFlags, LlmDefaults,
    SYSTEM_AGENT_SLUG,
};
/// Re-export of approval record types.
pub use approval::{ApprovalRecord, ApprovalStatus};
/// Re-export of the identity capsule types.
pub use context::{ExecutionContext, RecordId};
/// Re-export of task request types and mode enums.
pub use request::{HITL_METHOD_PREFIX, HitlMethod, TaskMode, TaskRequest};
/// Re-export of task response types.
pub use response::{HumanResponse, ResponsePayload, TaskResponse};
/// Re-export of routing decision/assessment types.
pub use routing::{RoutingAssessment, RoutingDecision};
/// Re-export of stream chunk/event types.
pub use stream::{ChunkKind, StreamChunk, StreamDescriptor, StreamEvent};
