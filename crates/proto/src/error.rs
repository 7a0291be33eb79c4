use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Dispatch/routing error.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Approval record/store error.
    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    /// LLM invocation error surfaced by a runner.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Streaming session error.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Internal protocol type error.
    #[error("Proto error: {0}")]
    Proto(#[from] ProtoError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Target agent record does not exist for this tenant.
    #[error("Agent not found: {org_slug}/{agent_slug}")]
    AgentNotFound {
        org_slug: String,
        agent_slug: String,
    },

    /// No runner is registered for the agent type. Deployment fault.
    #[error("No runner available for agent type: {0}")]
    RunnerMissing(String),

    /// Sovereign-mode agent asked for a non-local provider.
    #[error("Agent {agent_slug} requires the local model provider, got: {provider}")]
    ComplianceViolation {
        agent_slug: String,
        provider: String,
    },

    /// Agent directory lookup failed at the storage layer.
    #[error("Agent directory error: {0}")]
    Directory(String),

    /// Routing decision service failed.
    #[error("Routing decision failed: {0}")]
    Decision(String),

    /// External delegate dispatch failed.
    #[error("Delegate dispatch failed: {0}")]
    Delegate(String),

    /// A late-bound component was used before wiring completed.
    #[error("Dispatcher not wired: {0}")]
    NotWired(String),
}

/// Approval record errors
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Approval record missing, or tenant/agent mismatch.
    #[error("Approval not found: {0}")]
    NotFound(String),

    /// Approval store operation failed.
    #[error("Approval store error: {0}")]
    Store(String),
}

/// LLM invocation errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// Runtime exceeded configured tool-call rounds.
    #[error("Max tool rounds exceeded")]
    MaxToolRounds,
}

/// Streaming session errors
#[derive(Debug, Error)]
pub enum StreamError {
    /// Publish attempted after the consumer side went away.
    #[error("Stream session closed: {0}")]
    Closed(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Internal proto errors
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Invalid task mode string.
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Invalid or unknown HITL method string.
    #[error("Invalid HITL method: {0}")]
    InvalidHitlMethod(String),

    /// Invalid approval status string.
    #[error("Invalid approval status: {0}")]
    InvalidStatus(String),

    /// Generic serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
