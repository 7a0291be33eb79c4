use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::TaskMode;

/// Sentinel agent slug for cross-agent system queries (e.g. pending
/// approvals); the only slug that dispatches without a concrete record.
pub const SYSTEM_AGENT_SLUG: &str = "_system";

/// Per-mode capability flags on an agent record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFlags {
    /// Agent may handle converse-mode requests.
    #[serde(default)]
    pub can_converse: bool,
    /// Agent may handle plan-mode requests.
    #[serde(default)]
    pub can_plan: bool,
    /// Agent may handle build-mode requests.
    #[serde(default)]
    pub can_build: bool,
}

impl ExecutionFlags {
    /// Whether the given mode is allowed. HITL is always allowed so a paused
    /// agent stays resumable even when disabled for every other mode.
    pub fn allows(&self, mode: TaskMode) -> bool {
        match mode {
            TaskMode::Converse => self.can_converse,
            TaskMode::Plan => self.can_plan,
            TaskMode::Build => self.can_build,
            TaskMode::Hitl => true,
        }
    }
}

/// Prompt material configured on an agent record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPrompts {
    /// System prompt used by prompt-assembling runners.
    #[serde(default)]
    pub system: String,
    /// Optional persona block appended after the system prompt.
    #[serde(default)]
    pub persona: Option<String>,
}

/// LLM defaults configured on an agent record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmDefaults {
    /// Default provider name.
    #[serde(default)]
    pub provider: Option<String>,
    /// Default model id.
    #[serde(default)]
    pub model: Option<String>,
    /// Sovereign mode: the agent may only execute against the designated
    /// local model provider.
    #[serde(default)]
    pub require_local_model: bool,
}

/// Persisted agent configuration, owned by the external agent directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Agent slug, unique per tenant.
    pub slug: String,
    /// Owning tenant/organization slug.
    pub org_slug: String,
    /// Human-readable agent name.
    #[serde(default)]
    pub name: String,
    /// Runner type string this agent dispatches to.
    pub agent_type: String,
    /// Per-mode capability flags.
    #[serde(default)]
    pub execution: ExecutionFlags,
    /// Prompt material.
    #[serde(default)]
    pub prompts: AgentPrompts,
    /// LLM defaults and sovereignty constraint.
    #[serde(default)]
    pub llm: LlmDefaults,
    /// Open metadata bag.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Request-scoped read-only projection of an [`AgentRecord`]
///
/// Built once per dispatch and never mutated; no caching happens at this
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeDefinition {
    /// Agent slug.
    pub agent_slug: String,
    /// Owning tenant slug.
    pub org_slug: String,
    /// Runner type string.
    pub agent_type: String,
    /// Per-mode capability flags.
    pub execution: ExecutionFlags,
    /// Fully assembled system prompt (system + persona).
    pub system_prompt: String,
    /// Default provider name.
    pub provider: Option<String>,
    /// Default model id.
    pub model: Option<String>,
    /// Sovereign-mode constraint.
    pub require_local_model: bool,
    /// Metadata carried over from the record.
    pub metadata: Map<String, Value>,
}

impl AgentRuntimeDefinition {
    /// Builds the runtime projection from a persisted record. Pure: no I/O
    /// beyond what the record already contains.
    pub fn from_record(record: &AgentRecord) -> Self {
        let system_prompt = match &record.prompts.persona {
            Some(persona) if !persona.is_empty() => {
                format!("{}\n\n{persona}", record.prompts.system)
            }
            _ => record.prompts.system.clone(),
        };
        Self {
            agent_slug: record.slug.clone(),
            org_slug: record.org_slug.clone(),
            agent_type: record.agent_type.clone(),
            execution: record.execution,
            system_prompt,
            provider: record.llm.provider.clone(),
            model: record.llm.model.clone(),
            require_local_model: record.llm.require_local_model,
            metadata: record.metadata.clone(),
        }
    }
}
