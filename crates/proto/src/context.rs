use serde::{Deserialize, Serialize};

/// Correlation identifier that distinguishes "never set" from a real value.
///
/// Historical records may predate a field's introduction; such fields are
/// reconstructed as [`RecordId::nil`] rather than an empty string, so
/// round-trips can tell "never set" apart from "intentionally empty".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Option<String>);

impl RecordId {
    /// Creates an identifier holding the given value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    /// The sentinel "never set" identifier.
    pub fn nil() -> Self {
        Self(None)
    }

    /// Returns `true` when this identifier was never set.
    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the raw value, or `None` for the nil sentinel.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "nil"),
        }
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(Some(s))
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(Some(s.to_string()))
    }
}

impl From<Option<String>> for RecordId {
    fn from(s: Option<String>) -> Self {
        Self(s)
    }
}

/// Identity capsule threaded through every dispatch.
///
/// Constructed once per request and treated as immutable afterwards. Absent
/// correlation fields hold [`RecordId::nil`], never a partially filled
/// struct, so downstream code can rely on presence checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Tenant/organization slug owning the request.
    pub org_slug: String,
    /// Target agent slug.
    pub agent_slug: String,
    /// Acting user, when resolvable from the caller's identity.
    #[serde(default)]
    pub user_id: RecordId,
    /// Conversation this task belongs to.
    #[serde(default)]
    pub conversation_id: RecordId,
    /// Task record identifier.
    #[serde(default)]
    pub task_id: RecordId,
    /// Plan record identifier.
    #[serde(default)]
    pub plan_id: RecordId,
    /// Deliverable record identifier.
    #[serde(default)]
    pub deliverable_id: RecordId,
    /// Agent record identifier (distinct from the slug).
    #[serde(default)]
    pub agent_id: RecordId,
    /// Agent type hint, when already known to the caller.
    #[serde(default)]
    pub agent_type: Option<String>,
    /// Declared LLM provider hint.
    #[serde(default)]
    pub provider: Option<String>,
    /// Declared LLM model hint.
    #[serde(default)]
    pub model: Option<String>,
}

impl ExecutionContext {
    /// Creates a context for the given tenant/agent with all correlation
    /// identifiers set to the nil sentinel.
    pub fn new(org_slug: impl Into<String>, agent_slug: impl Into<String>) -> Self {
        Self {
            org_slug: org_slug.into(),
            agent_slug: agent_slug.into(),
            user_id: RecordId::nil(),
            conversation_id: RecordId::nil(),
            task_id: RecordId::nil(),
            plan_id: RecordId::nil(),
            deliverable_id: RecordId::nil(),
            agent_id: RecordId::nil(),
            agent_type: None,
            provider: None,
            model: None,
        }
    }

    /// Sets the acting user identifier.
    pub fn with_user(mut self, user_id: RecordId) -> Self {
        self.user_id = user_id;
        self
    }

    /// Sets the conversation identifier.
    pub fn with_conversation(mut self, conversation_id: RecordId) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    /// Sets the task identifier.
    pub fn with_task(mut self, task_id: RecordId) -> Self {
        self.task_id = task_id;
        self
    }

    /// Sets the plan identifier.
    pub fn with_plan(mut self, plan_id: RecordId) -> Self {
        self.plan_id = plan_id;
        self
    }

    /// Sets the declared provider hint.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the declared model hint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_record_id_is_distinguishable_from_empty_string() {
        let never_set = RecordId::nil();
        let intentionally_empty = RecordId::new("");

        assert!(never_set.is_nil());
        assert!(!intentionally_empty.is_nil());
        assert_ne!(never_set, intentionally_empty);
        assert_eq!(intentionally_empty.as_str(), Some(""));
    }

    #[test]
    fn record_id_serde_round_trip_preserves_nil() {
        let nil = RecordId::nil();
        let json = serde_json::to_string(&nil).expect("serialize");
        assert_eq!(json, "null");

        let back: RecordId = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_nil());

        let set = RecordId::new("conv-1");
        let json = serde_json::to_string(&set).expect("serialize");
        let back: RecordId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.as_str(), Some("conv-1"));
    }

    #[test]
    fn new_context_has_nil_correlation_fields() {
        let ctx = ExecutionContext::new("acme", "hr-agent");

        assert_eq!(ctx.org_slug, "acme");
        assert_eq!(ctx.agent_slug, "hr-agent");
        assert!(ctx.user_id.is_nil());
        assert!(ctx.conversation_id.is_nil());
        assert!(ctx.task_id.is_nil());
        assert!(ctx.plan_id.is_nil());
        assert!(ctx.deliverable_id.is_nil());
        assert_eq!(ctx.provider, None);
    }

    #[test]
    fn builder_methods_set_fields() {
        let ctx = ExecutionContext::new("acme", "hr-agent")
            .with_user(RecordId::new("u1"))
            .with_conversation(RecordId::new("c1"))
            .with_provider("local");

        assert_eq!(ctx.user_id.as_str(), Some("u1"));
        assert_eq!(ctx.conversation_id.as_str(), Some("c1"));
        assert_eq!(ctx.provider.as_deref(), Some("local"));
    }

    #[test]
    fn context_deserializes_with_missing_optional_fields() {
        let ctx: ExecutionContext =
            serde_json::from_str(r#"{"orgSlug":"acme","agentSlug":"hr-agent"}"#)
                .expect("deserialize");
        assert!(ctx.conversation_id.is_nil());
        assert_eq!(ctx.agent_type, None);
    }
}
