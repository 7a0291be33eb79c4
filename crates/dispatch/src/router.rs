//! Mode router: picks the execution strategy for a hydrated dispatch.

use std::sync::Arc;

use proto::{
    AgentRuntimeDefinition, DispatchError, ExecutionContext, HitlMethod, Result,
    SYSTEM_AGENT_SLUG, TaskRequest, TaskResponse,
};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::DispatchConfig;
use crate::registry::{API_RUNNER_TYPE, RunnerRegistry};
use crate::traits::AgentDirectory;

/// Failure reason returned when no agent record can be hydrated.
pub const RECORD_UNAVAILABLE: &str = "Agent record unavailable for execution";

/// A dispatch bundle handed to the router
#[derive(Debug)]
pub struct DispatchTask {
    /// Identity capsule for this dispatch.
    pub context: ExecutionContext,
    /// Pre-built definition, when the gateway already resolved the agent.
    pub definition: Option<AgentRuntimeDefinition>,
    /// The request to execute.
    pub request: TaskRequest,
    /// Routing metadata gathered by the policy gate, merged into the request
    /// metadata before the runner sees it.
    pub routing_metadata: Map<String, Value>,
}

impl DispatchTask {
    /// Creates a task without a pre-built definition or routing metadata.
    pub fn new(context: ExecutionContext, request: TaskRequest) -> Self {
        Self {
            context,
            definition: None,
            request,
            routing_metadata: Map::new(),
        }
    }
}

/// Routes a hydrated dispatch to the right runner
pub struct ModeRouter {
    directory: Arc<dyn AgentDirectory>,
    registry: Arc<RunnerRegistry>,
    config: Arc<DispatchConfig>,
}

impl ModeRouter {
    /// Creates a router over the given directory, registry, and config.
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        registry: Arc<RunnerRegistry>,
        config: Arc<DispatchConfig>,
    ) -> Self {
        Self {
            directory,
            registry,
            config,
        }
    }

    /// Executes the dispatch: HITL method calls branch to the HITL
    /// sub-router; everything else resolves a runner by agent type.
    pub async fn execute(&self, task: DispatchTask) -> Result<TaskResponse> {
        if let Some(method) = task.request.hitl_method()? {
            return self.route_hitl(task, method).await;
        }

        let definition = match task.definition {
            Some(definition) => definition,
            None => match self.hydrate(&task.context).await? {
                Some(definition) => definition,
                None => return Ok(TaskResponse::failure(task.request.mode, RECORD_UNAVAILABLE)),
            },
        };

        self.enforce_sovereignty(&definition, &task.request)?;

        let runner = self.registry.get(&definition.agent_type).ok_or_else(|| {
            error!(
                "No runner available for agent type: {}",
                definition.agent_type
            );
            DispatchError::RunnerMissing(definition.agent_type.clone())
        })?;

        let request = merge_routing_metadata(task.request, task.routing_metadata);
        debug!(
            agent = %definition.agent_slug,
            runner = %definition.agent_type,
            "Dispatching to runner"
        );
        runner
            .execute(Some(&definition), &request, &task.context.org_slug)
            .await
    }

    /// HITL method calls always land on the fixed `api` runner: HITL state
    /// lives in one place regardless of which runner produced the pause.
    async fn route_hitl(&self, task: DispatchTask, method: HitlMethod) -> Result<TaskResponse> {
        let runner = self
            .registry
            .get(API_RUNNER_TYPE)
            .ok_or_else(|| {
                error!("HITL dispatch requires the '{API_RUNNER_TYPE}' runner");
                DispatchError::RunnerMissing(API_RUNNER_TYPE.to_string())
            })?;

        let mut request = merge_routing_metadata(task.request, task.routing_metadata);
        request.insert_payload(
            "hitlMethod",
            Value::String(method.as_method_str().to_string()),
        );

        // Pending-approval queries are cross-agent; this is the only path
        // that dispatches without a concrete agent record.
        let cross_agent = method == HitlMethod::Pending
            || task.context.agent_slug == SYSTEM_AGENT_SLUG;
        if cross_agent {
            return runner.execute(None, &request, &task.context.org_slug).await;
        }

        let definition = match task.definition {
            Some(definition) => Some(definition),
            None => self.hydrate(&task.context).await?,
        };
        let Some(definition) = definition else {
            return Ok(TaskResponse::failure(request.mode, RECORD_UNAVAILABLE));
        };

        runner
            .execute(Some(&definition), &request, &task.context.org_slug)
            .await
    }

    /// Resolves the agent record and builds its runtime definition.
    async fn hydrate(&self, context: &ExecutionContext) -> Result<Option<AgentRuntimeDefinition>> {
        if context.agent_slug.is_empty() {
            return Ok(None);
        }
        let record = self
            .directory
            .get_agent(&context.org_slug, &context.agent_slug)
            .await?;
        Ok(record.map(|r| AgentRuntimeDefinition::from_record(&r)))
    }

    /// Sovereign-mode compliance rule: a `require_local_model` agent may only
    /// declare the designated local provider.
    fn enforce_sovereignty(
        &self,
        definition: &AgentRuntimeDefinition,
        request: &TaskRequest,
    ) -> Result<()> {
        if definition.require_local_model
            && let Some(provider) = request.provider_hint()
            && provider != self.config.local_model_provider
        {
            return Err(DispatchError::ComplianceViolation {
                agent_slug: definition.agent_slug.clone(),
                provider: provider.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Merges policy-gate metadata into the request's metadata bag. The bag's own
/// entries win on key collision: caller metadata outranks gate observability.
fn merge_routing_metadata(
    mut request: TaskRequest,
    routing_metadata: Map<String, Value>,
) -> TaskRequest {
    if routing_metadata.is_empty() {
        return request;
    }
    if let Value::Object(bag) = &mut request.metadata {
        for (key, value) in routing_metadata {
            bag.entry(key).or_insert(value);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use proto::{AgentPrompts, AgentRecord, Error, ExecutionFlags, LlmDefaults, TaskMode};
    use serde_json::json;

    use super::*;
    use crate::traits::Runner;

    struct FixedDirectory {
        record: Option<AgentRecord>,
    }

    #[async_trait]
    impl AgentDirectory for FixedDirectory {
        async fn get_agent(
            &self,
            _org_slug: &str,
            agent_slug: &str,
        ) -> Result<Option<AgentRecord>> {
            Ok(self
                .record
                .clone()
                .filter(|record| record.slug == agent_slug))
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(Option<String>, TaskRequest)>>,
    }

    #[async_trait]
    impl Runner for RecordingRunner {
        async fn execute(
            &self,
            definition: Option<&AgentRuntimeDefinition>,
            request: &TaskRequest,
            _org_slug: &str,
        ) -> Result<TaskResponse> {
            self.calls.lock().expect("calls lock").push((
                definition.map(|d| d.agent_slug.clone()),
                request.clone(),
            ));
            Ok(TaskResponse::ok(request.mode, json!({"handled": true})))
        }
    }

    fn sample_record(require_local: bool) -> AgentRecord {
        AgentRecord {
            slug: "hr-agent".to_string(),
            org_slug: "acme".to_string(),
            name: "HR Agent".to_string(),
            agent_type: "context".to_string(),
            execution: ExecutionFlags {
                can_converse: true,
                can_plan: true,
                can_build: true,
            },
            prompts: AgentPrompts::default(),
            llm: LlmDefaults {
                provider: None,
                model: None,
                require_local_model: require_local,
            },
            metadata: Map::new(),
        }
    }

    struct Fixture {
        router: ModeRouter,
        context_runner: Arc<RecordingRunner>,
        api_runner: Arc<RecordingRunner>,
    }

    fn fixture(record: Option<AgentRecord>) -> Fixture {
        let context_runner = Arc::new(RecordingRunner::default());
        let api_runner = Arc::new(RecordingRunner::default());

        let mut registry = RunnerRegistry::new();
        registry.register("context", context_runner.clone());
        registry.register(API_RUNNER_TYPE, api_runner.clone());

        let router = ModeRouter::new(
            Arc::new(FixedDirectory { record }),
            Arc::new(registry),
            Arc::new(DispatchConfig::default()),
        );
        Fixture {
            router,
            context_runner,
            api_runner,
        }
    }

    fn request(mode: TaskMode) -> TaskRequest {
        TaskRequest::new(mode, ExecutionContext::new("acme", "hr-agent"), "hello")
    }

    #[tokio::test]
    async fn dispatches_to_runner_for_agent_type() {
        let fixture = fixture(Some(sample_record(false)));
        let task = DispatchTask::new(
            ExecutionContext::new("acme", "hr-agent"),
            request(TaskMode::Converse),
        );

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);

        let calls = fixture.context_runner.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("hr-agent"));
    }

    #[tokio::test]
    async fn missing_record_returns_unavailable_failure() {
        let fixture = fixture(None);
        let task = DispatchTask::new(
            ExecutionContext::new("acme", "hr-agent"),
            request(TaskMode::Converse),
        );

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(!resp.success);
        assert_eq!(resp.reason(), Some(RECORD_UNAVAILABLE));
        assert!(fixture.context_runner.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn missing_runner_is_a_configuration_error() {
        let mut record = sample_record(false);
        record.agent_type = "unregistered".to_string();
        let fixture = fixture(Some(record));
        let task = DispatchTask::new(
            ExecutionContext::new("acme", "hr-agent"),
            request(TaskMode::Converse),
        );

        let err = fixture
            .router
            .execute(task)
            .await
            .expect_err("missing runner should fail");
        match err {
            Error::Dispatch(DispatchError::RunnerMissing(runner_type)) => {
                assert_eq!(runner_type, "unregistered")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn sovereign_agent_rejects_foreign_provider_before_any_runner() {
        let fixture = fixture(Some(sample_record(true)));
        let mut req = request(TaskMode::Converse);
        req.context.provider = Some("openai".to_string());
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let err = fixture
            .router
            .execute(task)
            .await
            .expect_err("foreign provider should be rejected");
        match err {
            Error::Dispatch(DispatchError::ComplianceViolation { provider, .. }) => {
                assert_eq!(provider, "openai")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fixture.context_runner.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn sovereign_agent_accepts_local_provider() {
        let fixture = fixture(Some(sample_record(true)));
        let mut req = request(TaskMode::Converse);
        req.context.provider = Some("local".to_string());
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);
    }

    #[tokio::test]
    async fn hitl_pending_dispatches_api_runner_without_definition() {
        // No record configured: pending must not attempt a lookup.
        let fixture = fixture(None);
        let mut req = request(TaskMode::Hitl);
        req.insert_payload("method", json!("hitl.pending"));
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);

        let calls = fixture.api_runner.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, None, "no definition on the pending path");
        assert_eq!(calls[0].1.payload["hitlMethod"], "hitl.pending");
    }

    #[tokio::test]
    async fn system_slug_dispatches_api_runner_without_lookup() {
        let fixture = fixture(None);
        let mut req = TaskRequest::new(
            TaskMode::Hitl,
            ExecutionContext::new("acme", SYSTEM_AGENT_SLUG),
            "",
        );
        req.insert_payload("method", json!("hitl.status"));
        let task = DispatchTask::new(ExecutionContext::new("acme", SYSTEM_AGENT_SLUG), req);

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);
        let calls = fixture.api_runner.calls.lock().expect("calls lock");
        assert_eq!(calls[0].0, None);
    }

    #[tokio::test]
    async fn hitl_resume_forces_api_runner_with_hydrated_definition() {
        // Agent type is "context" but HITL must land on the api runner.
        let fixture = fixture(Some(sample_record(false)));
        let mut req = request(TaskMode::Hitl);
        req.insert_payload("method", json!("hitl.resume"));
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);

        assert!(fixture.context_runner.calls.lock().expect("lock").is_empty());
        let calls = fixture.api_runner.calls.lock().expect("calls lock");
        assert_eq!(calls[0].0.as_deref(), Some("hr-agent"));
        assert_eq!(calls[0].1.payload["hitlMethod"], "hitl.resume");
    }

    #[tokio::test]
    async fn hitl_without_api_runner_is_fatal() {
        let context_runner = Arc::new(RecordingRunner::default());
        let mut registry = RunnerRegistry::new();
        registry.register("context", context_runner);
        let router = ModeRouter::new(
            Arc::new(FixedDirectory {
                record: Some(sample_record(false)),
            }),
            Arc::new(registry),
            Arc::new(DispatchConfig::default()),
        );

        let mut req = request(TaskMode::Hitl);
        req.insert_payload("method", json!("hitl.pending"));
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let err = router.execute(task).await.expect_err("should fail");
        match err {
            Error::Dispatch(DispatchError::RunnerMissing(runner_type)) => {
                assert_eq!(runner_type, API_RUNNER_TYPE)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn routing_metadata_merges_without_clobbering_caller_keys() {
        let fixture = fixture(Some(sample_record(false)));
        let mut req = request(TaskMode::Converse);
        req.insert_metadata("origin", json!("caller"));

        let mut routing_metadata = Map::new();
        routing_metadata.insert("origin".to_string(), json!("gate"));
        routing_metadata.insert("riskTier".to_string(), json!("low"));

        let task = DispatchTask {
            context: ExecutionContext::new("acme", "hr-agent"),
            definition: None,
            request: req,
            routing_metadata,
        };

        fixture.router.execute(task).await.expect("dispatch");

        let calls = fixture.context_runner.calls.lock().expect("calls lock");
        let seen = &calls[0].1.metadata;
        assert_eq!(seen["origin"], "caller");
        assert_eq!(seen["riskTier"], "low");
    }

    #[tokio::test]
    async fn prebuilt_definition_skips_directory_lookup() {
        // Directory is empty; the pre-built definition must carry the task.
        let fixture = fixture(None);
        let definition = AgentRuntimeDefinition::from_record(&sample_record(false));
        let task = DispatchTask {
            context: ExecutionContext::new("acme", "hr-agent"),
            definition: Some(definition),
            request: request(TaskMode::Converse),
            routing_metadata: Map::new(),
        };

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(resp.success);
    }

    #[tokio::test]
    async fn empty_agent_slug_is_record_unavailable() {
        let fixture = fixture(Some(sample_record(false)));
        let context = ExecutionContext::new("acme", "");
        let req = TaskRequest::new(TaskMode::Converse, context.clone(), "hello");
        let task = DispatchTask::new(context, req);

        let resp = fixture.router.execute(task).await.expect("dispatch");
        assert!(!resp.success);
        assert_eq!(resp.reason(), Some(RECORD_UNAVAILABLE));
    }

    #[tokio::test]
    async fn unknown_hitl_method_surfaces_proto_error() {
        let fixture = fixture(Some(sample_record(false)));
        let mut req = request(TaskMode::Hitl);
        req.insert_payload("method", json!("hitl.reboot"));
        let task = DispatchTask::new(ExecutionContext::new("acme", "hr-agent"), req);

        let err = fixture.router.execute(task).await.expect_err("should fail");
        assert!(err.to_string().contains("Invalid HITL method"));
    }
}
