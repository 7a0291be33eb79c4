//! Runner registry: name → execution strategy lookup table.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::traits::Runner;

/// Agent type string of the fixed runner owning all HITL state operations.
pub const API_RUNNER_TYPE: &str = "api";

/// Registry of execution strategies keyed by agent type string.
///
/// Populated once at process start with `&mut self`, then shared as
/// `Arc<RunnerRegistry>` and treated as read-only, which makes concurrent
/// lookups safe without locking.
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    /// Registers a runner for an agent type. Re-registering an existing type
    /// is allowed (last write wins) but logged, since it usually means a
    /// test double or a deployment-time override.
    pub fn register(&mut self, runner_type: impl Into<String>, runner: Arc<dyn Runner>) {
        let runner_type = runner_type.into();
        if self.runners.contains_key(&runner_type) {
            warn!("Replacing registered runner for type: {runner_type}");
        } else {
            debug!("Registering runner for type: {runner_type}");
        }
        self.runners.insert(runner_type, runner);
    }

    /// Looks up the runner for an agent type. Returns `None` rather than
    /// failing; the mode router is the single place that turns a missing
    /// runner into a user-facing failure.
    pub fn get(&self, runner_type: &str) -> Option<Arc<dyn Runner>> {
        self.runners.get(runner_type).map(Arc::clone)
    }

    /// Whether a runner is registered for the given type.
    pub fn has(&self, runner_type: &str) -> bool {
        self.runners.contains_key(runner_type)
    }

    /// Returns the registered type strings, sorted.
    pub fn runner_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
