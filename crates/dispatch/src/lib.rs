//! Task dispatch core: routes tenant-scoped agent tasks to execution
//! strategies, enforces policy and capability gates, and manages the
//! human-approval resume round trip.

pub mod config;
pub mod gateway;
pub mod policy;
pub mod registry;
pub mod resume;
pub mod router;
pub mod stream;
pub mod traits;

/// Re-export of the dispatch configuration.
pub use config::{DEFAULT_LOCAL_PROVIDER, DEFAULT_REVIEW_MESSAGE, DispatchConfig};
/// Re-export of the gateway entry point.
pub use gateway::{ExecutionGateway, ROUTING_SHOWSTOPPER};
/// Re-export of the routing policy gate adapter.
pub use policy::RoutingPolicyGate;
/// Re-export of the runner registry.
pub use registry::{API_RUNNER_TYPE, RunnerRegistry};
/// Re-export of the approval resume flow.
pub use resume::{ApprovalResumeFlow, ResumeExecutor, ResumeOverrides};
/// Re-export of the mode router.
pub use router::{DispatchTask, ModeRouter, RECORD_UNAVAILABLE};
/// Re-export of streaming session types.
pub use stream::{StreamBroker, StreamSession};
/// Re-export of collaborator contracts.
pub use traits::{
    AgentDirectory, ApprovalStore, LifecycleEvent, LifecycleEventKind, LifecycleNotifier,
    Runner, RoutingDecider,
};
