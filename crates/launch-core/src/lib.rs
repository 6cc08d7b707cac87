pub mod error;
pub use error::CoreError;

pub mod config;
pub use config::AgentConfig;

mod system;
pub use system::{default_agent_name, host_name};

pub mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

pub mod service;
pub use service::{AgentInfo, AgentRegistration, QueueScope, QueueService};

pub mod collab;
pub use collab::{
    Builder, DiscoveredResource, MemoryTracker, MemoryTrackerFactory, ResourceLister, RunHandle,
    Runner, StatusTracker, TrackerFactory,
};

pub mod project;
pub use project::LaunchProject;

pub mod jobset;
pub use jobset::JobSet;

pub mod driver;
pub use driver::{DriverKind, PassthroughQueueDriver, QueueDriver, StandardQueueDriver};

pub mod manager;
pub use manager::{
    KubernetesManager, LocalManager, ManagedPlatformManager, Manager, ManagerContext, ManagerCore,
    ReconcileMode, SchedulerManager,
};

pub mod router;
pub use router::{Backend, BackendRouter};

pub mod registry;
pub use registry::{ManagerCtor, ManagerRegistry};

pub mod controller;
pub use controller::Controller;

pub mod agent;
pub use agent::{Agent, AgentBuilder, AgentState};
