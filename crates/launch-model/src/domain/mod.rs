mod job;
pub use job::{Job, JobState};

mod jobset;
pub use jobset::{JobSetDiff, JobSetInfo, JobSetMetadata};

mod concurrency;
pub use concurrency::MaxConcurrency;

mod prioritization;
pub use prioritization::PrioritizationMode;

mod stage;
pub use stage::FailureStage;

mod agent_status;
pub use agent_status::AgentStatus;

mod run_state;
pub use run_state::RunState;

pub(crate) mod time_serde;

/// Opaque job identifier, unique within a job set.
pub type JobId = String;

/// Priority value at or above which a job may be preempted.
pub const PREEMPTIBLE_PRIORITY: i64 = 3;

/// Priority value at or below which a job may preempt others.
pub const PREEMPTING_PRIORITY: i64 = 0;
