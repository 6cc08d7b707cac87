use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{JobId, PREEMPTING_PRIORITY, PREEMPTIBLE_PRIORITY};

/// Server-side lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Enqueued, nobody holds it.
    Pending,
    /// An agent holds an exclusive lease.
    Leased,
    /// Bound to a run identity (acked).
    Claimed,
    /// The backend confirmed execution started.
    Running,
    #[serde(alias = "FINISHED")]
    Done,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Stopped)
    }

    /// `LEASED` or `CLAIMED`: the states in which an agent owns the job.
    pub fn is_held(&self) -> bool {
        matches!(self, JobState::Leased | JobState::Claimed)
    }
}

/// A unit of work in a job set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Launch configuration, interpreted by the project/runner layer.
    #[serde(default)]
    pub run_spec: serde_json::Value,
    pub state: JobState,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub preemptible: bool,
    #[serde(default)]
    pub can_preempt: bool,
    #[serde(with = "super::time_serde")]
    pub created_at: SystemTime,
    /// Owning agent id, empty when unclaimed.
    #[serde(default)]
    pub claimed_by: String,
}

impl Job {
    /// A fresh `PENDING` job with preemption flags derived from `priority`.
    pub fn new(id: impl Into<JobId>, priority: i64, created_at: SystemTime) -> Self {
        Self {
            id: id.into(),
            run_spec: serde_json::Value::Null,
            state: JobState::Pending,
            priority,
            preemptible: priority >= PREEMPTIBLE_PRIORITY,
            can_preempt: priority <= PREEMPTING_PRIORITY,
            created_at,
            claimed_by: String::new(),
        }
    }

    pub fn with_run_spec(mut self, run_spec: serde_json::Value) -> Self {
        self.run_spec = run_spec;
        self
    }

    /// Not yet held by any agent.
    pub fn is_unowned(&self) -> bool {
        self.state == JobState::Pending && self.claimed_by.is_empty()
    }

    /// Held (`LEASED`/`CLAIMED`) by `agent_id`.
    pub fn is_owned_by(&self, agent_id: &str) -> bool {
        self.state.is_held() && self.claimed_by == agent_id
    }

    /// Whether `agent_id` may ack, fail or release this job.
    pub fn may_be_acted_on_by(&self, agent_id: &str) -> bool {
        self.claimed_by.is_empty() || self.claimed_by == agent_id
    }

    /// Milliseconds since the unix epoch, used as the ordering tie-break.
    pub fn created_at_millis(&self) -> u128 {
        self.created_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}
