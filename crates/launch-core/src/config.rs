use std::time::Duration;

use serde_json::Value;

use crate::error::CoreError;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Agent-wide settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Entity (team or user) owning the queues.
    pub entity: String,
    /// Project runs are sent to.
    pub project: String,
    /// Queue names to serve.
    pub queues: Vec<String>,
    /// Interval between job set diff fetches.
    pub sync_interval: Duration,
    /// Interval between controller reconcile passes.
    pub reconcile_interval: Duration,
    /// Interval of the agent's own status poll.
    pub poll_interval: Duration,
    /// What `max_concurrency = "auto"` means for cluster and managed backends.
    pub max_jobs_auto_cluster: usize,
    /// Per-resource default `resource_args`, keyed by resource name.
    pub queue_defaults: Value,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            entity: String::new(),
            project: String::new(),
            queues: Vec::new(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_jobs_auto_cluster: 32,
            queue_defaults: Value::Null,
        }
    }
}

impl AgentConfig {
    pub fn new(entity: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            project: project.into(),
            ..Default::default()
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queues.push(queue.into());
        self
    }

    pub fn with_intervals(mut self, sync: Duration, reconcile: Duration, poll: Duration) -> Self {
        self.sync_interval = sync;
        self.reconcile_interval = reconcile;
        self.poll_interval = poll;
        self
    }

    /// Default `resource_args` block for one resource, if configured.
    pub fn defaults_for(&self, resource: &str) -> Option<&Value> {
        self.queue_defaults.get(resource).filter(|v| !v.is_null())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entity.trim().is_empty() {
            return Err(CoreError::Config("entity must not be empty".into()));
        }
        if self.queues.is_empty() {
            return Err(CoreError::Config("at least one queue is required".into()));
        }
        if self.queues.iter().any(|q| q.trim().is_empty()) {
            return Err(CoreError::Config("queue names must not be empty".into()));
        }
        for (name, interval) in [
            ("sync_interval", self.sync_interval),
            ("reconcile_interval", self.reconcile_interval),
            ("poll_interval", self.poll_interval),
        ] {
            if interval.is_zero() {
                return Err(CoreError::Config(format!("{name} must be positive")));
            }
        }
        if !self.queue_defaults.is_null() && !self.queue_defaults.is_object() {
            return Err(CoreError::Config(
                "queue_defaults must be an object keyed by resource".into(),
            ));
        }
        Ok(())
    }
}
