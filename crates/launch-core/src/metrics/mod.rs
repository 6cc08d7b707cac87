//! Metrics seam between the launch core and a concrete backend.
//!
//! The core only reports events; exporting is the backend's business
//! (see `launch-prometheus`).

use std::sync::Arc;

use launch_model::{FailureStage, ResourceType};

pub type MetricsHandle = Arc<dyn MetricsBackend>;

pub trait MetricsBackend: Send + Sync + 'static {
    /// A job set applied a diff.
    fn record_sync(&self, queue: &str, version: u64);
    /// A lease attempt finished.
    fn record_lease(&self, queue: &str, granted: bool);
    /// A run was started by a manager.
    fn record_launch(&self, queue: &str, resource: ResourceType);
    /// A job was reported failed.
    fn record_failure(&self, queue: &str, stage: FailureStage);
    /// Current size of a manager's active-run table.
    fn set_active_runs(&self, queue: &str, count: usize);
}

/// Backend that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_sync(&self, _queue: &str, _version: u64) {}
    fn record_lease(&self, _queue: &str, _granted: bool) {}
    fn record_launch(&self, _queue: &str, _resource: ResourceType) {}
    fn record_failure(&self, _queue: &str, _stage: FailureStage) {}
    fn set_active_runs(&self, _queue: &str, _count: usize) {}
}

impl NoopMetrics {
    pub fn handle() -> MetricsHandle {
        Arc::new(NoopMetrics)
    }
}
