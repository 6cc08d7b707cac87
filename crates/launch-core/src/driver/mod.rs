//! Strategies for obtaining the next runnable job.
//!
//! Managers only see [`QueueDriver`]; whether leasing happens against the
//! local job set cache or directly on the queue service is the driver's call.

mod passthrough;
mod standard;

pub use passthrough::PassthroughQueueDriver;
pub use standard::{StandardQueueDriver, sort_candidates};

use std::path::PathBuf;

use async_trait::async_trait;
use launch_model::{FailureStage, Job};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Leases against the locally cached job set.
    Standard,
    /// Delegates pop/ack/fail to the queue service.
    Passthrough,
}

#[async_trait]
pub trait QueueDriver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Next job this agent now exclusively holds, or `None` when nothing
    /// could be claimed (empty queue or lost lease race).
    async fn pop_next(&self) -> Result<Option<Job>, CoreError>;

    async fn ack(&self, job_id: &str, run_name: &str) -> Result<bool, CoreError>;

    async fn fail(
        &self,
        job_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError>;

    /// Jobs currently held by this agent. `active` lists the ids present in
    /// the calling manager's active-run table.
    async fn owned_items(&self, active: &[String]) -> Result<Vec<Job>, CoreError>;

    /// Drop any locally held record of `job_id` once its run is over.
    fn forget(&self, _job_id: &str) {}
}
