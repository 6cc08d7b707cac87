//! Per-queue reconciliation of desired (owned) against actual (active) runs.
//!
//! [`ManagerCore`] carries the shared algorithm and the [`Manager`] trait
//! drives it; each backend manager picks a driver, a launch mode and its
//! labels.

mod active;
mod reconcile;
mod kubernetes;
mod label;
mod local;
mod managed;
mod scheduler;

pub use active::{ActiveRun, ActiveRuns};
pub use reconcile::{ManagerCore, PassPlan, ReconcileMode};
pub use kubernetes::KubernetesManager;
pub use label::{
    JOB_ID_ENV, JOB_LABEL_KEY, QUEUE_LABEL_ENV, QUEUE_LABEL_KEY, label_flat,
    label_kubernetes, label_process_env, label_sagemaker, queue_label, sanitize_label_value,
};
pub use local::{LocalManager, host_parallelism};
pub use managed::ManagedPlatformManager;
pub use scheduler::SchedulerManager;

use std::sync::{Arc, atomic::AtomicUsize};

use async_trait::async_trait;
use launch_model::{Job, JobId, ResourceType};
use tracing::warn;

use crate::{
    collab::TrackerFactory,
    config::AgentConfig,
    driver::{DriverKind, PassthroughQueueDriver, QueueDriver, StandardQueueDriver},
    error::CoreError,
    jobset::JobSet,
    metrics::MetricsHandle,
    project::LaunchProject,
    router::Backend,
    service::{QueueScope, QueueService},
};

/// Everything a manager needs for one queue.
#[derive(Clone)]
pub struct ManagerContext {
    pub agent_id: String,
    pub queue: String,
    pub resource: ResourceType,
    pub config: Arc<AgentConfig>,
    pub jobset: Arc<JobSet>,
    pub service: Arc<dyn QueueService>,
    pub backend: Backend,
    pub trackers: Arc<dyn TrackerFactory>,
    pub metrics: MetricsHandle,
    /// Active-run count published after every pass.
    pub active_gauge: Arc<AtomicUsize>,
}

impl ManagerContext {
    pub fn scope(&self) -> QueueScope {
        QueueScope {
            queue_name: self.queue.clone(),
            entity: self.config.entity.clone(),
            project: self.config.project.clone(),
            agent_id: self.agent_id.clone(),
        }
    }

    pub fn standard_driver(&self) -> Box<dyn QueueDriver> {
        Box::new(StandardQueueDriver::new(Arc::clone(&self.jobset)))
    }

    pub fn passthrough_driver(&self) -> Box<dyn QueueDriver> {
        Box::new(PassthroughQueueDriver::new(
            self.scope(),
            Arc::clone(&self.service),
        ))
    }
}

/// A resource-specific reconciler owned by one controller task.
#[async_trait]
pub trait Manager: Send + Sync {
    fn core(&self) -> &ManagerCore;

    fn core_mut(&mut self) -> &mut ManagerCore;

    /// How new work enters a pass.
    fn reconcile_mode(&self) -> ReconcileMode;

    /// Attach this backend's discoverability labels.
    fn label_job(&self, project: &mut LaunchProject);

    /// One pass: bring active runs in line with owned jobs.
    async fn reconcile(&mut self) -> Result<(), CoreError> {
        let mode = self.reconcile_mode();
        let plan = self.core_mut().plan(mode).await?;
        for job in plan.launch {
            launch_logged(&mut *self, job).await;
        }
        if mode == ReconcileMode::Batch {
            loop {
                let Some(job) = self.core().next_batch_job(plan.cap).await else {
                    break;
                };
                if !launch_logged(&mut *self, job).await {
                    break;
                }
            }
        }
        self.core().publish_active();
        Ok(())
    }

    /// Resolve, label and start one job.
    async fn launch_item(&mut self, job: Job) -> Result<(), CoreError> {
        let mut project = self.core_mut().prepare(&job).await?;
        self.label_job(&mut project);
        self.core_mut().start(job, project).await
    }

    /// Ids of backend resources carrying this queue's label that this
    /// manager does not track.
    async fn find_orphaned_jobs(&self) -> Result<Vec<JobId>, CoreError> {
        Err(CoreError::OrphanDiscoveryUnsupported(self.resource()))
    }

    /// Forget an active run. Absent ids are a no-op.
    fn release_item(&mut self, job_id: &str) {
        self.core_mut().release_item(job_id);
    }

    /// Called once when the owning controller stops.
    async fn teardown(&mut self) {}

    fn resource(&self) -> ResourceType {
        self.core().resource()
    }

    fn driver_kind(&self) -> DriverKind {
        self.core().driver_kind()
    }

    fn active_job_ids(&self) -> Vec<JobId> {
        self.core().active().ids()
    }
}

/// Launch through the manager and report whether the job is now active.
async fn launch_logged<M: Manager + ?Sized>(manager: &mut M, job: Job) -> bool {
    let id = job.id.clone();
    match manager.launch_item(job).await {
        Ok(()) => manager.core().active().contains(&id),
        Err(e) => {
            warn!(job = %id, error = %e, "launch failed");
            false
        }
    }
}
