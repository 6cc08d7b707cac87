use async_trait::async_trait;
use super::{
    Manager, ManagerContext,
    label::label_flat,
    reconcile::{ManagerCore, ReconcileMode},
};
use crate::project::LaunchProject;

/// Nested schedulers (sweeps) that enqueue their own work.
///
/// Pops straight from the run queue and starts as many as fit in one pass.
pub struct SchedulerManager {
    core: ManagerCore,
}

impl SchedulerManager {
    pub fn new(ctx: ManagerContext) -> Self {
        let driver = ctx.passthrough_driver();
        let auto = ctx.config.max_jobs_auto_cluster;
        Self {
            core: ManagerCore::new(ctx, driver, auto),
        }
    }
}

#[async_trait]
impl Manager for SchedulerManager {
    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ManagerCore {
        &mut self.core
    }

    fn reconcile_mode(&self) -> ReconcileMode {
        ReconcileMode::Batch
    }

    fn label_job(&self, project: &mut LaunchProject) {
        label_flat(project, self.core.queue_label());
    }

}
