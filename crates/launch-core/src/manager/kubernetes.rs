use async_trait::async_trait;
use launch_model::JobId;

use super::{
    Manager, ManagerContext,
    label::label_kubernetes,
    reconcile::{ManagerCore, ReconcileMode},
};
use crate::{error::CoreError, project::LaunchProject};

/// Cluster jobs leased from the local job set, one new lease per pass.
pub struct KubernetesManager {
    core: ManagerCore,
}

impl KubernetesManager {
    pub fn new(ctx: ManagerContext) -> Self {
        let driver = ctx.standard_driver();
        let auto = ctx.config.max_jobs_auto_cluster;
        Self {
            core: ManagerCore::new(ctx, driver, auto),
        }
    }
}

#[async_trait]
impl Manager for KubernetesManager {
    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ManagerCore {
        &mut self.core
    }

    fn reconcile_mode(&self) -> ReconcileMode {
        ReconcileMode::OnePerTick
    }

    fn label_job(&self, project: &mut LaunchProject) {
        label_kubernetes(project, self.core.queue_label());
    }

    async fn find_orphaned_jobs(&self) -> Result<Vec<JobId>, CoreError> {
        self.core.find_orphans().await
    }
}
