use async_trait::async_trait;
use launch_model::{JobId, ResourceType};

use super::{
    Manager, ManagerContext,
    label::{label_flat, label_sagemaker},
    reconcile::{ManagerCore, ReconcileMode},
};
use crate::{error::CoreError, project::LaunchProject};

/// Hosted training platforms (SageMaker, Vertex).
///
/// The queue service arbitrates between agents directly, so this manager
/// runs on the passthrough driver and never uses the job set cache past
/// startup.
pub struct ManagedPlatformManager {
    core: ManagerCore,
}

impl ManagedPlatformManager {
    pub fn new(ctx: ManagerContext) -> Self {
        let driver = ctx.passthrough_driver();
        let auto = ctx.config.max_jobs_auto_cluster;
        Self {
            core: ManagerCore::new(ctx, driver, auto),
        }
    }
}

#[async_trait]
impl Manager for ManagedPlatformManager {
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
        match self.core.resource() {
            ResourceType::Sagemaker => label_sagemaker(project, self.core.queue_label()),
            _ => label_flat(project, self.core.queue_label()),
        }
    }

    async fn find_orphaned_jobs(&self) -> Result<Vec<JobId>, CoreError> {
        self.core.find_orphans().await
    }
}
