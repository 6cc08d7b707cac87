use std::{num::NonZeroUsize, thread};

use async_trait::async_trait;
use launch_model::ResourceType;
use tracing::info;

use super::{
    Manager, ManagerContext,
    label::{label_flat, label_process_env},
    reconcile::{ManagerCore, ReconcileMode},
};
use crate::project::LaunchProject;

/// Processes and containers on this host.
///
/// Fills every free slot per pass and kills what it started when the
/// controller stops.
pub struct LocalManager {
    core: ManagerCore,
}

impl LocalManager {
    pub fn new(ctx: ManagerContext) -> Self {
        let driver = ctx.standard_driver();
        Self {
            core: ManagerCore::new(ctx, driver, host_parallelism()),
        }
    }
}

/// `auto` concurrency for local backends.
pub fn host_parallelism() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[async_trait]
impl Manager for LocalManager {
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
        match self.core.resource() {
            ResourceType::LocalProcess => label_process_env(project, self.core.queue_label()),
            _ => label_flat(project, self.core.queue_label()),
        }
    }

    async fn teardown(&mut self) {
        let live = self.core.active().len();
        if live > 0 {
            info!(queue = %self.core.context().queue, runs = live, "stopping local runs");
        }
        self.core.cancel_all().await;
    }
}
