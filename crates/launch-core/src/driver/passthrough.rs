use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use launch_model::{FailureStage, Job, JobId};
use tracing::{debug, instrument, warn};

use super::{DriverKind, QueueDriver};
use crate::{
    error::CoreError,
    service::{QueueScope, QueueService},
};

/// Delegates pop/ack/fail straight to the queue service.
///
/// Used where only the server can arbitrate fairly between agents. Held jobs
/// are remembered locally from the pop onward and re-checked against the
/// service on every `owned_items` call.
pub struct PassthroughQueueDriver {
    scope: QueueScope,
    service: Arc<dyn QueueService>,
    held: Mutex<HashMap<JobId, Job>>,
}

impl PassthroughQueueDriver {
    pub fn new(scope: QueueScope, service: Arc<dyn QueueService>) -> Self {
        Self {
            scope,
            service,
            held: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> &QueueScope {
        &self.scope
    }

    fn held(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueueDriver for PassthroughQueueDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Passthrough
    }

    #[instrument(level = "debug", skip(self), fields(queue = %self.scope.queue_name))]
    async fn pop_next(&self) -> Result<Option<Job>, CoreError> {
        let popped = self.service.pop_from_run_queue(&self.scope).await?;
        if let Some(job) = &popped {
            debug!(job = %job.id, "popped from run queue");
            self.held().insert(job.id.clone(), job.clone());
        }
        Ok(popped)
    }

    async fn ack(&self, job_id: &str, run_name: &str) -> Result<bool, CoreError> {
        self.service
            .ack_run_queue_item(&self.scope, job_id, run_name)
            .await
    }

    async fn fail(
        &self,
        job_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError> {
        let failed = self
            .service
            .fail_run_queue_item(job_id, message, stage, file_paths)
            .await?;
        self.held().remove(job_id);
        Ok(failed)
    }

    async fn owned_items(&self, active: &[String]) -> Result<Vec<Job>, CoreError> {
        for id in active {
            match self.service.get_run_queue_item(&self.scope, id).await {
                Ok(Some(job)) if job.state.is_terminal() => {
                    debug!(job = %id, state = ?job.state, "run queue item finished");
                    self.held().remove(id);
                }
                Ok(Some(job)) => {
                    self.held().insert(id.clone(), job);
                }
                Ok(None) => {
                    debug!(job = %id, "run queue item no longer exists");
                    self.held().remove(id);
                }
                Err(e) => {
                    // Keep what we had; a flaky lookup must not release a live run.
                    warn!(job = %id, error = %e, "run queue item lookup failed");
                }
            }
        }
        Ok(self.held().values().cloned().collect())
    }

    fn forget(&self, job_id: &str) {
        self.held().remove(job_id);
    }
}
