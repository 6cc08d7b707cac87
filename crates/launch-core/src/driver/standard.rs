use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use launch_model::{FailureStage, Job, JobState, PrioritizationMode};
use tracing::{debug, instrument, warn};

use super::{DriverKind, QueueDriver};
use crate::{
    error::CoreError,
    jobset::{JobSet, wait_for_next},
};

/// Leases jobs from the local job set cache.
///
/// A won lease is only trusted once a later sync shows the job has left the
/// unowned pool and is held by this agent.
pub struct StandardQueueDriver {
    jobset: Arc<JobSet>,
}

impl StandardQueueDriver {
    pub fn new(jobset: Arc<JobSet>) -> Self {
        Self { jobset }
    }
}

/// Order candidates most-urgent first.
pub fn sort_candidates(jobs: &mut [Job], mode: PrioritizationMode) {
    match mode {
        PrioritizationMode::V0 => jobs.sort_by(|a, b| {
            (a.priority, a.created_at, &a.id).cmp(&(b.priority, b.created_at, &b.id))
        }),
        PrioritizationMode::Disabled => {
            jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
        }
    }
}

#[async_trait]
impl QueueDriver for StandardQueueDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Standard
    }

    #[instrument(level = "debug", skip(self), fields(jobset = %self.jobset.name()))]
    async fn pop_next(&self) -> Result<Option<Job>, CoreError> {
        let mode = self.jobset.metadata().await.prioritization_mode;
        let mut candidates = self.jobset.unowned_jobs().await;
        sort_candidates(&mut candidates, mode);

        let Some(candidate) = candidates.into_iter().next() else {
            return Ok(None);
        };

        let mut updates = self.jobset.updates();
        if !self.jobset.lease(&candidate.id).await? {
            debug!(job = %candidate.id, "lease not granted");
            return Ok(None);
        }

        wait_for_next(&self.jobset, &mut updates).await?;

        match self.jobset.job(&candidate.id).await {
            Some(job) if job.is_owned_by(self.jobset.agent_id()) => {
                debug!(job = %job.id, state = ?job.state, "lease confirmed");
                Ok(Some(job))
            }
            Some(job) if job.is_unowned() => {
                warn!(job = %job.id, "leased job still unowned after refresh; not claiming");
                Ok(None)
            }
            Some(job) => {
                debug!(job = %job.id, owner = %job.claimed_by, state = ?job.state, "job not held by this agent after refresh");
                Ok(None)
            }
            None => {
                debug!(job = %candidate.id, "leased job left the job set");
                Ok(None)
            }
        }
    }

    async fn ack(&self, job_id: &str, run_name: &str) -> Result<bool, CoreError> {
        self.jobset.ack(job_id, run_name).await
    }

    async fn fail(
        &self,
        job_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError> {
        self.jobset.fail(job_id, message, stage, file_paths).await
    }

    /// Held jobs plus active runs the service already reports `RUNNING`
    /// under this agent, so a started run is not mistaken for a released one.
    async fn owned_items(&self, active: &[String]) -> Result<Vec<Job>, CoreError> {
        let agent = self.jobset.agent_id();
        let jobs = self.jobset.jobs().await;
        Ok(jobs
            .into_values()
            .filter(|j| {
                j.is_owned_by(agent)
                    || (j.state == JobState::Running
                        && j.claimed_by == agent
                        && active.iter().any(|id| id == &j.id))
            })
            .collect())
    }
}
