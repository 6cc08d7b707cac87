//! Locally cached, incrementally synchronized view of one queue.
//!
//! A `JobSet` is shared between its own sync loop (the only writer) and the
//! manager/driver of the queue (readers plus lease/ack/fail callers). Readers
//! always get owned copies, so a half-applied diff is never observable.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use launch_model::{FailureStage, Job, JobId, JobSetDiff, JobSetInfo, JobSetMetadata};
use tokio::{
    sync::{Notify, RwLock, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{error::CoreError, metrics::MetricsHandle, service::QueueService};

pub struct JobSet {
    id: String,
    name: String,
    agent_id: String,
    interval: Duration,
    service: Arc<dyn QueueService>,
    metrics: MetricsHandle,

    state: RwLock<JobSetState>,

    ready: watch::Sender<bool>,
    updated: watch::Sender<u64>,
    done: watch::Sender<bool>,
    poll_now: Notify,
    shutdown: CancellationToken,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

struct JobSetState {
    /// Last applied diff version; `None` until the first sync.
    version: Option<u64>,
    metadata: JobSetMetadata,
    jobs: HashMap<JobId, Job>,
}

impl JobSet {
    pub fn new(
        info: JobSetInfo,
        agent_id: impl Into<String>,
        interval: Duration,
        service: Arc<dyn QueueService>,
        metrics: MetricsHandle,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        let (updated, _) = watch::channel(0);
        let (done, _) = watch::channel(false);

        Self {
            id: info.id,
            name: info.name,
            agent_id: agent_id.into(),
            interval,
            service,
            metrics,
            state: RwLock::new(JobSetState {
                version: None,
                metadata: info.metadata,
                jobs: HashMap::new(),
            }),
            ready,
            updated,
            done,
            poll_now: Notify::new(),
            shutdown: CancellationToken::new(),
            task: std::sync::Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    // ---- reads -----------------------------------------------------------

    pub async fn version(&self) -> Option<u64> {
        self.state.read().await.version
    }

    pub async fn metadata(&self) -> JobSetMetadata {
        self.state.read().await.metadata.clone()
    }

    /// Snapshot of every cached job.
    pub async fn jobs(&self) -> HashMap<JobId, Job> {
        self.state.read().await.jobs.clone()
    }

    pub async fn job(&self, id: &str) -> Option<Job> {
        self.state.read().await.jobs.get(id).cloned()
    }

    /// Jobs nobody holds yet.
    pub async fn unowned_jobs(&self) -> Vec<Job> {
        let state = self.state.read().await;
        state.jobs.values().filter(|j| j.is_unowned()).cloned().collect()
    }

    /// Jobs `LEASED`/`CLAIMED` by this agent.
    pub async fn owned_jobs(&self) -> Vec<Job> {
        let state = self.state.read().await;
        state
            .jobs
            .values()
            .filter(|j| j.is_owned_by(&self.agent_id))
            .cloned()
            .collect()
    }

    // ---- synchronisation -------------------------------------------------

    /// Fetch the diff since the last known version and apply it.
    ///
    /// Returns whether the diff was applied.
    #[instrument(level = "trace", skip(self), fields(jobset = %self.name))]
    pub async fn sync(&self) -> Result<bool, CoreError> {
        let known = self.state.read().await.version;
        let diff = self
            .service
            .get_jobset_diff_by_id(&self.id, known.unwrap_or(0), &self.agent_id)
            .await?;
        Ok(self.apply_diff(diff).await)
    }

    /// Apply a diff unless a version at least as new was already applied.
    pub async fn apply_diff(&self, diff: JobSetDiff) -> bool {
        let version = diff.version;
        {
            let mut state = self.state.write().await;
            if state.version.is_some_and(|known| version <= known) {
                trace!(jobset = %self.name, version, known = ?state.version, "stale diff dropped");
                return false;
            }

            if diff.complete {
                state.jobs.clear();
            }
            let upserts = diff.upsert_jobs.len();
            let removals = diff.remove_jobs.len();
            for job in diff.upsert_jobs {
                state.jobs.insert(job.id.clone(), job);
            }
            for id in &diff.remove_jobs {
                state.jobs.remove(id);
            }
            if let Some(metadata) = diff.metadata {
                state.metadata = metadata;
            }
            state.version = Some(version);

            debug!(
                jobset = %self.name,
                version,
                complete = diff.complete,
                upserts,
                removals,
                jobs = state.jobs.len(),
                "diff applied"
            );
        }

        self.metrics.record_sync(&self.name, version);
        self.ready.send_replace(true);
        self.updated.send_replace(version);
        true
    }

    /// Receiver that observes every applied diff from now on.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updated.subscribe()
    }

    /// Block until the next applied diff.
    pub async fn wait_for_update(&self) -> Result<(), CoreError> {
        let mut rx = self.updates();
        wait_changed(&mut rx, &self.shutdown, &self.name).await
    }

    /// Block until the first diff has been applied.
    pub async fn wait_ready(&self) -> Result<(), CoreError> {
        let mut rx = self.ready.subscribe();
        tokio::select! {
            res = rx.wait_for(|ready| *ready) => res
                .map(|_| ())
                .map_err(|_| CoreError::JobSetClosed(self.name.clone())),
            _ = self.shutdown.cancelled() => Err(CoreError::JobSetClosed(self.name.clone())),
        }
    }

    /// Wake the sync loop now instead of at the end of its interval.
    pub fn poll_now(&self) {
        self.poll_now.notify_one();
    }

    // ---- remote mutations ------------------------------------------------

    #[instrument(level = "debug", skip(self), fields(jobset = %self.name))]
    pub async fn lease(&self, job_id: &str) -> Result<bool, CoreError> {
        let granted = self
            .service
            .lease_jobset_item(&self.id, job_id, &self.agent_id)
            .await?;
        self.metrics.record_lease(&self.name, granted);
        if granted {
            self.poll_now();
        }
        Ok(granted)
    }

    /// Bind a leased job to a run identity.
    #[instrument(level = "debug", skip(self), fields(jobset = %self.name))]
    pub async fn ack(&self, job_id: &str, run_name: &str) -> Result<bool, CoreError> {
        if !self.may_act_on(job_id).await {
            return Ok(false);
        }
        let acked = self
            .service
            .ack_jobset_item(&self.id, job_id, &self.agent_id, run_name)
            .await?;
        if acked {
            self.poll_now();
        }
        Ok(acked)
    }

    /// Report a permanent failure for a job.
    #[instrument(level = "debug", skip(self, message, file_paths), fields(jobset = %self.name))]
    pub async fn fail(
        &self,
        job_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError> {
        if !self.may_act_on(job_id).await {
            return Ok(false);
        }
        let failed = self
            .service
            .fail_run_queue_item(job_id, message, stage, file_paths)
            .await?;
        if failed {
            self.poll_now();
        }
        Ok(failed)
    }

    async fn may_act_on(&self, job_id: &str) -> bool {
        match self.state.read().await.jobs.get(job_id) {
            Some(job) if !job.may_be_acted_on_by(&self.agent_id) => {
                warn!(
                    jobset = %self.name,
                    job = job_id,
                    owner = %job.claimed_by,
                    "job is claimed by another agent; refusing to act on it"
                );
                false
            }
            _ => true,
        }
    }

    // ---- loop --------------------------------------------------------------

    /// Spawn the sync loop. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move { this.run_loop().await }));
    }

    async fn run_loop(self: Arc<Self>) {
        info!(jobset = %self.name, interval_ms = self.interval.as_millis() as u64, "job set sync loop started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            if let Err(e) = self.sync().await {
                warn!(jobset = %self.name, error = %e, "job set sync failed; retrying next interval");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.poll_now.notified() => trace!(jobset = %self.name, "poll-now wakeup"),
                _ = self.shutdown.cancelled() => {}
            }
        }
        self.done.send_replace(true);
        info!(jobset = %self.name, "job set sync loop stopped");
    }

    /// Ask the sync loop to exit after its current iteration.
    pub fn stop(&self) {
        self.shutdown.cancel();
        self.poll_now.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!(jobset = %self.name, error = %e, "job set sync loop ended abnormally");
                }
            }
            None => {
                self.done.send_replace(true);
            }
        }
    }

    /// Wait until the sync loop signalled completion.
    pub async fn wait_done(&self) {
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

async fn wait_changed(
    rx: &mut watch::Receiver<u64>,
    shutdown: &CancellationToken,
    name: &str,
) -> Result<(), CoreError> {
    tokio::select! {
        res = rx.changed() => res.map_err(|_| CoreError::JobSetClosed(name.to_string())),
        _ = shutdown.cancelled() => Err(CoreError::JobSetClosed(name.to_string())),
    }
}

/// Wait on a receiver obtained from [`JobSet::updates`] before an action.
pub async fn wait_for_next(jobset: &JobSet, rx: &mut watch::Receiver<u64>) -> Result<(), CoreError> {
    wait_changed(rx, &jobset.shutdown, &jobset.name).await
}
