use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, atomic::Ordering},
};

use launch_model::{FailureStage, Job, JobId, ResourceType, RunState};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{
    ManagerContext,
    active::{ActiveRun, ActiveRuns},
    label::{QUEUE_LABEL_KEY, queue_label, sanitize_label_value},
};
use crate::{
    collab::{MemoryTracker, TrackerRef},
    driver::{DriverKind, QueueDriver},
    error::CoreError,
    project::{LaunchProject, ProjectContext},
};

/// How new work enters a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// At most one `pop_next` per pass; launches go through the owned set.
    OnePerTick,
    /// Pop and launch until the cap is reached or the queue is empty.
    Batch,
}

/// Outcome of [`ManagerCore::plan`].
#[derive(Debug)]
pub struct PassPlan {
    /// Desired jobs without an active run, in launch order.
    pub launch: Vec<Job>,
    /// Resolved concurrency cap for this pass.
    pub cap: usize,
}

/// Reconciliation state shared by every manager variant.
pub struct ManagerCore {
    ctx: ManagerContext,
    driver: Box<dyn QueueDriver>,
    active: ActiveRuns,
    /// Jobs whose run is over (or never started) but which the queue still
    /// lists as held; skipped until they leave the owned set.
    settled: HashSet<JobId>,
    queue_label: String,
    auto_concurrency: usize,
}

impl ManagerCore {
    pub fn new(ctx: ManagerContext, driver: Box<dyn QueueDriver>, auto_concurrency: usize) -> Self {
        let queue_label = queue_label(&ctx.config.entity, &ctx.queue);
        Self {
            ctx,
            driver,
            active: ActiveRuns::new(),
            settled: HashSet::new(),
            queue_label,
            auto_concurrency,
        }
    }

    pub fn context(&self) -> &ManagerContext {
        &self.ctx
    }

    pub fn resource(&self) -> ResourceType {
        self.ctx.resource
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn queue_label(&self) -> &str {
        &self.queue_label
    }

    pub fn active(&self) -> &ActiveRuns {
        &self.active
    }

    /// Current cap with `auto` resolved for this backend.
    pub async fn max_concurrency(&self) -> usize {
        self.ctx
            .jobset
            .metadata()
            .await
            .max_concurrency
            .resolve(self.auto_concurrency)
    }

    /// First half of a pass: refresh runs, pick the desired set and release
    /// everything outside it. Returns the desired jobs not yet running.
    #[instrument(level = "debug", skip(self), fields(queue = %self.ctx.queue, resource = %self.ctx.resource))]
    pub async fn plan(&mut self, mode: ReconcileMode) -> Result<PassPlan, CoreError> {
        self.refresh_runs().await;

        let cap = self.max_concurrency().await;
        let mut owned = self.owned_candidates().await?;

        if mode == ReconcileMode::OnePerTick && owned.len() < cap {
            if let Some(job) = self.pop_candidate().await {
                if !owned.iter().any(|j| j.id == job.id) {
                    owned.push(job);
                }
            }
        }

        let desired = self.select_desired(owned, cap);
        self.release_undesired(&desired).await;

        let launch = desired
            .into_iter()
            .filter(|j| !self.active.contains(&j.id))
            .collect();
        Ok(PassPlan { launch, cap })
    }

    /// Next job to start in batch mode, or `None` once the cap is reached,
    /// the queue is empty or the popped job is already running.
    pub async fn next_batch_job(&self, cap: usize) -> Option<Job> {
        if self.active.len() >= cap {
            return None;
        }
        let job = self.pop_candidate().await?;
        if self.active.contains(&job.id) {
            return None;
        }
        Some(job)
    }

    /// Poll every active handle; terminal runs leave the table.
    async fn refresh_runs(&mut self) {
        let mut finished = Vec::new();
        for id in self.active.ids() {
            let Some(run) = self.active.get_mut(&id) else {
                continue;
            };
            let state = match run.handle.get_status().await {
                Ok(state) => state,
                Err(e) => {
                    // Unknown is treated as still live.
                    debug!(job = %id, error = %e, "run status check failed");
                    continue;
                }
            };
            run.tracker.set_state(state);
            if state == RunState::Running {
                run.seen_running = true;
            }
            if state.is_terminal() {
                let never_started = state == RunState::Failed && !run.seen_running;
                finished.push((id, state, never_started));
            }
        }

        for (id, state, never_started) in finished {
            let Some(run) = self.active.remove(&id) else {
                continue;
            };
            info!(job = %id, run = %run.run_name, state = %state, "run finished");
            if never_started {
                let reason = format!("run {} failed before it started running", run.run_name);
                run.tracker.mark_failed_to_start(FailureStage::Run, &reason);
                self.report_failure(&id, &reason, FailureStage::Run, &run.tracker.files())
                    .await;
            }
            self.driver.forget(&id);
            self.settled.insert(id);
        }
    }

    async fn owned_candidates(&mut self) -> Result<Vec<Job>, CoreError> {
        let owned = self.driver.owned_items(&self.active.ids()).await?;
        let owned_ids: HashSet<&str> = owned.iter().map(|j| j.id.as_str()).collect();
        self.settled.retain(|id| owned_ids.contains(id.as_str()));
        Ok(owned
            .into_iter()
            .filter(|j| !self.settled.contains(&j.id))
            .collect())
    }

    async fn pop_candidate(&self) -> Option<Job> {
        match self.driver.pop_next().await {
            Ok(Some(job)) if self.settled.contains(&job.id) => None,
            Ok(popped) => popped,
            Err(e) => {
                warn!(queue = %self.ctx.queue, error = %e, "pop failed; retrying next pass");
                None
            }
        }
    }

    /// Running jobs first, then oldest first, capped.
    fn select_desired(&self, mut owned: Vec<Job>, cap: usize) -> Vec<Job> {
        owned.sort_by(|a, b| {
            let a_idle = !self.active.contains(&a.id);
            let b_idle = !self.active.contains(&b.id);
            (a_idle, a.created_at, &a.id).cmp(&(b_idle, b.created_at, &b.id))
        });
        owned.truncate(cap);
        owned
    }

    async fn release_undesired(&mut self, desired: &[Job]) {
        let keep: HashSet<&str> = desired.iter().map(|j| j.id.as_str()).collect();
        for id in self.active.ids() {
            if keep.contains(id.as_str()) {
                continue;
            }
            self.cancel_item(&id).await;
            self.release_item(&id);
        }
    }

    /// Cancel the run behind `job_id` if the backend still reports it live.
    pub async fn cancel_item(&self, job_id: &str) {
        let Some(run) = self.active.get(job_id) else {
            return;
        };
        match run.handle.get_status().await {
            Ok(state) if !state.is_terminal() => {
                info!(job = job_id, run = %run.run_name, "cancelling run");
                if let Err(e) = run.handle.cancel().await {
                    warn!(job = job_id, error = %e, "cancel failed");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(job = job_id, error = %e, "status unknown; not cancelling"),
        }
    }

    /// Forget an active run. Absent ids are a no-op.
    pub fn release_item(&mut self, job_id: &str) {
        if let Some(run) = self.active.remove(job_id) {
            debug!(job = job_id, run = %run.run_name, "released");
            self.driver.forget(job_id);
            self.publish_active();
        }
    }

    /// Resolve the launch project for `job`. A job whose spec cannot be
    /// resolved is reported failed and settled.
    pub async fn prepare(&mut self, job: &Job) -> Result<LaunchProject, CoreError> {
        match self.build_project(job).await {
            Ok(project) => Ok(project),
            Err(e) => {
                self.settle_failed(&job.id, &e.to_string(), FailureStage::Agent, &[])
                    .await;
                Err(e)
            }
        }
    }

    /// Ack, build (when needed) and run one labelled job.
    ///
    /// Every failure after the job is acked is reported to the queue exactly
    /// once; a failed ack leaves the job untouched for a later pass.
    #[instrument(level = "debug", skip(self, job, project), fields(job = %job.id, queue = %self.ctx.queue))]
    pub async fn start(&mut self, job: Job, project: LaunchProject) -> Result<(), CoreError> {
        match self.driver.ack(&job.id, &project.run_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(run = %project.run_id, "ack refused; leaving job for a later pass");
                return Ok(());
            }
            Err(e) => {
                warn!(run = %project.run_id, error = %e, "ack failed; leaving job for a later pass");
                return Ok(());
            }
        }

        let tracker = self.tracker_for(&project);

        let image = match &project.docker_image {
            Some(image) => image.clone(),
            None => {
                let builder = Arc::clone(&self.ctx.backend.builder);
                match builder
                    .build_image(&project, &project.entry_point, tracker.as_ref())
                    .await
                {
                    Ok(image) => image,
                    Err(e) => {
                        let reason = e.to_string();
                        tracker.mark_failed_to_start(FailureStage::Agent, &reason);
                        self.settle_failed(&job.id, &reason, FailureStage::Agent, &tracker.files())
                            .await;
                        return Err(e);
                    }
                }
            }
        };

        let runner = Arc::clone(&self.ctx.backend.runner);
        let handle = match runner.run(&project, &image).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                let reason = format!("{} produced no run for {}", runner.name(), project.run_id);
                tracker.mark_failed_to_start(FailureStage::Run, &reason);
                self.settle_failed(&job.id, &reason, FailureStage::Run, &tracker.files())
                    .await;
                return Err(CoreError::Run(reason));
            }
            Err(e) => {
                let reason = e.to_string();
                tracker.mark_failed_to_start(FailureStage::Run, &reason);
                self.settle_failed(&job.id, &reason, FailureStage::Run, &tracker.files())
                    .await;
                return Err(e);
            }
        };

        tracker.set_state(RunState::Starting);
        info!(run = %project.run_id, handle = handle.id(), image = %image, "run launched");
        self.ctx.metrics.record_launch(&self.ctx.queue, self.ctx.resource);
        self.active.insert(ActiveRun {
            job_id: job.id,
            run_name: project.run_id,
            handle,
            tracker,
            seen_running: false,
        });
        self.publish_active();
        Ok(())
    }

    /// Job ids found on the backend under this queue's label with no active
    /// run here.
    pub async fn find_orphans(&self) -> Result<Vec<JobId>, CoreError> {
        let Some(lister) = self.ctx.backend.lister.as_ref() else {
            return Err(CoreError::OrphanDiscoveryUnsupported(self.ctx.resource));
        };
        let found = lister
            .list_labeled(QUEUE_LABEL_KEY, &self.queue_label)
            .await?;
        // Backends echo the label value, which may be the sanitized id.
        let mut tracked: HashSet<String> = HashSet::new();
        for id in self.active.ids() {
            let sanitized = sanitize_label_value(&id);
            tracked.insert(sanitized.to_ascii_lowercase());
            tracked.insert(sanitized);
            tracked.insert(id);
        }
        let mut orphans: Vec<JobId> = found
            .into_iter()
            .filter_map(|r| match r.job_id {
                Some(id) => Some(id),
                None => {
                    debug!(resource = %r.name, "labelled resource carries no job id");
                    None
                }
            })
            .filter(|id| !tracked.contains(id.as_str()))
            .collect();
        orphans.sort();
        orphans.dedup();
        Ok(orphans)
    }

    /// Cancel every live run and empty the table.
    pub async fn cancel_all(&mut self) {
        for id in self.active.ids() {
            self.cancel_item(&id).await;
            self.release_item(&id);
        }
    }

    async fn build_project(&self, job: &Job) -> Result<LaunchProject, CoreError> {
        let meta = self.ctx.jobset.metadata().await;
        let resource = self.ctx.resource.as_str();
        let mut defaults: Vec<&Value> = Vec::new();
        if let Some(agent_block) = self.ctx.config.defaults_for(resource) {
            defaults.push(agent_block);
        }
        if let Some(queue_block) = queue_defaults(&meta.default_resource_config, resource) {
            defaults.push(queue_block);
        }

        let pctx = ProjectContext {
            entity: &self.ctx.config.entity,
            project: &self.ctx.config.project,
            queue: &self.ctx.queue,
            resource: self.ctx.resource,
            defaults,
        };
        LaunchProject::from_job(job, &pctx)
    }

    fn tracker_for(&self, project: &LaunchProject) -> TrackerRef {
        match self.ctx.trackers.create(&project.run_id, &self.ctx.queue) {
            Ok(tracker) => tracker,
            Err(e) => {
                warn!(run = %project.run_id, error = %e, "tracker unavailable; keeping status in memory");
                Arc::new(MemoryTracker::new(project.run_id.clone(), self.ctx.queue.clone()))
            }
        }
    }

    async fn settle_failed(&mut self, job_id: &str, reason: &str, stage: FailureStage, files: &[PathBuf]) {
        self.report_failure(job_id, reason, stage, files).await;
        self.driver.forget(job_id);
        self.settled.insert(job_id.to_string());
    }

    async fn report_failure(&self, job_id: &str, reason: &str, stage: FailureStage, files: &[PathBuf]) {
        self.ctx.metrics.record_failure(&self.ctx.queue, stage);
        match self.driver.fail(job_id, reason, stage, files).await {
            Ok(true) => debug!(job = job_id, stage = stage.as_str(), "failure reported"),
            Ok(false) => warn!(job = job_id, "queue refused failure report"),
            Err(e) => warn!(job = job_id, error = %e, "failure report failed"),
        }
    }

    /// Push the active count to the gauge and metrics sink.
    pub fn publish_active(&self) {
        let count = self.active.len();
        self.ctx.active_gauge.store(count, Ordering::Relaxed);
        self.ctx.metrics.set_active_runs(&self.ctx.queue, count);
    }
}

/// The queue's default block for `resource`. A block keyed by resource type
/// applies only to the matching key; an unkeyed block applies to every type.
fn queue_defaults<'a>(config: &'a Value, resource: &str) -> Option<&'a Value> {
    let map = config.as_object()?;
    if let Some(block) = map.get(resource) {
        return block.is_object().then_some(block);
    }
    let keyed = map.keys().any(|k| k.parse::<ResourceType>().is_ok());
    (!keyed && !map.is_empty()).then_some(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_queue_defaults_apply_only_to_their_resource() {
        let config = json!({"kubernetes": {"namespace": "ns"}});
        assert_eq!(
            queue_defaults(&config, "kubernetes"),
            Some(&json!({"namespace": "ns"}))
        );
        assert_eq!(queue_defaults(&config, "vertex"), None);
    }

    #[test]
    fn unkeyed_queue_defaults_apply_everywhere() {
        let config = json!({"namespace": "ns"});
        assert_eq!(queue_defaults(&config, "vertex"), Some(&config));
        assert_eq!(queue_defaults(&json!({}), "vertex"), None);
        assert_eq!(queue_defaults(&json!(null), "vertex"), None);
    }
}
