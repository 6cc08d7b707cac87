#![allow(dead_code)]

//! In-memory queue service and backend fakes shared by the integration tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use launch_core::{
    AgentConfig, AgentInfo, AgentRegistration, Backend, Builder, CoreError, DiscoveredResource,
    JobSet, LaunchProject, ManagerContext, MemoryTrackerFactory, NoopMetrics, QueueScope,
    QueueService, ResourceLister, RunHandle, Runner, StatusTracker,
};
use launch_model::{
    AgentStatus, FailureStage, Job, JobId, JobSetDiff, JobSetInfo, JobSetMetadata, JobState,
    MaxConcurrency, ResourceType, RunState,
};
use serde_json::json;
use tokio::time::{Instant, sleep};

pub const JOBSET_ID: &str = "jobset-1";
pub const FAST: Duration = Duration::from_millis(10);

pub fn at(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Pending job with a minimal launchable spec.
pub fn job(id: &str, priority: i64, created_ms: u64) -> Job {
    Job::new(id, priority, at(created_ms)).with_run_spec(json!({
        "job": "team/proj/train:latest",
        "docker": {"docker_image": "registry/train:1"},
    }))
}

pub fn metadata(resource: ResourceType, max: MaxConcurrency) -> JobSetMetadata {
    JobSetMetadata {
        resource: resource.as_str().to_string(),
        max_concurrency: max,
        ..Default::default()
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    cond()
}

// ---- queue service ---------------------------------------------------------

#[derive(Default)]
pub struct FakeState {
    pub version: u64,
    pub metadata: JobSetMetadata,
    pub jobs: HashMap<JobId, Job>,
    pub leases: Vec<(JobId, String)>,
    pub acks: Vec<(JobId, String)>,
    pub fails: Vec<(JobId, String, FailureStage)>,
    pub refuse_acks: HashSet<JobId>,
    pub statuses: Vec<AgentStatus>,
    pub stop_polling: bool,
    pub run_queue: VecDeque<JobId>,
    pub diff_calls: usize,
    pub agents: usize,
    pub unavailable: bool,
    /// Fail only diff requests, so a job set never becomes ready.
    pub diffs_unavailable: bool,
}

/// Server side of the protocol: arbitrates leases, versions every change
/// and answers diffs with full snapshots.
#[derive(Default)]
pub struct FakeQueueService {
    state: Mutex<FakeState>,
}

impl FakeQueueService {
    pub fn new(metadata: JobSetMetadata) -> Arc<Self> {
        let service = Self::default();
        {
            let mut state = service.state();
            state.metadata = metadata;
            state.version = 1;
        }
        Arc::new(service)
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_job(&self, job: Job) {
        let mut state = self.state();
        state.jobs.insert(job.id.clone(), job);
        state.version += 1;
    }

    /// Job only reachable through the passthrough run-queue calls.
    pub fn enqueue(&self, job: Job) {
        let mut state = self.state();
        state.run_queue.push_back(job.id.clone());
        state.jobs.insert(job.id.clone(), job);
    }

    pub fn set_job_state(&self, id: &str, job_state: JobState) {
        let mut state = self.state();
        if let Some(job) = state.jobs.get_mut(id) {
            job.state = job_state;
        }
        state.version += 1;
    }

    pub fn set_max_concurrency(&self, max: MaxConcurrency) {
        let mut state = self.state();
        state.metadata.max_concurrency = max;
        state.version += 1;
    }

    pub fn refuse_ack(&self, id: &str) {
        self.state().refuse_acks.insert(id.to_string());
    }

    pub fn job(&self, id: &str) -> Option<Job> {
        self.state().jobs.get(id).cloned()
    }

    pub fn fails(&self) -> Vec<(JobId, String, FailureStage)> {
        self.state().fails.clone()
    }

    pub fn acks(&self) -> Vec<(JobId, String)> {
        self.state().acks.clone()
    }

    pub fn statuses(&self) -> Vec<AgentStatus> {
        self.state().statuses.clone()
    }

    fn check_available(&self) -> Result<(), CoreError> {
        if self.state().unavailable {
            return Err(CoreError::Service("service unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueService for FakeQueueService {
    async fn create_launch_agent(
        &self,
        _entity: &str,
        _project: &str,
        _queues: &[String],
    ) -> Result<AgentRegistration, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        state.agents += 1;
        Ok(AgentRegistration {
            id: format!("agent-{}", state.agents),
            name: None,
        })
    }

    async fn get_launch_agent(&self, agent_id: &str) -> Result<AgentInfo, CoreError> {
        self.check_available()?;
        Ok(AgentInfo {
            name: format!("{agent_id}-name"),
            stop_polling: self.state().stop_polling,
        })
    }

    async fn update_launch_agent_status(
        &self,
        _agent_id: &str,
        status: AgentStatus,
    ) -> Result<bool, CoreError> {
        self.state().statuses.push(status);
        Ok(true)
    }

    async fn get_jobset_by_spec(
        &self,
        name: &str,
        _entity: &str,
        _project: &str,
    ) -> Result<JobSetInfo, CoreError> {
        self.check_available()?;
        Ok(JobSetInfo {
            id: JOBSET_ID.to_string(),
            name: name.to_string(),
            metadata: self.state().metadata.clone(),
        })
    }

    async fn get_jobset_diff_by_id(
        &self,
        _jobset_id: &str,
        _known_version: u64,
        _agent_id: &str,
    ) -> Result<JobSetDiff, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        if state.diffs_unavailable {
            return Err(CoreError::Service("diff unavailable".into()));
        }
        state.diff_calls += 1;
        let upsert_jobs = state
            .jobs
            .values()
            .filter(|j| !state.run_queue.contains(&j.id) && !j.state.is_terminal())
            .cloned()
            .collect();
        Ok(JobSetDiff {
            version: state.version,
            complete: true,
            metadata: Some(state.metadata.clone()),
            upsert_jobs,
            remove_jobs: Vec::new(),
        })
    }

    async fn lease_jobset_item(
        &self,
        _jobset_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> Result<bool, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        let granted = match state.jobs.get_mut(job_id) {
            Some(job) if job.is_unowned() => {
                job.state = JobState::Leased;
                job.claimed_by = agent_id.to_string();
                true
            }
            _ => false,
        };
        if granted {
            state.version += 1;
            state.leases.push((job_id.to_string(), agent_id.to_string()));
        }
        Ok(granted)
    }

    async fn ack_jobset_item(
        &self,
        _jobset_id: &str,
        job_id: &str,
        agent_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        if state.refuse_acks.contains(job_id) {
            return Ok(false);
        }
        let acked = match state.jobs.get_mut(job_id) {
            Some(job) if job.claimed_by == agent_id && job.state == JobState::Leased => {
                job.state = JobState::Claimed;
                true
            }
            _ => false,
        };
        if acked {
            state.version += 1;
            state.acks.push((job_id.to_string(), run_name.to_string()));
        }
        Ok(acked)
    }

    async fn fail_run_queue_item(
        &self,
        item_id: &str,
        message: &str,
        stage: FailureStage,
        _file_paths: &[PathBuf],
    ) -> Result<bool, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        state
            .fails
            .push((item_id.to_string(), message.to_string(), stage));
        if let Some(job) = state.jobs.get_mut(item_id) {
            job.state = JobState::Failed;
        }
        state.version += 1;
        Ok(true)
    }

    async fn pop_from_run_queue(&self, scope: &QueueScope) -> Result<Option<Job>, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        let Some(id) = state.run_queue.pop_front() else {
            return Ok(None);
        };
        let job = state.jobs.get_mut(&id).map(|job| {
            job.state = JobState::Leased;
            job.claimed_by = scope.agent_id.clone();
            job.clone()
        });
        Ok(job)
    }

    async fn get_run_queue_item(
        &self,
        _scope: &QueueScope,
        item_id: &str,
    ) -> Result<Option<Job>, CoreError> {
        self.check_available()?;
        Ok(self.state().jobs.get(item_id).cloned())
    }

    async fn ack_run_queue_item(
        &self,
        _scope: &QueueScope,
        item_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError> {
        self.check_available()?;
        let mut state = self.state();
        if state.refuse_acks.contains(item_id) {
            return Ok(false);
        }
        if let Some(job) = state.jobs.get_mut(item_id) {
            job.state = JobState::Claimed;
        }
        state
            .acks
            .push((item_id.to_string(), run_name.to_string()));
        Ok(true)
    }
}

// ---- backend ---------------------------------------------------------------

#[derive(Default)]
pub struct FakeBuilder {
    pub builds: AtomicUsize,
}

#[async_trait]
impl Builder for FakeBuilder {
    fn name(&self) -> &'static str {
        "fake-builder"
    }

    async fn build_image(
        &self,
        project: &LaunchProject,
        _entrypoint: &[String],
        _tracker: &dyn StatusTracker,
    ) -> Result<String, CoreError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(format!("built/{}", project.run_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    Launch,
    NoHandle,
    Error,
}

/// Shared view of one launched run.
#[derive(Debug)]
pub struct RunControl {
    pub run_id: String,
    /// Project as the runner received it.
    pub project: LaunchProject,
    pub state: Mutex<RunState>,
    pub cancelled: Mutex<bool>,
}

impl RunControl {
    pub fn set(&self, state: RunState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap()
    }
}

pub struct FakeHandle {
    control: Arc<RunControl>,
}

#[async_trait]
impl RunHandle for FakeHandle {
    fn id(&self) -> &str {
        &self.control.run_id
    }

    async fn get_status(&self) -> Result<RunState, CoreError> {
        Ok(*self.control.state.lock().unwrap())
    }

    async fn cancel(&self) -> Result<(), CoreError> {
        *self.control.cancelled.lock().unwrap() = true;
        self.control.set(RunState::Stopped);
        Ok(())
    }
}

pub struct FakeRunner {
    pub mode: Mutex<RunnerMode>,
    pub calls: AtomicUsize,
    pub runs: Mutex<Vec<(JobId, Arc<RunControl>)>>,
}

impl FakeRunner {
    pub fn new(mode: RunnerMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            runs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn run_for(&self, job_id: &str) -> Option<Arc<RunControl>> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == job_id)
            .map(|(_, c)| Arc::clone(c))
    }

    pub fn launched_jobs(&self) -> Vec<JobId> {
        self.runs.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl Runner for FakeRunner {
    fn name(&self) -> &'static str {
        "fake-runner"
    }

    async fn run(
        &self,
        project: &LaunchProject,
        _image_uri: &str,
    ) -> Result<Option<Box<dyn RunHandle>>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.mode.lock().unwrap() {
            RunnerMode::NoHandle => Ok(None),
            RunnerMode::Error => Err(CoreError::Run("backend rejected the run".into())),
            RunnerMode::Launch => {
                let control = Arc::new(RunControl {
                    run_id: project.run_id.clone(),
                    project: project.clone(),
                    state: Mutex::new(RunState::Starting),
                    cancelled: Mutex::new(false),
                });
                self.runs
                    .lock()
                    .unwrap()
                    .push((project.job_id.clone(), Arc::clone(&control)));
                Ok(Some(Box::new(FakeHandle { control })))
            }
        }
    }
}

pub struct FakeLister {
    pub found: Vec<DiscoveredResource>,
}

#[async_trait]
impl ResourceLister for FakeLister {
    async fn list_labeled(
        &self,
        _label_key: &str,
        _label_value: &str,
    ) -> Result<Vec<DiscoveredResource>, CoreError> {
        Ok(self.found.clone())
    }
}

// ---- wiring ----------------------------------------------------------------

pub fn config() -> AgentConfig {
    AgentConfig::new("team", "proj")
        .with_queue("gpu")
        .with_intervals(FAST, FAST, FAST)
}

/// Started job set that has applied its first snapshot.
pub async fn ready_jobset(service: &Arc<FakeQueueService>, agent_id: &str) -> Arc<JobSet> {
    let info = service
        .get_jobset_by_spec("gpu", "team", "proj")
        .await
        .unwrap();
    let jobset = Arc::new(JobSet::new(
        info,
        agent_id,
        FAST,
        Arc::clone(service) as Arc<dyn QueueService>,
        NoopMetrics::handle(),
    ));
    jobset.start();
    jobset.wait_ready().await.unwrap();
    jobset
}

pub struct Harness {
    pub service: Arc<FakeQueueService>,
    pub jobset: Arc<JobSet>,
    pub builder: Arc<FakeBuilder>,
    pub runner: Arc<FakeRunner>,
    pub gauge: Arc<AtomicUsize>,
}

impl Harness {
    pub async fn new(metadata: JobSetMetadata, mode: RunnerMode) -> Self {
        let service = FakeQueueService::new(metadata);
        let jobset = ready_jobset(&service, "agent-1").await;
        Self {
            service,
            jobset,
            builder: Arc::new(FakeBuilder::default()),
            runner: FakeRunner::new(mode),
            gauge: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn context(&self, resource: ResourceType) -> ManagerContext {
        ManagerContext {
            agent_id: "agent-1".to_string(),
            queue: "gpu".to_string(),
            resource,
            config: Arc::new(config()),
            jobset: Arc::clone(&self.jobset),
            service: Arc::clone(&self.service) as Arc<dyn QueueService>,
            backend: Backend::new(
                Arc::clone(&self.builder) as Arc<dyn Builder>,
                Arc::clone(&self.runner) as Arc<dyn Runner>,
            ),
            trackers: Arc::new(MemoryTrackerFactory),
            metrics: NoopMetrics::handle(),
            active_gauge: Arc::clone(&self.gauge),
        }
    }

    /// Apply the service's current state to the job set now.
    pub async fn sync(&self) {
        self.jobset.sync().await.unwrap();
    }
}
