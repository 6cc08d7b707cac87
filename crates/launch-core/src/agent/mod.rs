//! The process-wide agent: registration, per-queue wiring and shutdown.
//!
//! One [`Agent`] is built by the entry point and shared by reference with
//! the tasks it spawns. Per queue it owns one [`JobSet`] sync loop and one
//! [`Controller`]; on its own it runs a status poll against the queue
//! service, which is also how an operator's stop request reaches it.

mod state;
pub use state::AgentState;

use std::{
    mem,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use launch_model::{AgentStatus, ResourceType};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    collab::{MemoryTrackerFactory, TrackerFactory},
    config::AgentConfig,
    controller::Controller,
    driver::DriverKind,
    error::CoreError,
    jobset::JobSet,
    manager::ManagerContext,
    metrics::{MetricsHandle, NoopMetrics},
    registry::ManagerRegistry,
    router::BackendRouter,
    service::QueueService,
    system::default_agent_name,
};

/// Collects the agent's collaborators before registration.
pub struct AgentBuilder {
    config: AgentConfig,
    service: Arc<dyn QueueService>,
    registry: ManagerRegistry,
    router: BackendRouter,
    trackers: Arc<dyn TrackerFactory>,
    metrics: MetricsHandle,
}

impl AgentBuilder {
    pub fn with_registry(mut self, registry: ManagerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_router(mut self, router: BackendRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_trackers(mut self, trackers: Arc<dyn TrackerFactory>) -> Self {
        self.trackers = trackers;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Validate the configuration and register with the queue service.
    #[instrument(level = "info", skip(self), fields(entity = %self.config.entity))]
    pub async fn register(self) -> Result<Arc<Agent>, CoreError> {
        self.config.validate()?;
        let registration = self
            .service
            .create_launch_agent(&self.config.entity, &self.config.project, &self.config.queues)
            .await?;
        let name = registration.name.unwrap_or_else(default_agent_name);
        info!(agent = %registration.id, name = %name, queues = ?self.config.queues, "agent registered");

        let (state, _) = watch::channel(AgentState::Registered);
        Ok(Arc::new(Agent {
            id: registration.id,
            name: Mutex::new(name),
            config: Arc::new(self.config),
            service: self.service,
            registry: self.registry,
            router: self.router,
            trackers: self.trackers,
            metrics: self.metrics,
            state,
            token: CancellationToken::new(),
            tasks: Mutex::new(AgentTasks::default()),
        }))
    }
}

#[derive(Default)]
struct AgentTasks {
    jobsets: Vec<Arc<JobSet>>,
    controllers: Vec<JoinHandle<()>>,
    gauges: Vec<Arc<AtomicUsize>>,
    poll: Option<JoinHandle<()>>,
}

pub struct Agent {
    id: String,
    name: Mutex<String>,
    config: Arc<AgentConfig>,
    service: Arc<dyn QueueService>,
    registry: ManagerRegistry,
    router: BackendRouter,
    trackers: Arc<dyn TrackerFactory>,
    metrics: MetricsHandle,
    state: watch::Sender<AgentState>,
    token: CancellationToken,
    tasks: Mutex<AgentTasks>,
}

impl Agent {
    /// Start describing an agent. Defaults: built-in managers, no backends,
    /// in-memory trackers, no metrics.
    pub fn builder(config: AgentConfig, service: Arc<dyn QueueService>) -> AgentBuilder {
        AgentBuilder {
            config,
            service,
            registry: ManagerRegistry::with_defaults(),
            router: BackendRouter::new(),
            trackers: Arc::new(MemoryTrackerFactory),
            metrics: NoopMetrics::handle(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name; replaced by whatever the service reports on polling.
    pub fn name(&self) -> String {
        self.name.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Active runs across every queue.
    pub fn running_jobs(&self) -> usize {
        self.tasks()
            .gauges
            .iter()
            .map(|g| g.load(Ordering::Relaxed))
            .sum()
    }

    fn tasks(&self) -> MutexGuard<'_, AgentTasks> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start one job set and controller per queue plus the status poll.
    ///
    /// Queues that fail to start are logged and skipped; it is an error only
    /// when none starts. A stop requested mid-start abandons the remaining
    /// queues and is not an error.
    #[instrument(level = "info", skip(self), fields(agent = %self.id))]
    pub async fn start(self: &Arc<Self>) -> Result<(), CoreError> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == AgentState::Registered {
                *state = AgentState::Running;
                started = true;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(CoreError::Config(format!(
                "agent cannot start from state {}",
                self.state()
            )));
        }

        let poll = tokio::spawn(Arc::clone(self).poll_loop());
        self.tasks().poll = Some(poll);

        let mut first_error = None;
        let mut serving = 0usize;
        for queue in self.config.queues.clone() {
            if self.token.is_cancelled() {
                break;
            }
            match self.start_queue(&queue).await {
                Ok(resource) => {
                    serving += 1;
                    info!(queue = %queue, resource = %resource, "queue serving");
                }
                Err(e) => {
                    error!(queue = %queue, error = %e, "queue failed to start");
                    first_error.get_or_insert(e);
                }
            }
        }

        if self.token.is_cancelled() {
            info!(serving, "stop requested during start");
            return Ok(());
        }
        match first_error {
            Some(e) if serving == 0 => Err(e),
            _ => Ok(()),
        }
    }

    async fn start_queue(&self, queue: &str) -> Result<ResourceType, CoreError> {
        let info = self
            .service
            .get_jobset_by_spec(queue, &self.config.entity, &self.config.project)
            .await?;
        let jobset = Arc::new(JobSet::new(
            info,
            self.id.clone(),
            self.config.sync_interval,
            Arc::clone(&self.service),
            Arc::clone(&self.metrics),
        ));
        jobset.start();
        self.tasks().jobsets.push(Arc::clone(&jobset));
        tokio::select! {
            ready = jobset.wait_ready() => ready?,
            _ = self.token.cancelled() => {
                jobset.stop();
                return Err(CoreError::JobSetClosed(jobset.name().to_string()));
            }
        }

        let resource: ResourceType = jobset.metadata().await.resource.parse()?;
        let backend = self.router.resolve(resource)?;
        let gauge = Arc::new(AtomicUsize::new(0));
        let ctx = ManagerContext {
            agent_id: self.id.clone(),
            queue: queue.to_string(),
            resource,
            config: Arc::clone(&self.config),
            jobset: Arc::clone(&jobset),
            service: Arc::clone(&self.service),
            backend,
            trackers: Arc::clone(&self.trackers),
            metrics: Arc::clone(&self.metrics),
            active_gauge: Arc::clone(&gauge),
        };
        let manager = self.registry.build(resource, ctx)?;

        if manager.driver_kind() == DriverKind::Passthrough {
            // The run queue is the source of truth; the cache was only
            // needed for the queue's metadata.
            jobset.stop();
            debug!(queue, "passthrough queue; job set sync loop stopped");
        }

        let controller = Controller::new(
            queue,
            manager,
            self.config.reconcile_interval,
            self.token.child_token(),
        );
        let mut tasks = self.tasks();
        tasks.gauges.push(gauge);
        tasks.controllers.push(controller.spawn());
        Ok(resource)
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut reported: Option<AgentStatus> = None;
        loop {
            match self.service.get_launch_agent(&self.id).await {
                Ok(info) => {
                    self.learn_name(info.name);
                    if info.stop_polling {
                        info!(agent = %self.id, "queue service asked the agent to stop");
                        self.token.cancel();
                        break;
                    }
                }
                Err(e) => warn!(agent = %self.id, error = %e, "agent poll failed"),
            }

            let status = if self.running_jobs() > 0 {
                AgentStatus::Running
            } else {
                AgentStatus::Polling
            };
            if reported != Some(status) {
                match self.service.update_launch_agent_status(&self.id, status).await {
                    Ok(_) => reported = Some(status),
                    Err(e) => warn!(agent = %self.id, error = %e, "status update failed"),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.token.cancelled() => break,
            }
        }
    }

    fn learn_name(&self, name: String) {
        if name.is_empty() {
            return;
        }
        let mut current = self.name.lock().unwrap_or_else(|e| e.into_inner());
        if *current != name {
            debug!(agent = %self.id, name = %name, "agent name updated");
            *current = name;
        }
    }

    /// Ask every loop to stop; [`Agent::shutdown`] does the waiting.
    pub fn request_stop(&self) {
        self.token.cancel();
    }

    /// Resolves once a stop was requested, locally or by the service.
    pub async fn stop_requested(&self) {
        self.token.cancelled().await;
    }

    /// Start, wait for a stop request, then shut down.
    pub async fn run(self: &Arc<Self>) -> Result<(), CoreError> {
        let started = self.start().await;
        if started.is_ok() {
            self.stop_requested().await;
        }
        self.shutdown().await;
        started
    }

    /// Stop controllers first, then job sets, then the status poll.
    ///
    /// Safe to call more than once; later calls wait for the first.
    #[instrument(level = "info", skip(self), fields(agent = %self.id))]
    pub async fn shutdown(&self) {
        let mut first = false;
        self.state.send_if_modified(|state| {
            if state.is_stopping() {
                false
            } else {
                *state = AgentState::ShuttingDown;
                first = true;
                true
            }
        });
        if !first {
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|s| *s == AgentState::Stopped).await;
            return;
        }

        info!("agent shutting down");
        self.token.cancel();

        let (jobsets, controllers, poll) = {
            let mut tasks = self.tasks();
            (
                mem::take(&mut tasks.jobsets),
                mem::take(&mut tasks.controllers),
                tasks.poll.take(),
            )
        };

        // Job sets keep syncing until every controller has torn down.
        for handle in controllers {
            if let Err(e) = handle.await {
                warn!(error = %e, "controller ended abnormally");
            }
        }
        for jobset in &jobsets {
            jobset.shutdown().await;
        }
        if let Some(poll) = poll {
            if let Err(e) = poll.await {
                warn!(error = %e, "status poll ended abnormally");
            }
        }

        if let Err(e) = self
            .service
            .update_launch_agent_status(&self.id, AgentStatus::Killed)
            .await
        {
            warn!(error = %e, "failed to report agent stop");
        }

        self.state.send_replace(AgentState::Stopped);
        info!("agent stopped");
    }
}
