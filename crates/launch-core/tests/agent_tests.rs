mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use common::{FakeBuilder, FakeQueueService, FakeRunner, RunnerMode, config, eventually, job, metadata};
use launch_core::{
    Agent, AgentConfig, AgentState, Backend, BackendRouter, Builder, CoreError, LaunchProject,
    Manager, ManagerContext, ManagerCore, ManagerRegistry, QueueService, ReconcileMode, Runner,
    manager::label_flat,
};
use launch_model::{AgentStatus, MaxConcurrency, ResourceType};

fn router(resource: ResourceType, runner: &Arc<FakeRunner>) -> BackendRouter {
    BackendRouter::new().with(
        resource,
        Backend::new(
            Arc::new(FakeBuilder::default()) as Arc<dyn Builder>,
            Arc::clone(runner) as Arc<dyn Runner>,
        ),
    )
}

async fn agent_for(
    service: &Arc<FakeQueueService>,
    resource: ResourceType,
    runner: &Arc<FakeRunner>,
) -> Arc<Agent> {
    Agent::builder(config(), Arc::clone(service) as Arc<dyn QueueService>)
        .with_router(router(resource, runner))
        .register()
        .await
        .unwrap()
}

#[tokio::test]
async fn agent_launches_queued_work_and_reports_status() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    service.add_job(job("j1", 1, 1));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;
    assert_eq!(agent.id(), "agent-1");
    assert_eq!(agent.state(), AgentState::Registered);

    agent.start().await.unwrap();
    assert_eq!(agent.state(), AgentState::Running);

    assert!(eventually(Duration::from_secs(2), || runner.calls() == 1).await);
    assert!(eventually(Duration::from_secs(2), || agent.running_jobs() == 1).await);
    assert!(
        eventually(Duration::from_secs(2), || {
            service.statuses().contains(&AgentStatus::Running)
        })
        .await
    );
    assert!(eventually(Duration::from_secs(2), || agent.name() == "agent-1-name").await);

    agent.shutdown().await;
    assert_eq!(agent.state(), AgentState::Stopped);
    assert_eq!(service.statuses().last(), Some(&AgentStatus::Killed));
}

#[tokio::test]
async fn stop_request_from_the_service_ends_run() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;

    service.state().stop_polling = true;
    tokio::time::timeout(Duration::from_secs(2), agent.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(agent.state(), AgentState::Stopped);
}

#[tokio::test]
async fn local_runs_are_cancelled_on_shutdown() {
    let service = FakeQueueService::new(metadata(ResourceType::LocalProcess, MaxConcurrency::Limit(2)));
    service.add_job(job("j1", 1, 1));
    service.add_job(job("j2", 1, 2));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::LocalProcess, &runner).await;

    agent.start().await.unwrap();
    assert!(eventually(Duration::from_secs(2), || runner.calls() == 2).await);

    agent.shutdown().await;
    for id in ["j1", "j2"] {
        assert!(runner.run_for(id).unwrap().is_cancelled(), "{id} still live");
    }
}

#[tokio::test]
async fn passthrough_queue_is_served_from_the_run_queue() {
    let service = FakeQueueService::new(metadata(ResourceType::Vertex, MaxConcurrency::Limit(1)));
    service.enqueue(job("p1", 1, 1));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Vertex, &runner).await;

    agent.start().await.unwrap();
    assert!(eventually(Duration::from_secs(2), || runner.launched_jobs() == vec!["p1"]).await);
    agent.shutdown().await;
}

#[tokio::test]
async fn start_fails_when_no_queue_has_a_backend() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Sagemaker, &runner).await;

    let err = agent.start().await.unwrap_err();
    assert!(matches!(err, CoreError::NoBackend(ResourceType::Kubernetes)));
    agent.shutdown().await;
    assert_eq!(agent.state(), AgentState::Stopped);
}

#[tokio::test]
async fn unknown_resource_fails_the_queue() {
    let mut meta = metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1));
    meta.resource = "mainframe".to_string();
    let service = FakeQueueService::new(meta);
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;

    assert!(agent.start().await.is_err());
    agent.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected_before_registration() {
    let service = FakeQueueService::new(Default::default());
    let err = Agent::builder(AgentConfig::new("team", "proj"), Arc::clone(&service) as Arc<dyn QueueService>)
        .register()
        .await
        .err()
        .unwrap();

    assert!(matches!(err, CoreError::Config(_)));
    assert_eq!(service.state().agents, 0);
}

#[tokio::test]
async fn shutdown_twice_is_harmless() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;
    agent.start().await.unwrap();

    let (a, b) = (Arc::clone(&agent), Arc::clone(&agent));
    tokio::join!(a.shutdown(), b.shutdown());
    agent.shutdown().await;

    assert_eq!(agent.state(), AgentState::Stopped);
    let kills = service
        .statuses()
        .into_iter()
        .filter(|s| *s == AgentStatus::Killed)
        .count();
    assert_eq!(kills, 1);
    assert!(agent.start().await.is_err());
}

#[tokio::test]
async fn stop_during_start_abandons_the_unready_queue() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    service.state().diffs_unavailable = true;
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;

    let starting = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move { agent.start().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!starting.is_finished());

    agent.request_stop();
    tokio::time::timeout(Duration::from_secs(2), starting)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    agent.shutdown().await;

    assert_eq!(agent.state(), AgentState::Stopped);
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn service_stop_ends_run_while_a_queue_is_unready() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    {
        let mut state = service.state();
        state.diffs_unavailable = true;
        state.stop_polling = true;
    }
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;

    tokio::time::timeout(Duration::from_secs(2), agent.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(agent.state(), AgentState::Stopped);
}

/// 0 = not torn down, 1 = job set live at teardown, 2 = already stopped.
static TEARDOWN_SAW: AtomicU8 = AtomicU8::new(0);

struct TeardownRecorder {
    core: ManagerCore,
}

#[async_trait::async_trait]
impl Manager for TeardownRecorder {
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

    async fn teardown(&mut self) {
        let seen = if self.core.context().jobset.is_stopped() { 2 } else { 1 };
        TEARDOWN_SAW.store(seen, Ordering::SeqCst);
    }
}

fn teardown_recorder(ctx: ManagerContext) -> Result<Box<dyn Manager>, CoreError> {
    let driver = ctx.standard_driver();
    Ok(Box::new(TeardownRecorder {
        core: ManagerCore::new(ctx, driver, 1),
    }))
}

#[tokio::test]
async fn controllers_tear_down_before_job_sets_stop() {
    let service = FakeQueueService::new(metadata(ResourceType::LocalProcess, MaxConcurrency::Limit(1)));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let mut registry = ManagerRegistry::new();
    registry.register(ResourceType::LocalProcess, teardown_recorder);
    let agent = Agent::builder(config(), Arc::clone(&service) as Arc<dyn QueueService>)
        .with_router(router(ResourceType::LocalProcess, &runner))
        .with_registry(registry)
        .register()
        .await
        .unwrap();

    agent.start().await.unwrap();
    agent.shutdown().await;

    assert_eq!(TEARDOWN_SAW.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn agent_is_registered_before_it_starts() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    let runner = FakeRunner::new(RunnerMode::Launch);
    let agent = agent_for(&service, ResourceType::Kubernetes, &runner).await;

    assert_eq!(agent.state(), AgentState::Registered);
    assert_eq!(service.state().agents, 1);
    assert!(service.statuses().is_empty());

    agent.start().await.unwrap();
    assert!(agent.start().await.is_err());
    agent.shutdown().await;
}
