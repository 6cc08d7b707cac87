mod common;

use std::sync::Arc;

use common::{FakeQueueService, job, metadata, ready_jobset};
use launch_core::{
    DriverKind, PassthroughQueueDriver, QueueDriver, QueueScope, QueueService,
    StandardQueueDriver,
};
use launch_model::{
    FailureStage, JobSetMetadata, JobState, MaxConcurrency, PrioritizationMode, ResourceType,
};

fn v0_metadata() -> JobSetMetadata {
    JobSetMetadata {
        prioritization_mode: PrioritizationMode::V0,
        ..metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(4))
    }
}

fn scope(agent: &str) -> QueueScope {
    QueueScope {
        queue_name: "gpu".into(),
        entity: "team".into(),
        project: "proj".into(),
        agent_id: agent.into(),
    }
}

#[tokio::test]
async fn racing_agents_never_both_win_a_lease() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    service.add_job(job("only", 1, 1));

    let first = StandardQueueDriver::new(ready_jobset(&service, "agent-1").await);
    let second = StandardQueueDriver::new(ready_jobset(&service, "agent-2").await);

    let (a, b) = tokio::join!(first.pop_next(), second.pop_next());
    let winners: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();

    assert_eq!(winners.len(), 1);
    let leases = service.state().leases.clone();
    assert_eq!(leases.len(), 1);
    assert_eq!(winners[0].claimed_by, leases[0].1);
}

#[tokio::test]
async fn v0_pops_most_urgent_priority_first() {
    let service = FakeQueueService::new(v0_metadata());
    service.add_job(job("A", 2, 1));
    service.add_job(job("B", 0, 2));
    service.add_job(job("C", 1, 3));

    let driver = StandardQueueDriver::new(ready_jobset(&service, "agent-1").await);
    let popped = driver.pop_next().await.unwrap().unwrap();

    assert_eq!(popped.id, "B");
    assert_eq!(popped.state, JobState::Leased);
    assert_eq!(popped.claimed_by, "agent-1");
}

#[tokio::test]
async fn without_prioritization_oldest_job_wins() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(4)));
    service.add_job(job("A", 2, 1));
    service.add_job(job("B", 0, 2));

    let driver = StandardQueueDriver::new(ready_jobset(&service, "agent-1").await);
    assert_eq!(driver.pop_next().await.unwrap().unwrap().id, "A");
}

#[tokio::test]
async fn empty_queue_pops_nothing() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(1)));
    let driver = StandardQueueDriver::new(ready_jobset(&service, "agent-1").await);

    assert!(driver.pop_next().await.unwrap().is_none());
    assert!(service.state().leases.is_empty());
}

#[tokio::test]
async fn standard_owned_items_are_this_agents_held_jobs() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(4)));
    service.add_job(job("mine", 1, 1));
    service.add_job(job("theirs", 1, 2));
    service
        .lease_jobset_item(common::JOBSET_ID, "theirs", "agent-2")
        .await
        .unwrap();

    let jobset = ready_jobset(&service, "agent-1").await;
    let driver = StandardQueueDriver::new(Arc::clone(&jobset));
    let popped = driver.pop_next().await.unwrap().unwrap();
    assert_eq!(popped.id, "mine");

    let owned = driver.owned_items(&[]).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, "mine");
    assert_eq!(driver.kind(), DriverKind::Standard);
    jobset.shutdown().await;
}

#[tokio::test]
async fn acting_on_another_agents_job_is_refused() {
    let service = FakeQueueService::new(metadata(ResourceType::Kubernetes, MaxConcurrency::Limit(4)));
    service.add_job(job("theirs", 1, 1));
    service
        .lease_jobset_item(common::JOBSET_ID, "theirs", "agent-2")
        .await
        .unwrap();

    let jobset = ready_jobset(&service, "agent-1").await;
    let driver = StandardQueueDriver::new(Arc::clone(&jobset));

    assert!(!driver.ack("theirs", "run-x").await.unwrap());
    assert!(
        !driver
            .fail("theirs", "nope", FailureStage::Agent, &[])
            .await
            .unwrap()
    );
    assert!(service.acks().is_empty());
    assert!(service.fails().is_empty());
    jobset.shutdown().await;
}

#[tokio::test]
async fn passthrough_tracks_popped_items_until_terminal() {
    let service = FakeQueueService::new(metadata(ResourceType::Sagemaker, MaxConcurrency::Limit(2)));
    service.enqueue(job("p1", 1, 1));
    service.enqueue(job("p2", 1, 2));

    let driver = PassthroughQueueDriver::new(scope("agent-1"), Arc::clone(&service) as Arc<dyn QueueService>);
    assert_eq!(driver.kind(), DriverKind::Passthrough);

    let first = driver.pop_next().await.unwrap().unwrap();
    let second = driver.pop_next().await.unwrap().unwrap();
    assert_eq!((first.id.as_str(), second.id.as_str()), ("p1", "p2"));
    assert!(driver.pop_next().await.unwrap().is_none());

    // Popped but not yet launched items stay owned.
    assert_eq!(driver.owned_items(&[]).await.unwrap().len(), 2);

    service.set_job_state("p1", JobState::Done);
    let owned = driver.owned_items(&["p1".to_string()]).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, "p2");

    driver.forget("p2");
    assert!(driver.owned_items(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn passthrough_keeps_items_when_lookup_fails() {
    let service = FakeQueueService::new(metadata(ResourceType::Vertex, MaxConcurrency::Limit(1)));
    service.enqueue(job("p1", 1, 1));

    let driver = PassthroughQueueDriver::new(scope("agent-1"), Arc::clone(&service) as Arc<dyn QueueService>);
    driver.pop_next().await.unwrap();

    service.state().unavailable = true;
    let owned = driver.owned_items(&["p1".to_string()]).await.unwrap();
    assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn passthrough_fail_drops_the_item() {
    let service = FakeQueueService::new(metadata(ResourceType::Vertex, MaxConcurrency::Limit(1)));
    service.enqueue(job("p1", 1, 1));

    let driver = PassthroughQueueDriver::new(scope("agent-1"), Arc::clone(&service) as Arc<dyn QueueService>);
    driver.pop_next().await.unwrap();
    assert!(driver.fail("p1", "boom", FailureStage::Run, &[]).await.unwrap());

    assert!(driver.owned_items(&[]).await.unwrap().is_empty());
    assert_eq!(service.fails()[0].2, FailureStage::Run);
}
