//! Remote queue service as seen by the agent.
//!
//! Transport is someone else's problem: `launch-client` talks HTTP, tests
//! use an in-memory fake. Every method returns `CoreError::Service` for
//! transport failures; a `false`/`None` result is a regular answer.

use std::path::PathBuf;

use async_trait::async_trait;
use launch_model::{AgentStatus, FailureStage, Job, JobSetDiff, JobSetInfo};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Result of registering an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    pub id: String,
    /// Not every service version returns a name on creation.
    #[serde(default)]
    pub name: Option<String>,
}

/// Agent record as polled from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    /// Operator asked the agent to stop.
    #[serde(default)]
    pub stop_polling: bool,
}

/// Scope of the passthrough run-queue primitives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueScope {
    pub queue_name: String,
    pub entity: String,
    pub project: String,
    pub agent_id: String,
}

#[async_trait]
pub trait QueueService: Send + Sync + 'static {
    // agent lifecycle

    async fn create_launch_agent(
        &self,
        entity: &str,
        project: &str,
        queues: &[String],
    ) -> Result<AgentRegistration, CoreError>;

    async fn get_launch_agent(&self, agent_id: &str) -> Result<AgentInfo, CoreError>;

    async fn update_launch_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<bool, CoreError>;

    // job sets

    async fn get_jobset_by_spec(
        &self,
        name: &str,
        entity: &str,
        project: &str,
    ) -> Result<JobSetInfo, CoreError>;

    async fn get_jobset_diff_by_id(
        &self,
        jobset_id: &str,
        known_version: u64,
        agent_id: &str,
    ) -> Result<JobSetDiff, CoreError>;

    async fn lease_jobset_item(
        &self,
        jobset_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> Result<bool, CoreError>;

    async fn ack_jobset_item(
        &self,
        jobset_id: &str,
        job_id: &str,
        agent_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError>;

    async fn fail_run_queue_item(
        &self,
        item_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError>;

    // passthrough run queue

    async fn pop_from_run_queue(&self, scope: &QueueScope) -> Result<Option<Job>, CoreError>;

    async fn get_run_queue_item(
        &self,
        scope: &QueueScope,
        item_id: &str,
    ) -> Result<Option<Job>, CoreError>;

    async fn ack_run_queue_item(
        &self,
        scope: &QueueScope,
        item_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError>;
}
