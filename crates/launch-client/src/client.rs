use std::path::PathBuf;

use async_trait::async_trait;
use launch_core::{AgentInfo, AgentRegistration, CoreError, QueueScope, QueueService, host_name};
use launch_model::{AgentStatus, FailureStage, Job, JobSetDiff, JobSetInfo};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};

use crate::{
    config::ClientConfig,
    errors::ClientError,
    queries,
    wire::{CreatedAgent, Request, Response, RunQueueItem, Success, id_string},
};

/// [`QueueService`] over the queue service's GraphQL endpoint.
#[derive(Clone)]
pub struct HttpQueueClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpQueueClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("launch-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: cfg.graphql_url(),
            api_key: cfg.api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, ClientError> {
        trace!(operation, "graphql request");
        let mut request = self.http.post(&self.url).json(&Request { query, variables });
        if let Some(key) = &self.api_key {
            request = request.basic_auth("api", Some(key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Response = response.json().await?;
        envelope.field(operation)
    }

    async fn success(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<bool, CoreError> {
        let result: Option<Success> = self.execute(operation, query, variables).await?;
        Ok(result.is_some_and(|r| r.success))
    }

    async fn run_queue_item(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
        agent_id: &str,
    ) -> Result<Option<Job>, CoreError> {
        let item: Option<RunQueueItem> = self.execute(operation, query, variables).await?;
        match item {
            None => Ok(None),
            Some(item) => item.into_job(agent_id).map(Some).ok_or_else(|| {
                ClientError::InvalidResponse {
                    operation,
                    reason: "run queue item without id".into(),
                }
                .into()
            }),
        }
    }
}

#[async_trait]
impl QueueService for HttpQueueClient {
    #[instrument(level = "debug", skip(self))]
    async fn create_launch_agent(
        &self,
        entity: &str,
        project: &str,
        queues: &[String],
    ) -> Result<AgentRegistration, CoreError> {
        let created: CreatedAgent = self
            .execute(
                "createLaunchAgent",
                queries::CREATE_LAUNCH_AGENT,
                json!({
                    "entity": entity,
                    "project": project,
                    "queues": queues,
                    "hostname": host_name().unwrap_or_default(),
                }),
            )
            .await?;
        let id = match id_string(&created.launch_agent_id) {
            Some(id) if created.success => id,
            _ => {
                return Err(CoreError::Service(
                    "queue service refused to register the agent".into(),
                ));
            }
        };
        debug!(agent = %id, "launch agent created");
        Ok(AgentRegistration {
            id,
            name: created.name,
        })
    }

    async fn get_launch_agent(&self, agent_id: &str) -> Result<AgentInfo, CoreError> {
        let info: Option<AgentInfo> = self
            .execute(
                "launchAgent",
                queries::LAUNCH_AGENT,
                json!({ "agentId": agent_id }),
            )
            .await?;
        info.ok_or_else(|| CoreError::Service(format!("launch agent {agent_id} not found")))
    }

    async fn update_launch_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<bool, CoreError> {
        self.success(
            "updateLaunchAgent",
            queries::UPDATE_LAUNCH_AGENT,
            json!({ "agentId": agent_id, "agentStatus": status.as_str() }),
        )
        .await
    }

    async fn get_jobset_by_spec(
        &self,
        name: &str,
        entity: &str,
        project: &str,
    ) -> Result<JobSetInfo, CoreError> {
        let info: Option<JobSetInfo> = self
            .execute(
                "jobSetBySpec",
                queries::JOB_SET_BY_SPEC,
                json!({ "name": name, "entity": entity, "project": project }),
            )
            .await?;
        info.ok_or_else(|| CoreError::Service(format!("no job set for {entity}/{project}/{name}")))
    }

    #[instrument(level = "trace", skip(self))]
    async fn get_jobset_diff_by_id(
        &self,
        jobset_id: &str,
        known_version: u64,
        agent_id: &str,
    ) -> Result<JobSetDiff, CoreError> {
        Ok(self
            .execute(
                "jobSetDiffById",
                queries::JOB_SET_DIFF_BY_ID,
                json!({
                    "jobSetId": jobset_id,
                    "knownVersion": known_version,
                    "agentId": agent_id,
                }),
            )
            .await?)
    }

    async fn lease_jobset_item(
        &self,
        jobset_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> Result<bool, CoreError> {
        self.success(
            "leaseJobSetItem",
            queries::LEASE_JOB_SET_ITEM,
            json!({ "jobSetId": jobset_id, "jobId": job_id, "agentId": agent_id }),
        )
        .await
    }

    async fn ack_jobset_item(
        &self,
        jobset_id: &str,
        job_id: &str,
        agent_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError> {
        self.success(
            "ackJobSetItem",
            queries::ACK_JOB_SET_ITEM,
            json!({
                "jobSetId": jobset_id,
                "jobId": job_id,
                "agentId": agent_id,
                "runName": run_name,
            }),
        )
        .await
    }

    async fn fail_run_queue_item(
        &self,
        item_id: &str,
        message: &str,
        stage: FailureStage,
        file_paths: &[PathBuf],
    ) -> Result<bool, CoreError> {
        let paths: Vec<String> = file_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        self.success(
            "failRunQueueItem",
            queries::FAIL_RUN_QUEUE_ITEM,
            json!({
                "runQueueItemId": item_id,
                "message": message,
                "stage": stage.as_str(),
                "filePaths": paths,
            }),
        )
        .await
    }

    async fn pop_from_run_queue(&self, scope: &QueueScope) -> Result<Option<Job>, CoreError> {
        self.run_queue_item(
            "popFromRunQueue",
            queries::POP_FROM_RUN_QUEUE,
            json!({
                "queueName": scope.queue_name,
                "entityName": scope.entity,
                "projectName": scope.project,
                "launchAgentId": scope.agent_id,
            }),
            &scope.agent_id,
        )
        .await
    }

    async fn get_run_queue_item(
        &self,
        scope: &QueueScope,
        item_id: &str,
    ) -> Result<Option<Job>, CoreError> {
        self.run_queue_item(
            "runQueueItem",
            queries::RUN_QUEUE_ITEM,
            json!({
                "queueName": scope.queue_name,
                "entityName": scope.entity,
                "projectName": scope.project,
                "itemId": item_id,
            }),
            &scope.agent_id,
        )
        .await
    }

    async fn ack_run_queue_item(
        &self,
        scope: &QueueScope,
        item_id: &str,
        run_name: &str,
    ) -> Result<bool, CoreError> {
        self.success(
            "ackRunQueueItem",
            queries::ACK_RUN_QUEUE_ITEM,
            json!({
                "itemId": item_id,
                "runId": run_name,
                "launchAgentId": scope.agent_id,
            }),
        )
        .await
    }
}
