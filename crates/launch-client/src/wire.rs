//! GraphQL envelope and the payload shapes that differ from the model types.

use std::time::{Duration, UNIX_EPOCH};

use launch_model::{Job, JobState};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::ClientError;

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub query: &'a str,
    pub variables: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub message: String,
}

impl Response {
    /// Pull `data.<operation>` out of the envelope as `T`.
    ///
    /// A `null` field deserializes fine into `Option<T>`; a missing one
    /// is an invalid response.
    pub fn field<T: DeserializeOwned>(self, operation: &'static str) -> Result<T, ClientError> {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Graphql { operation, message });
        }
        let mut data = self.data.ok_or_else(|| ClientError::InvalidResponse {
            operation,
            reason: "no data".into(),
        })?;
        let field = data
            .get_mut(operation)
            .map(Value::take)
            .ok_or_else(|| ClientError::InvalidResponse {
                operation,
                reason: format!("missing field {operation}"),
            })?;
        serde_json::from_value(field).map_err(|e| ClientError::InvalidResponse {
            operation,
            reason: e.to_string(),
        })
    }
}

/// `{ success }` result of most mutations.
#[derive(Debug, Deserialize)]
pub(crate) struct Success {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedAgent {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub launch_agent_id: Value,
    #[serde(default)]
    pub name: Option<String>,
}

/// A run queue item as the passthrough endpoints return it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunQueueItem {
    pub run_queue_item_id: Value,
    #[serde(default)]
    pub run_spec: Value,
    #[serde(default)]
    pub priority: Option<i64>,
    /// Milliseconds since the unix epoch.
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub state: Option<JobState>,
}

impl RunQueueItem {
    /// Popped items belong to the popping agent, hence `CLAIMED` unless
    /// the service says otherwise.
    pub fn into_job(self, agent_id: &str) -> Option<Job> {
        let id = id_string(&self.run_queue_item_id)?;
        let created_at = UNIX_EPOCH + Duration::from_millis(self.created_at.unwrap_or(0));
        let mut job =
            Job::new(id, self.priority.unwrap_or_default(), created_at).with_run_spec(self.run_spec);
        job.state = self.state.unwrap_or(JobState::Claimed);
        job.claimed_by = agent_id.to_string();
        Some(job)
    }
}

/// IDs come back as strings or integers depending on the service version.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
