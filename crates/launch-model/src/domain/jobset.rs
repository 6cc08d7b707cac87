use serde::{Deserialize, Serialize};

use super::{Job, JobId, MaxConcurrency, PrioritizationMode};

/// Queue-level settings carried alongside the job set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSetMetadata {
    /// Target resource type name (parsed into `ResourceType` by the agent).
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub max_concurrency: MaxConcurrency,
    #[serde(default)]
    pub prioritization_mode: PrioritizationMode,
    /// Queue default `resource_args`, merged under every job's own.
    #[serde(default)]
    pub default_resource_config: serde_json::Value,
}

/// Identity of a job set as returned by a lookup by queue spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSetInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: JobSetMetadata,
}

/// Incremental change to a job set since a known version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSetDiff {
    pub version: u64,
    /// `true` when the diff is a full snapshot of the job set.
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobSetMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upsert_jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_jobs: Vec<JobId>,
}
