//! Discoverability labels attached to backend resources before launch.
//!
//! Every launched resource carries the queue label (a hash of the queue's
//! entity and name) and the job id, so orphan discovery can attribute
//! resources back to a queue after an agent crash.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::project::LaunchProject;

pub const QUEUE_LABEL_KEY: &str = "launch-queue";
pub const JOB_LABEL_KEY: &str = "launch-job";

pub const QUEUE_LABEL_ENV: &str = "LAUNCH_QUEUE_LABEL";
pub const JOB_ID_ENV: &str = "LAUNCH_JOB_ID";

/// Deterministic label for a queue: first 16 hex chars of SHA-256(`entity/queue`).
pub fn queue_label(entity: &str, queue: &str) -> String {
    let digest = Sha256::digest(format!("{entity}/{queue}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Kubernetes label values: alphanumerics, `-`, `_`, `.`, at most 63 chars,
/// starting and ending alphanumeric.
pub fn sanitize_label_value(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(63)
        .collect();
    mapped
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// `metadata.labels` on the job object.
pub fn label_kubernetes(project: &mut LaunchProject, label: &str) {
    let job_value = sanitize_label_value(&project.job_id);
    let block = project.resource_block_mut();
    let labels = object_at(block, &["metadata", "labels"]);
    labels.insert(QUEUE_LABEL_KEY.into(), json!(label));
    labels.insert(JOB_LABEL_KEY.into(), json!(job_value));
}

/// `Tags` list of `{Key, Value}` pairs on the training job.
pub fn label_sagemaker(project: &mut LaunchProject, label: &str) {
    let job_id = project.job_id.clone();
    let block = project.resource_block_mut();
    let tags = block
        .entry("Tags")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !tags.is_array() {
        *tags = Value::Array(Vec::new());
    }
    if let Value::Array(tags) = tags {
        for (key, value) in [(QUEUE_LABEL_KEY, label.to_string()), (JOB_LABEL_KEY, job_id)] {
            tags.retain(|t| t.get("Key").and_then(Value::as_str) != Some(key));
            tags.push(json!({"Key": key, "Value": value}));
        }
    }
}

/// Flat `labels` map: Vertex custom jobs, docker `--label`, nested schedulers.
pub fn label_flat(project: &mut LaunchProject, label: &str) {
    let job_value = sanitize_label_value(&project.job_id).to_ascii_lowercase();
    let block = project.resource_block_mut();
    let labels = object_at(block, &["labels"]);
    labels.insert(QUEUE_LABEL_KEY.into(), json!(label));
    labels.insert(JOB_LABEL_KEY.into(), json!(job_value));
}

/// Local processes carry the labels as environment variables.
pub fn label_process_env(project: &mut LaunchProject, label: &str) {
    let job_id = project.job_id.clone();
    let block = project.resource_block_mut();
    let env = object_at(block, &["env"]);
    env.insert(QUEUE_LABEL_ENV.into(), json!(label));
    env.insert(JOB_ID_ENV.into(), json!(job_id));
}

/// Walk (and create) nested objects along `path`.
fn object_at<'a>(root: &'a mut Map<String, Value>, path: &[&str]) -> &'a mut Map<String, Value> {
    let mut current = root;
    for key in path {
        let slot = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectContext;
    use launch_model::{Job, ResourceType};
    use std::time::UNIX_EPOCH;

    fn project(resource: ResourceType) -> LaunchProject {
        let job = Job::new("Job/42", 1, UNIX_EPOCH).with_run_spec(json!({"job": "x"}));
        let ctx = ProjectContext {
            entity: "team",
            project: "proj",
            queue: "q",
            resource,
            defaults: vec![],
        };
        LaunchProject::from_job(&job, &ctx).unwrap()
    }

    #[test]
    fn queue_label_is_deterministic_and_scoped() {
        let a = queue_label("team", "gpu");
        assert_eq!(a.len(), 16);
        assert_eq!(a, queue_label("team", "gpu"));
        assert_ne!(a, queue_label("team", "cpu"));
        assert_ne!(a, queue_label("other", "gpu"));
    }

    #[test]
    fn sanitize_replaces_and_trims() {
        assert_eq!(sanitize_label_value("Job/42"), "Job-42");
        assert_eq!(sanitize_label_value("/x/"), "x");
        assert_eq!(sanitize_label_value(&"a".repeat(80)).len(), 63);
    }

    #[test]
    fn kubernetes_labels_land_in_metadata() {
        let mut p = project(ResourceType::Kubernetes);
        label_kubernetes(&mut p, "abc");
        let labels = &p.resource_args["kubernetes"]["metadata"]["labels"];
        assert_eq!(labels[QUEUE_LABEL_KEY], "abc");
        assert_eq!(labels[JOB_LABEL_KEY], "Job-42");
    }

    #[test]
    fn sagemaker_tags_are_not_duplicated() {
        let mut p = project(ResourceType::Sagemaker);
        label_sagemaker(&mut p, "abc");
        label_sagemaker(&mut p, "abc");
        let tags = p.resource_args["sagemaker"]["Tags"].as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().any(|t| t["Key"] == QUEUE_LABEL_KEY && t["Value"] == "abc"));
    }

    #[test]
    fn process_env_labels() {
        let mut p = project(ResourceType::LocalProcess);
        label_process_env(&mut p, "abc");
        let env = &p.resource_args["local-process"]["env"];
        assert_eq!(env[QUEUE_LABEL_ENV], "abc");
        assert_eq!(env[JOB_ID_ENV], "Job/42");
    }

    #[test]
    fn flat_labels_are_lowercase() {
        let mut p = project(ResourceType::Vertex);
        label_flat(&mut p, "abc");
        assert_eq!(p.resource_args["vertex"]["labels"][JOB_LABEL_KEY], "job-42");
    }
}
