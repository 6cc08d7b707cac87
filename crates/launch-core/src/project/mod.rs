//! Launch specification built from a job's opaque `run_spec`.

mod args;
mod merge;

pub use args::user_args_to_map;
pub use merge::merge_defaults;

use launch_model::{Job, ResourceType};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CoreError;

/// Where a project is being built: the agent's identity and queue defaults.
#[derive(Debug, Clone)]
pub struct ProjectContext<'a> {
    pub entity: &'a str,
    pub project: &'a str,
    pub queue: &'a str,
    pub resource: ResourceType,
    /// Default `resource_args` blocks, highest precedence first.
    pub defaults: Vec<&'a Value>,
}

/// Everything a builder and runner need to start one job.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchProject {
    pub job_id: String,
    /// Run identity the job is acked with.
    pub run_id: String,
    pub entity: String,
    pub project: String,
    pub queue: String,
    pub resource: ResourceType,
    /// Job artifact reference (`entity/project/job:alias`).
    pub job: Option<String>,
    /// Source URI for jobs launched from code.
    pub uri: Option<String>,
    /// Pre-built image; when absent the builder produces one.
    pub docker_image: Option<String>,
    pub entry_point: Vec<String>,
    /// Overrides with `args` normalised into a key/value map.
    pub overrides: Value,
    /// Backend-specific blocks keyed by resource name.
    pub resource_args: Map<String, Value>,
}

impl LaunchProject {
    pub fn from_job(job: &Job, ctx: &ProjectContext<'_>) -> Result<Self, CoreError> {
        let spec = job
            .run_spec
            .as_object()
            .ok_or_else(|| CoreError::InvalidSpec(format!("run spec of job {} is not an object", job.id)))?;

        let spec_entity = str_field(spec, "entity");
        let spec_project = str_field(spec, "project");
        if spec_entity.is_some_and(|e| e != ctx.entity)
            || spec_project.is_some_and(|p| !ctx.project.is_empty() && p != ctx.project)
        {
            warn!(
                job = %job.id,
                entity = ctx.entity,
                project = ctx.project,
                "launch spec targets another entity/project; sending run to the agent's own"
            );
        }
        let project = if ctx.project.is_empty() {
            spec_project.unwrap_or_default().to_string()
        } else {
            ctx.project.to_string()
        };

        let job_ref = str_field(spec, "job").map(str::to_string);
        let uri = str_field(spec, "uri").map(str::to_string);
        let docker_image = spec
            .get("docker")
            .and_then(|d| d.get("docker_image"))
            .and_then(Value::as_str)
            .or_else(|| str_field(spec, "image_uri"))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if job_ref.is_none() && uri.is_none() && docker_image.is_none() {
            return Err(CoreError::InvalidSpec(format!(
                "run spec of job {} names neither a job, a uri nor an image",
                job.id
            )));
        }

        let entry_point = match spec.get("entry_point") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        CoreError::InvalidSpec("entry_point items must be strings".into())
                    })
                })
                .collect::<Result<Vec<String>, CoreError>>()?,
            Some(other) => {
                return Err(CoreError::InvalidSpec(format!(
                    "entry_point must be a string or list, got {other}"
                )));
            }
        };

        let mut overrides = spec.get("overrides").cloned().unwrap_or(Value::Null);
        if let Some(args) = overrides.get("args").and_then(Value::as_array) {
            let normalised = user_args_to_map(args)?;
            overrides["args"] = Value::Object(normalised);
        }

        let mut resource_args = match spec.get("resource_args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(other) => {
                return Err(CoreError::InvalidSpec(format!(
                    "resource_args must be an object, got {other}"
                )));
            }
        };
        for defaults in &ctx.defaults {
            if let Some(block) = defaults.as_object() {
                merge_defaults(&mut resource_args, ctx.resource.as_str(), block);
            }
        }

        let run_id = str_field(spec, "run_id")
            .map(str::to_string)
            .unwrap_or_else(generate_run_id);

        Ok(Self {
            job_id: job.id.clone(),
            run_id,
            entity: ctx.entity.to_string(),
            project,
            queue: ctx.queue.to_string(),
            resource: ctx.resource,
            job: job_ref,
            uri,
            docker_image,
            entry_point,
            overrides,
            resource_args,
        })
    }

    /// Mutable backend block for this project's resource, created on demand.
    pub fn resource_block_mut(&mut self) -> &mut Map<String, Value> {
        let key = self.resource.as_str().to_string();
        let slot = self
            .resource_args
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        }
    }

    /// Read-only view of this project's backend block.
    pub fn resource_block(&self) -> Option<&Map<String, Value>> {
        self.resource_args
            .get(self.resource.as_str())
            .and_then(Value::as_object)
    }
}

fn str_field<'a>(spec: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    spec.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Short lowercase run id, the shape the tracking backend generates.
fn generate_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
