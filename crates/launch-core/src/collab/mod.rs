//! Injected collaborators: image builder, run launcher, run handles,
//! per-job status trackers and backend resource listing.
//!
//! The core never provisions anything itself; it drives these traits.

mod tracker;
pub use tracker::{MemoryTracker, MemoryTrackerFactory};

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use launch_model::{FailureStage, RunState};

use crate::{error::CoreError, project::LaunchProject};

/// Produces a container image for a project that does not name one.
#[async_trait]
pub trait Builder: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Returns the image URI.
    async fn build_image(
        &self,
        project: &LaunchProject,
        entrypoint: &[String],
        tracker: &dyn StatusTracker,
    ) -> Result<String, CoreError>;
}

/// Starts runs on one compute backend.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the backend accepted the call but produced no run.
    async fn run(
        &self,
        project: &LaunchProject,
        image_uri: &str,
    ) -> Result<Option<Box<dyn RunHandle>>, CoreError>;
}

/// A launched run.
#[async_trait]
pub trait RunHandle: Send + Sync {
    /// Backend-side identifier of the run.
    fn id(&self) -> &str;

    async fn get_status(&self) -> Result<RunState, CoreError>;

    async fn cancel(&self) -> Result<(), CoreError>;
}

/// Per-job diagnostic record kept outside of the queue service.
pub trait StatusTracker: Send + Sync {
    fn run_id(&self) -> &str;

    fn queue(&self) -> &str;

    /// Last run state observed by the manager.
    fn set_state(&self, state: RunState);

    fn state(&self) -> RunState;

    /// The job never got a running process.
    fn mark_failed_to_start(&self, stage: FailureStage, reason: &str);

    fn failed_to_start(&self) -> bool;

    /// Stage of the recorded failure, if any.
    fn err_stage(&self) -> Option<FailureStage>;

    /// Diagnostic files worth attaching to a failure report.
    fn files(&self) -> Vec<PathBuf>;
}

pub type TrackerRef = Arc<dyn StatusTracker>;

pub trait TrackerFactory: Send + Sync + 'static {
    fn create(&self, run_id: &str, queue: &str) -> Result<TrackerRef, CoreError>;
}

/// A backend resource carrying a queue's discoverability label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    /// Backend name of the resource (pod, training job, ...).
    pub name: String,
    /// Job id read back from the job label, when present. This is the label
    /// value, so it may be the sanitized form of the id.
    pub job_id: Option<String>,
}

/// Lists backend resources by label, used for orphan discovery.
#[async_trait]
pub trait ResourceLister: Send + Sync + 'static {
    async fn list_labeled(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<DiscoveredResource>, CoreError>;
}
