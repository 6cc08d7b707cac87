use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use launch_model::{FailureStage, RunState};

use super::{StatusTracker, TrackerFactory, TrackerRef};
use crate::error::CoreError;

/// Tracker that keeps everything in memory and reports no files.
pub struct MemoryTracker {
    run_id: String,
    queue: String,
    inner: Mutex<TrackerInner>,
}

struct TrackerInner {
    state: RunState,
    failure: Option<(FailureStage, String)>,
}

impl MemoryTracker {
    pub fn new(run_id: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            queue: queue.into(),
            inner: Mutex::new(TrackerInner {
                state: RunState::Unknown,
                failure: None,
            }),
        }
    }

    /// Recorded failure reason, if any.
    pub fn failure_reason(&self) -> Option<String> {
        self.lock().failure.as_ref().map(|(_, r)| r.clone())
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatusTracker for MemoryTracker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    fn set_state(&self, state: RunState) {
        self.lock().state = state;
    }

    fn state(&self) -> RunState {
        self.lock().state
    }

    fn mark_failed_to_start(&self, stage: FailureStage, reason: &str) {
        let mut inner = self.lock();
        inner.state = RunState::Failed;
        inner.failure = Some((stage, reason.to_string()));
    }

    fn failed_to_start(&self) -> bool {
        self.lock().failure.is_some()
    }

    fn err_stage(&self) -> Option<FailureStage> {
        self.lock().failure.as_ref().map(|(stage, _)| *stage)
    }

    fn files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTrackerFactory;

impl TrackerFactory for MemoryTrackerFactory {
    fn create(&self, run_id: &str, queue: &str) -> Result<TrackerRef, CoreError> {
        Ok(Arc::new(MemoryTracker::new(run_id, queue)))
    }
}
