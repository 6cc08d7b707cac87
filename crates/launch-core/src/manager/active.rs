use std::collections::HashMap;

use launch_model::JobId;

use crate::collab::{RunHandle, TrackerRef};

/// A launched job owned by one manager.
pub struct ActiveRun {
    pub job_id: JobId,
    pub run_name: String,
    pub handle: Box<dyn RunHandle>,
    pub tracker: TrackerRef,
    /// The backend reported `running` at least once.
    pub seen_running: bool,
}

/// `job_id -> ActiveRun`, owned exclusively by one manager.
#[derive(Default)]
pub struct ActiveRuns {
    runs: HashMap<JobId, ActiveRun>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, run: ActiveRun) {
        self.runs.insert(run.job_id.clone(), run);
    }

    /// Remove a run; `None` when the id was not active.
    pub fn remove(&mut self, job_id: &str) -> Option<ActiveRun> {
        self.runs.remove(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<&ActiveRun> {
        self.runs.get(job_id)
    }

    pub fn get_mut(&mut self, job_id: &str) -> Option<&mut ActiveRun> {
        self.runs.get_mut(job_id)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.runs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Sorted ids, for stable iteration and logging.
    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.runs.keys().cloned().collect();
        ids.sort();
        ids
    }
}
