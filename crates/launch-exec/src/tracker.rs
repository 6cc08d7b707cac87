use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use launch_core::{CoreError, StatusTracker, TrackerFactory, collab::TrackerRef};
use launch_model::{FailureStage, RunState};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ExecError;

/// On-disk snapshot of one run's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub run_id: String,
    pub queue: String,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_stage: Option<FailureStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updated_at_ms: u64,
}

/// Tracker persisting every change to `<root>/<queue>/<run_id>.json`.
///
/// The file is what gets attached to failure reports.
pub struct DirTracker {
    run_id: String,
    queue: String,
    path: PathBuf,
    record: Mutex<StatusRecord>,
}

impl DirTracker {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self) -> MutexGuard<'_, StatusRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut StatusRecord)) {
        let mut record = self.record();
        f(&mut record);
        record.updated_at_ms = now_ms();
        if let Err(e) = write_record(&self.path, &record) {
            warn!(path = %self.path.display(), error = %e, "status file write failed");
        }
    }
}

impl StatusTracker for DirTracker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    fn set_state(&self, state: RunState) {
        if self.record().state != state {
            self.update(|r| r.state = state);
        }
    }

    fn state(&self) -> RunState {
        self.record().state
    }

    fn mark_failed_to_start(&self, stage: FailureStage, reason: &str) {
        self.update(|r| {
            r.state = RunState::Failed;
            r.err_stage = Some(stage);
            r.reason = Some(reason.to_string());
        });
    }

    fn failed_to_start(&self) -> bool {
        self.record().err_stage.is_some()
    }

    fn err_stage(&self) -> Option<FailureStage> {
        self.record().err_stage
    }

    fn files(&self) -> Vec<PathBuf> {
        if self.path.exists() {
            vec![self.path.clone()]
        } else {
            Vec::new()
        }
    }
}

/// Creates [`DirTracker`]s under one root directory.
#[derive(Debug, Clone)]
pub struct DirTrackerFactory {
    root: PathBuf,
}

impl DirTrackerFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TrackerFactory for DirTrackerFactory {
    fn create(&self, run_id: &str, queue: &str) -> Result<TrackerRef, CoreError> {
        if !is_plain_name(run_id) || !is_plain_name(queue) {
            return Err(
                ExecError::InvalidArgs(format!("unusable tracker name {queue}/{run_id}")).into(),
            );
        }
        let dir = self.root.join(queue);
        fs::create_dir_all(&dir).map_err(ExecError::from)?;

        let record = StatusRecord {
            run_id: run_id.to_string(),
            queue: queue.to_string(),
            state: RunState::Unknown,
            err_stage: None,
            reason: None,
            updated_at_ms: now_ms(),
        };
        let path = dir.join(format!("{run_id}.json"));
        write_record(&path, &record)?;
        Ok(Arc::new(DirTracker {
            run_id: run_id.to_string(),
            queue: queue.to_string(),
            path,
            record: Mutex::new(record),
        }))
    }
}

fn write_record(path: &Path, record: &StatusRecord) -> Result<(), ExecError> {
    let body = serde_json::to_vec_pretty(record).map_err(|e| ExecError::Io(e.to_string()))?;
    fs::write(path, body)?;
    Ok(())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> StatusRecord {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn tracker_persists_state_changes() {
        let dir = tempfile::tempdir().unwrap();
        let factory = DirTrackerFactory::new(dir.path());
        let tracker = factory.create("run-1", "gpu").unwrap();

        assert_eq!(tracker.run_id(), "run-1");
        assert_eq!(tracker.queue(), "gpu");
        let files = tracker.files();
        assert_eq!(files, vec![dir.path().join("gpu").join("run-1.json")]);

        tracker.set_state(RunState::Running);
        assert_eq!(read(&files[0]).state, RunState::Running);
    }

    #[test]
    fn failure_to_start_is_recorded_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = DirTrackerFactory::new(dir.path()).create("run-2", "gpu").unwrap();

        tracker.mark_failed_to_start(FailureStage::Agent, "image build failed");
        assert!(tracker.failed_to_start());
        assert_eq!(tracker.err_stage(), Some(FailureStage::Agent));

        let record = read(&tracker.files()[0]);
        assert_eq!(record.state, RunState::Failed);
        assert_eq!(record.reason.as_deref(), Some("image build failed"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let factory = DirTrackerFactory::new(dir.path());
        assert!(factory.create("../escape", "gpu").is_err());
        assert!(factory.create("run", "a/b").is_err());
    }
}
