use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// State of a launched run as reported by its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Unknown,
    Starting,
    Running,
    Finished,
    Failed,
    Stopped,
    Preempted,
}

impl RunState {
    /// The run will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Finished | RunState::Failed | RunState::Stopped | RunState::Preempted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Unknown => "unknown",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Finished => "finished",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
            RunState::Preempted => "preempted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "unknown" => Ok(RunState::Unknown),
            "starting" | "pending" => Ok(RunState::Starting),
            "running" => Ok(RunState::Running),
            "finished" | "succeeded" | "completed" => Ok(RunState::Finished),
            "failed" => Ok(RunState::Failed),
            "stopped" | "stopping" | "canceled" | "cancelled" => Ok(RunState::Stopped),
            "preempted" | "preempting" => Ok(RunState::Preempted),
            _ => Err(ModelError::UnknownRunState(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Stopped.is_terminal());
        assert!(RunState::Preempted.is_terminal());

        assert!(!RunState::Starting.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Unknown.is_terminal());
    }

    #[test]
    fn parse_backend_spellings() {
        assert_eq!("Succeeded".parse::<RunState>().unwrap(), RunState::Finished);
        assert_eq!("cancelled".parse::<RunState>().unwrap(), RunState::Stopped);
        assert_eq!("pending".parse::<RunState>().unwrap(), RunState::Starting);
        assert!("exploded".parse::<RunState>().is_err());
    }
}
