use std::fmt;

use serde::{Deserialize, Serialize};

/// Status an agent reports about itself to the queue service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Idle, waiting for work.
    Polling,
    /// At least one run is active.
    Running,
    /// Shut down.
    Killed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Polling => "POLLING",
            AgentStatus::Running => "RUNNING",
            AgentStatus::Killed => "KILLED",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
