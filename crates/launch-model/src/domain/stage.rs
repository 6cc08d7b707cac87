use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a job failed, relative to its process starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Before the run's process began (spec validation, image build).
    Agent,
    /// At or after run start.
    Run,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Agent => "agent",
            FailureStage::Run => "run",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
