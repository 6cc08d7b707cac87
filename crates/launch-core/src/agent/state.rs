use std::fmt;

/// Lifecycle of the process-wide agent.
///
/// The created-but-unregistered phase is the [`AgentBuilder`](super::AgentBuilder):
/// an [`Agent`](super::Agent) only exists once registration succeeded, so
/// `Registered` is the first state one can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// Registered with the queue service; nothing running yet.
    Registered,
    /// Job sets syncing and controllers reconciling.
    Running,
    ShuttingDown,
    Stopped,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Registered => "registered",
            AgentState::Running => "running",
            AgentState::ShuttingDown => "shutting_down",
            AgentState::Stopped => "stopped",
        }
    }

    /// Shutdown has begun or finished.
    pub fn is_stopping(&self) -> bool {
        matches!(self, AgentState::ShuttingDown | AgentState::Stopped)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
