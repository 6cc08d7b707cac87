use launch_model::{ModelError, ResourceType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport or service-side failure talking to the queue service.
    #[error("queue service error: {0}")]
    Service(String),

    #[error("invalid launch spec: {0}")]
    InvalidSpec(String),

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("no manager registered for resource: {0}")]
    NoManager(ResourceType),

    #[error("no backend registered for resource: {0}")]
    NoBackend(ResourceType),

    #[error("orphan discovery is not implemented for resource: {0}")]
    OrphanDiscoveryUnsupported(ResourceType),

    #[error("image build failed: {0}")]
    Build(String),

    #[error("run failed to start: {0}")]
    Run(String),

    #[error("job set {0} is shut down")]
    JobSetClosed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CoreError {
    /// Errors worth retrying on the next loop iteration.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Service(_))
    }
}
