use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown resource type: {0}")]
    UnknownResource(String),
    #[error("invalid max concurrency: {0} (expected a non-negative integer, -1 or \"auto\")")]
    InvalidConcurrency(String),
    #[error("unknown run state: {0}")]
    UnknownRunState(String),
}
