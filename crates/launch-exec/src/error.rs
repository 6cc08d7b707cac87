use launch_core::CoreError;
use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("entry point is empty")]
    EmptyCommand,
    #[error("no image to run")]
    MissingImage,
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for CoreError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::EmptyCommand | ExecError::MissingImage | ExecError::InvalidArgs(_) => {
                CoreError::InvalidSpec(e.to_string())
            }
            ExecError::Spawn(_) | ExecError::Io(_) => CoreError::Run(e.to_string()),
        }
    }
}
