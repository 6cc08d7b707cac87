use launch_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("queue service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("queue service rejected {operation}: {message}")]
    Graphql {
        operation: &'static str,
        message: String,
    },

    #[error("invalid response to {operation}: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl From<ClientError> for CoreError {
    fn from(e: ClientError) -> Self {
        CoreError::Service(e.to_string())
    }
}
