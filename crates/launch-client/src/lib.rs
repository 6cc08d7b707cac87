//! HTTP client for the launch queue service.
//!
//! [`HttpQueueClient`] implements [`launch_core::QueueService`] over the
//! service's GraphQL endpoint. Every failure surfaces as
//! [`launch_core::CoreError::Service`], which the agent treats as transient.

mod config;
pub use config::ClientConfig;

mod errors;
pub use errors::ClientError;

mod client;
pub use client::HttpQueueClient;

mod queries;
mod wire;
