//! Data model shared by the launch agent crates.
//!
//! Everything here is plain data: jobs and their lifecycle states, job set
//! metadata and incremental diffs, and the small enums the queue service
//! speaks (resource types, failure stages, agent statuses).

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;

mod error;
pub use error::ModelError;
