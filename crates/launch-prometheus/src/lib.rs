//! Prometheus metrics backend for the launch agent.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`launch_core::MetricsBackend`]
//! that exposes metrics in Prometheus format.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use launch_core::MetricsHandle;
//! use launch_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//!
//! // Hand `handle` to `Agent::builder(..).with_metrics(handle)`, then
//! // expose `metrics.gather()` from whatever HTTP server the host runs.
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `launch_jobset_syncs_total{queue}` - Counter
//! - `launch_jobset_version{queue}` - Gauge
//! - `launch_leases_total{queue, outcome}` - Counter
//! - `launch_runs_started_total{queue, resource}` - Counter
//! - `launch_job_failures_total{queue, stage}` - Counter
//! - `launch_active_runs{queue}` - Gauge
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.
//! Encode [`PrometheusMetrics::gather`] with [`TextEncoder`] from your own.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
