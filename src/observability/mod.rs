//! # Observability
//!
//! Prometheus metrics for the operator. Logging goes through `tracing`
//! and is configured in `main`.

pub mod metrics;

pub use metrics::register_metrics;
