//! Structured logging and Prometheus metrics for the operator process.

pub mod logging;
pub mod metrics;
