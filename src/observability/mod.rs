//! # Observability
//!
//! Prometheus metrics for the crypt gateway.

pub mod metrics;
