//! # Metrics Module
//!
//! Prometheus metrics for monitoring the gateway, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text exposition
//! - `cache_metrics` - Handle cache metrics (hits, misses, rotations, constructions)
//! - `crypt_metrics` - Request metrics (encryptions, bundle validations)

pub mod cache_metrics;
pub mod crypt_metrics;
pub mod registry;

pub use cache_metrics::*;
pub use crypt_metrics::*;
pub use registry::*;
