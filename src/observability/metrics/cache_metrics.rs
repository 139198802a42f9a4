//! # Cache Metrics
//!
//! Metrics for the handle cache: hits, misses, key rotations and handle construction.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec};
use std::sync::LazyLock;

static CACHE_HITS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paas_crypt_cache_hits_total",
        "Total number of crypt handles served from the cache",
    )
    .expect("Failed to create CACHE_HITS_TOTAL metric - this should never happen")
});

static CACHE_MISSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paas_crypt_cache_misses_total",
        "Total number of crypt handle requests that required construction",
    )
    .expect("Failed to create CACHE_MISSES_TOTAL metric - this should never happen")
});

static KEY_ROTATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paas_crypt_key_rotations_total",
        "Total number of detected key rotations (cache resets)",
    )
    .expect("Failed to create KEY_ROTATIONS_TOTAL metric - this should never happen")
});

static HANDLE_CONSTRUCTION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "paas_crypt_handle_construction_duration_seconds",
            "Duration of crypt handle construction (key loading and parsing) in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
    )
    .expect("Failed to create HANDLE_CONSTRUCTION_DURATION metric - this should never happen")
});

static HANDLE_CONSTRUCTION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "paas_crypt_handle_construction_errors_total",
            "Total number of crypt handle construction failures by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create HANDLE_CONSTRUCTION_ERRORS_TOTAL metric - this should never happen")
});

/// Register cache metrics with the registry
pub(crate) fn register_cache_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEY_ROTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HANDLE_CONSTRUCTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(HANDLE_CONSTRUCTION_ERRORS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_cache_hits() {
    CACHE_HITS_TOTAL.inc();
}

pub fn increment_cache_misses() {
    CACHE_MISSES_TOTAL.inc();
}

pub fn increment_key_rotations() {
    KEY_ROTATIONS_TOTAL.inc();
}

pub fn observe_handle_construction_duration(duration: f64) {
    HANDLE_CONSTRUCTION_DURATION.observe(duration);
}

pub fn increment_handle_construction_errors(reason: &str) {
    HANDLE_CONSTRUCTION_ERRORS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_cache_hits() {
        let before = CACHE_HITS_TOTAL.get();
        increment_cache_hits();
        assert!(CACHE_HITS_TOTAL.get() > before);
    }

    #[test]
    fn test_increment_key_rotations() {
        let before = KEY_ROTATIONS_TOTAL.get();
        increment_key_rotations();
        assert!(KEY_ROTATIONS_TOTAL.get() > before);
    }

    #[test]
    fn test_construction_errors_are_labelled_by_reason() {
        let counter = HANDLE_CONSTRUCTION_ERRORS_TOTAL.with_label_values(&["metrics_test_reason"]);
        let before = counter.get();
        increment_handle_construction_errors("metrics_test_reason");
        assert_eq!(counter.get(), before + 1);
    }
}
