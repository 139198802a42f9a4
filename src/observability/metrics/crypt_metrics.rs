//! # Crypt Metrics
//!
//! Metrics for API operations: secret encryption and bundle validation.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounterVec};
use std::sync::LazyLock;

static ENCRYPT_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "paas_crypt_encrypt_requests_total",
            "Total number of encrypt requests by whether the input was a private key",
        ),
        &["valid"],
    )
    .expect("Failed to create ENCRYPT_REQUESTS_TOTAL metric - this should never happen")
});

static BUNDLE_VALIDATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "paas_crypt_bundle_validations_total",
            "Total number of bundle validations by result (ok, decode, decrypt, construction)",
        ),
        &["result"],
    )
    .expect("Failed to create BUNDLE_VALIDATIONS_TOTAL metric - this should never happen")
});

static BUNDLE_VALIDATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "paas_crypt_bundle_validation_duration_seconds",
            "Duration of bundle validation in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("Failed to create BUNDLE_VALIDATION_DURATION metric - this should never happen")
});

/// Register crypt metrics with the registry
pub(crate) fn register_crypt_metrics() -> Result<()> {
    REGISTRY.register(Box::new(ENCRYPT_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUNDLE_VALIDATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUNDLE_VALIDATION_DURATION.clone()))?;
    Ok(())
}

pub fn increment_encrypt_requests(valid: bool) {
    let label = if valid { "true" } else { "false" };
    ENCRYPT_REQUESTS_TOTAL.with_label_values(&[label]).inc();
}

pub fn increment_bundle_validations(result: &str) {
    BUNDLE_VALIDATIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn observe_bundle_validation_duration(duration: f64) {
    BUNDLE_VALIDATION_DURATION.observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_encrypt_requests_by_validity() {
        let valid = ENCRYPT_REQUESTS_TOTAL.with_label_values(&["true"]);
        let invalid = ENCRYPT_REQUESTS_TOTAL.with_label_values(&["false"]);
        let (valid_before, invalid_before) = (valid.get(), invalid.get());

        increment_encrypt_requests(true);
        increment_encrypt_requests(false);
        increment_encrypt_requests(false);

        assert!(valid.get() > valid_before);
        assert!(invalid.get() >= invalid_before + 2);
    }

    #[test]
    fn test_register_and_gather() {
        increment_bundle_validations("ok");
        super::super::register_metrics().unwrap();
        let text = super::super::gather_metrics().unwrap();
        assert!(text.contains("paas_crypt_bundle_validations_total"));
    }
}
