//! Prometheus metrics for reconciliation outcomes and decrypt latency.
//!
//! `LazyLock`-initialized metric handles are registered once into a
//! process-wide `prometheus::Registry`, with small `pub fn
//! increment_*`/`observe_*` wrappers so callers never touch the
//! `prometheus` API directly.

use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sops_operator_reconciliations_total",
        "Total number of reconciliation passes started",
    )
    .expect("failed to create RECONCILIATIONS_TOTAL metric")
});

static RECONCILE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sops_operator_reconcile_errors_total",
        "Total number of reconciliation passes that returned an error to the work queue",
    )
    .expect("failed to create RECONCILE_ERRORS_TOTAL metric")
});

static DECRYPT_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "sops_operator_decrypt_duration_seconds",
            "Duration of sops decryption subprocess invocations",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("failed to create DECRYPT_DURATION_SECONDS metric")
});

static DECRYPT_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sops_operator_decrypt_failures_total",
        "Total number of failed decryption attempts",
    )
    .expect("failed to create DECRYPT_FAILURES_TOTAL metric")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sops_operator_requeues_total",
            "Total number of requeues by trigger source",
        ),
        &["source"],
    )
    .expect("failed to create REQUEUES_TOTAL metric")
});

/// Register every metric into the process-wide registry. Call once during
/// startup, before the HTTP server begins serving `/metrics`.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DECRYPT_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(DECRYPT_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconcile_errors() {
    RECONCILE_ERRORS_TOTAL.inc();
}

pub fn observe_decrypt_duration(seconds: f64) {
    DECRYPT_DURATION_SECONDS.observe(seconds);
}

pub fn increment_decrypt_failures() {
    DECRYPT_FAILURES_TOTAL.inc();
}

pub fn increment_requeues(source: &str) {
    REQUEUES_TOTAL.with_label_values(&[source]).inc();
}

/// Render the registry in Prometheus text exposition format for `/metrics`.
pub fn render() -> Result<String> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
