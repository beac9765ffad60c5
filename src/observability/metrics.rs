//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `sopssecrets_reconcilation_successes_total` - Reconcile cycles that ended Healthy
//! - `sopssecrets_reconcilation_failures_total` - Reconcile cycles that ended with a failure status
//! - `sopssecrets_reconcilation_suspends_total` - Reconcile cycles skipped because the resource is suspended
//! - `sopssecrets_decryption_failures_total` - SopsSecrets that could not be decrypted
//! - `sopssecrets_decryption_duration_seconds` - Duration of SopsSecret decryption
//! - `sopssecrets_child_secret_writes_total` - Secret creates and updates, by operation
//!
//! The `reconcilation` spelling is kept so existing dashboards keep working.

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATION_SUCCESSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sopssecrets_reconcilation_successes_total",
        "Number of successful SopsSecret reconciliations",
    )
    .expect("Failed to create RECONCILIATION_SUCCESSES_TOTAL metric - this should never happen")
});

static RECONCILIATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sopssecrets_reconcilation_failures_total",
        "Number of failed SopsSecret reconciliations",
    )
    .expect("Failed to create RECONCILIATION_FAILURES_TOTAL metric - this should never happen")
});

static RECONCILIATION_SUSPENDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sopssecrets_reconcilation_suspends_total",
        "Number of suspended SopsSecret reconciliations",
    )
    .expect("Failed to create RECONCILIATION_SUSPENDS_TOTAL metric - this should never happen")
});

static DECRYPTION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sopssecrets_decryption_failures_total",
        "Number of SopsSecrets that failed to decrypt",
    )
    .expect("Failed to create DECRYPTION_FAILURES_TOTAL metric - this should never happen")
});

static DECRYPTION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "sopssecrets_decryption_duration_seconds",
            "Duration of SopsSecret decryption in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create DECRYPTION_DURATION metric - this should never happen")
});

static CHILD_SECRET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sopssecrets_child_secret_writes_total",
            "Number of writes to managed Secrets by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create CHILD_SECRET_WRITES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATION_SUCCESSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_SUSPENDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DECRYPTION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DECRYPTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CHILD_SECRET_WRITES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliation_successes() {
    RECONCILIATION_SUCCESSES_TOTAL.inc();
}

pub fn increment_reconciliation_failures() {
    RECONCILIATION_FAILURES_TOTAL.inc();
}

pub fn increment_reconciliation_suspends() {
    RECONCILIATION_SUSPENDS_TOTAL.inc();
}

pub fn increment_decryption_failures() {
    DECRYPTION_FAILURES_TOTAL.inc();
}

pub fn observe_decryption_duration(duration: f64) {
    DECRYPTION_DURATION.observe(duration);
}

/// `operation` is `create` or `update`
pub fn increment_child_secret_writes(operation: &str) {
    CHILD_SECRET_WRITES_TOTAL
        .with_label_values(&[operation])
        .inc();
}
