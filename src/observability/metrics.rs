//! # Metrics
//!
//! Prometheus metrics for monitoring the agent.
//!
//! ## Metrics Exposed
//!
//! - `compass_runtime_agent_sync_cycles_total` - Total number of reconciliation cycles
//! - `compass_runtime_agent_sync_errors_total` - Total number of failed cycles
//! - `compass_runtime_agent_sync_duration_seconds` - Duration of reconciliation cycles
//! - `compass_runtime_agent_application_operations_total` - Application operations by operation and outcome
//! - `compass_runtime_agent_secret_writes_total` - Secret writes by operation
//! - `compass_runtime_agent_secret_writes_skipped_total` - Upserts skipped because content was unchanged
//! - `compass_runtime_agent_proxy_requests_total` - Director proxy requests by status code
//! - `compass_runtime_agent_certificate_refreshes_total` - Proxy backend swaps after certificate changes

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SYNC_CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "compass_runtime_agent_sync_cycles_total",
        "Total number of reconciliation cycles",
    )
    .expect("Failed to create SYNC_CYCLES_TOTAL metric - this should never happen")
});

static SYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "compass_runtime_agent_sync_errors_total",
        "Total number of reconciliation cycles that failed to fetch or apply",
    )
    .expect("Failed to create SYNC_ERRORS_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "compass_runtime_agent_sync_duration_seconds",
            "Duration of reconciliation cycles in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static APPLICATION_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "compass_runtime_agent_application_operations_total",
            "Total number of application operations by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create APPLICATION_OPERATIONS_TOTAL metric - this should never happen")
});

static SECRET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "compass_runtime_agent_secret_writes_total",
            "Total number of secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create SECRET_WRITES_TOTAL metric - this should never happen")
});

static SECRET_WRITES_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "compass_runtime_agent_secret_writes_skipped_total",
        "Total number of secret upserts skipped because content was unchanged",
    )
    .expect("Failed to create SECRET_WRITES_SKIPPED_TOTAL metric - this should never happen")
});

static PROXY_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "compass_runtime_agent_proxy_requests_total",
            "Total number of Director proxy requests by status code",
        ),
        &["status"],
    )
    .expect("Failed to create PROXY_REQUESTS_TOTAL metric - this should never happen")
});

static CERTIFICATE_REFRESHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "compass_runtime_agent_certificate_refreshes_total",
        "Total number of Director proxy backend swaps",
    )
    .expect("Failed to create CERTIFICATE_REFRESHES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SYNC_CYCLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(APPLICATION_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_WRITES_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROXY_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_REFRESHES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_sync_cycles() {
    SYNC_CYCLES_TOTAL.inc();
}

pub fn increment_sync_errors() {
    SYNC_ERRORS_TOTAL.inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

/// Record the outcome of one application create/update/delete
pub fn record_application_operation(operation: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    APPLICATION_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn increment_secret_writes(operation: &str) {
    SECRET_WRITES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_secret_writes_skipped() {
    SECRET_WRITES_SKIPPED_TOTAL.inc();
}

pub fn increment_proxy_requests(status: u16) {
    PROXY_REQUESTS_TOTAL
        .with_label_values(&[status.to_string().as_str()])
        .inc();
}

pub fn increment_certificate_refreshes() {
    CERTIFICATE_REFRESHES_TOTAL.inc();
}
