//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `keycloak_operator_reconciliations_total{kind}` - Total number of reconciliations
//! - `keycloak_operator_reconciliation_errors_total{kind,reason}` - Reconciliations that ended in `ERROR`
//! - `keycloak_operator_reconciliation_duration_seconds{kind}` - Duration of reconciliations
//! - `keycloak_operator_cleanups_total{kind,outcome}` - Cleanup attempts by outcome
//! - `keycloak_operator_secret_triggered_reconciles_total{kind}` - Reconciles enqueued by Secret events
//! - `keycloak_operator_dependency_index_entries{index}` - Watched secondaries per index
//! - `keycloak_operator_dependency_index_repairs_total{index}` - Inconsistent index entries rebuilt
//! - `keycloak_operator_active_connection_scopes` - Keycloak sessions currently open
//! - `keycloak_operator_requeues_total{kind,reason}` - Requeues by reason
//! - `keycloak_operator_keycloak_operation_duration_seconds{operation}` - Duration of admin API operations
//! - `keycloak_operator_keycloak_operation_errors_total{operation}` - Failed admin API operations

use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_reconciliation_errors_total",
            "Total number of reconciliations that ended in error",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "keycloak_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CLEANUPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_cleanups_total",
            "Total number of cleanup attempts by outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("Failed to create CLEANUPS_TOTAL metric - this should never happen")
});

static SECRET_TRIGGERED_RECONCILES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_secret_triggered_reconciles_total",
            "Total number of reconciles enqueued because a referenced Secret changed",
        ),
        &["kind"],
    )
    .expect("Failed to create SECRET_TRIGGERED_RECONCILES_TOTAL metric - this should never happen")
});

static DEPENDENCY_INDEX_ENTRIES: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "keycloak_operator_dependency_index_entries",
            "Number of watched secondary objects per dependency index",
        ),
        &["index"],
    )
    .expect("Failed to create DEPENDENCY_INDEX_ENTRIES metric - this should never happen")
});

static DEPENDENCY_INDEX_REPAIRS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_dependency_index_repairs_total",
            "Total number of inconsistent dependency index entries rebuilt",
        ),
        &["index"],
    )
    .expect("Failed to create DEPENDENCY_INDEX_REPAIRS_TOTAL metric - this should never happen")
});

static ACTIVE_CONNECTION_SCOPES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "keycloak_operator_active_connection_scopes",
        "Current number of open Keycloak admin sessions",
    )
    .expect("Failed to create ACTIVE_CONNECTION_SCOPES metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static KEYCLOAK_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "keycloak_operator_keycloak_operation_duration_seconds",
            "Duration of Keycloak admin API operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create KEYCLOAK_OPERATION_DURATION metric - this should never happen")
});

static KEYCLOAK_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "keycloak_operator_keycloak_operation_errors_total",
            "Total number of failed Keycloak admin API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create KEYCLOAK_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the global registry
///
/// # Errors
///
/// Returns an error if metric registration fails (e.g., duplicate metric names)
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CLEANUPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_TRIGGERED_RECONCILES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPENDENCY_INDEX_ENTRIES.clone()))?;
    REGISTRY.register(Box::new(DEPENDENCY_INDEX_REPAIRS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_CONNECTION_SCOPES.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYCLOAK_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(KEYCLOAK_OPERATION_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

/// `outcome` is one of `removed`, `blocked`
pub fn increment_cleanups(kind: &str, outcome: &str) {
    CLEANUPS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn increment_secret_triggered_reconciles(kind: &str, count: usize) {
    SECRET_TRIGGERED_RECONCILES_TOTAL
        .with_label_values(&[kind])
        .inc_by(count as u64);
}

pub fn set_dependency_index_entries(index: &str, entries: usize) {
    DEPENDENCY_INDEX_ENTRIES
        .with_label_values(&[index])
        .set(i64::try_from(entries).unwrap_or(i64::MAX));
}

pub fn increment_dependency_index_repairs(index: &str) {
    DEPENDENCY_INDEX_REPAIRS_TOTAL
        .with_label_values(&[index])
        .inc();
}

pub fn increment_active_connection_scopes() {
    ACTIVE_CONNECTION_SCOPES.inc();
}

pub fn decrement_active_connection_scopes() {
    ACTIVE_CONNECTION_SCOPES.dec();
}

pub fn increment_requeues(kind: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind, reason]).inc();
}

pub fn observe_keycloak_operation(operation: &str, duration: f64) {
    KEYCLOAK_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_keycloak_operation_errors(operation: &str) {
    KEYCLOAK_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // This should not panic - metrics should register successfully
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.with_label_values(&["Realm"]).get();
        increment_reconciliations("Realm");
        let after = RECONCILIATIONS_TOTAL.with_label_values(&["Realm"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_reconciliation_errors_are_labelled_by_reason() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Client", "realm_not_found"])
            .get();
        increment_reconciliation_errors("Client", "realm_not_found");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Client", "realm_not_found"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_dependency_index_entries_gauge() {
        set_dependency_index_entries("metrics-test", 3);
        assert_eq!(
            DEPENDENCY_INDEX_ENTRIES
                .with_label_values(&["metrics-test"])
                .get(),
            3
        );
    }

    #[test]
    fn test_observe_keycloak_operation() {
        observe_keycloak_operation("import_realm", 0.2);
        // Just verify it doesn't panic - histogram observation doesn't return a value
    }
}
