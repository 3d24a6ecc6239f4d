//! Central metrics registry and metric definitions
//!
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    GaugeVec, HistogramVec, IntCounterVec, IntGauge,
};

// ===== Query Metrics =====

/// Duration of a single similarity query by scenario
pub static QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tenantload_query_duration_seconds",
        "Duration of a single vector query in seconds",
        &["scenario"],
        // Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register query duration histogram")
});

/// Query outcomes by scenario and result (success/failure)
pub static QUERY_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tenantload_query_results_total",
        "Total number of vector queries by result",
        &["scenario", "result"]
    )
    .expect("Failed to register query results counter")
});

/// p99 of the most recent batch per scenario and concurrency level
pub static BATCH_P99: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tenantload_batch_p99_seconds",
        "Nearest-rank p99 latency of the last batch in seconds",
        &["scenario", "concurrency"]
    )
    .expect("Failed to register batch p99 gauge")
});

// ===== Tenant Lifecycle Metrics =====

/// Tenant activity status transitions by target status and result
pub static TENANT_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tenantload_tenant_transitions_total",
        "Total number of tenant activity status updates",
        &["status", "result"]
    )
    .expect("Failed to register tenant transitions counter")
});

/// Users currently sending queries (across tenants)
pub static QUERYING_USERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tenantload_querying_users",
        "Number of users (across tenants) currently sending queries"
    )
    .expect("Failed to register querying users gauge")
});

/// Distinct tenants currently being queried by steady load
pub static QUERYING_TENANTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tenantload_querying_tenants",
        "Number of tenants that currently have users querying them"
    )
    .expect("Failed to register querying tenants gauge")
});

/// Duration of one status transition cycle or run by target status
pub static TRANSITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tenantload_transition_duration_seconds",
        "Time until updated tenants report their new activity status in seconds",
        &["status", "stage"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
    )
    .expect("Failed to register transition duration histogram")
});

/// Holds `amount` on a gauge until dropped, including on unwind or task cancellation.
#[must_use = "the gauge is released when the guard drops"]
pub struct GaugeGuard {
    gauge: IntGauge,
    amount: i64,
}

impl GaugeGuard {
    pub fn new(gauge: &IntGauge, amount: i64) -> Self {
        gauge.add(amount);
        Self {
            gauge: gauge.clone(),
            amount,
        }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.sub(self.amount);
    }
}

/// Label value for a result flag
pub fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}
