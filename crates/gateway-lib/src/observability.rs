//! Observability infrastructure for the gateway
//!
//! Provides:
//! - Prometheus metrics (backend call outcomes and latency, skipped records,
//!   failed metric queries, orchestrator mode)
//! - Structured JSON logging with tracing

use crate::error::Backend;
use crate::field::Skipped;
use crate::models::ConnectivityMode;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for backend latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<GatewayMetricsInner> = OnceLock::new();

struct GatewayMetricsInner {
    backend_requests: IntCounterVec,
    backend_latency_seconds: HistogramVec,
    records_skipped: IntCounterVec,
    metric_queries_failed: IntCounterVec,
    orchestrator_simulated: IntGauge,
}

impl GatewayMetricsInner {
    fn new() -> Self {
        Self {
            backend_requests: register_int_counter_vec!(
                "gateway_backend_requests_total",
                "Backend calls by backend, operation and outcome",
                &["backend", "operation", "outcome"]
            )
            .expect("Failed to register backend_requests_total"),

            backend_latency_seconds: register_histogram_vec!(
                "gateway_backend_latency_seconds",
                "Latency of backend calls",
                &["backend"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_latency_seconds"),

            records_skipped: register_int_counter_vec!(
                "gateway_records_skipped_total",
                "List elements dropped because they failed normalization",
                &["backend"]
            )
            .expect("Failed to register records_skipped_total"),

            metric_queries_failed: register_int_counter_vec!(
                "gateway_metric_queries_failed_total",
                "Metric queries that degraded to an empty series",
                &["metric"]
            )
            .expect("Failed to register metric_queries_failed_total"),

            orchestrator_simulated: register_int_gauge!(
                "gateway_orchestrator_simulated",
                "1 when the orchestration adapter answers from simulation mode"
            )
            .expect("Failed to register orchestrator_simulated"),
        }
    }
}

/// Gateway metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct GatewayMetrics {
    _private: (),
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(GatewayMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &GatewayMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome and latency of one backend call
    pub fn record_call(&self, backend: Backend, operation: &str, ok: bool, duration_secs: f64) {
        let outcome = if ok { "ok" } else { "error" };
        self.inner()
            .backend_requests
            .with_label_values(&[backend.as_str(), operation, outcome])
            .inc();
        self.inner()
            .backend_latency_seconds
            .with_label_values(&[backend.as_str()])
            .observe(duration_secs);
    }

    pub fn add_records_skipped(&self, backend: Backend, count: usize) {
        self.inner()
            .records_skipped
            .with_label_values(&[backend.as_str()])
            .inc_by(count as u64);
    }

    pub fn inc_metric_query_failed(&self, metric: &str) {
        self.inner()
            .metric_queries_failed
            .with_label_values(&[metric])
            .inc();
    }

    pub fn set_connectivity_mode(&self, mode: ConnectivityMode) {
        let simulated = matches!(mode, ConnectivityMode::Simulated);
        self.inner().orchestrator_simulated.set(simulated as i64);
    }
}

/// Structured logger for gateway events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str, mode: ConnectivityMode) {
        info!(
            event = "gateway_started",
            component = %self.component,
            gateway_version = %version,
            orchestrator_mode = ?mode,
            "Management gateway started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "gateway_shutdown",
            component = %self.component,
            reason = %reason,
            "Management gateway shutting down"
        );
    }

    /// Log the orchestrator connectivity decision
    pub fn log_connectivity(&self, mode: ConnectivityMode, cause: Option<&str>) {
        match mode {
            ConnectivityMode::Live => info!(
                event = "orchestrator_mode",
                component = %self.component,
                mode = "live",
                "Connected to cluster orchestrator"
            ),
            ConnectivityMode::Simulated => warn!(
                event = "orchestrator_mode",
                component = %self.component,
                mode = "simulated",
                cause = cause.unwrap_or("unknown"),
                "Orchestrator unreachable, answering from simulation mode"
            ),
        }
    }

    /// Log elements dropped from a list result
    pub fn log_skipped(&self, backend: Backend, skipped: &[Skipped]) {
        for entry in skipped {
            warn!(
                event = "record_skipped",
                component = %self.component,
                backend = %backend,
                key = %entry.key,
                reason = %entry.reason,
                "Skipping record that failed normalization"
            );
        }
    }

    pub fn log_metric_query_failed(&self, metric: &str, reason: &str) {
        warn!(
            event = "metric_query_failed",
            component = %self.component,
            metric = %metric,
            reason = %reason,
            "Metric query failed, returning empty series"
        );
    }
}
