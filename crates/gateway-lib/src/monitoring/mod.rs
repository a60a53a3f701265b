//! Metric query templating and time-series reshaping
//!
//! Batches of named metrics are rendered from [`templates`], issued against
//! the metrics store concurrently and reshaped into flat point lists. A
//! metric whose query fails degrades to an empty list without affecting its
//! siblings. Alert listings fail as a whole: `BackendUnavailable` when the
//! store is down, `PartialFailure` when it rejects or garbles the request.

mod client;
pub mod templates;

pub use client::{InstantSample, PrometheusClient, RangeSeries, StoreError};

use crate::error::{Backend, GatewayError, GatewayResult};
use crate::field::{string_at, Field, NormalizeError, Partial};
use crate::models::{
    Alert, AlarmCondition, AlertStatus, ClusterMetrics, ContainerMetrics, InstanceSample,
    MetricPoint, SystemAlarm, SystemMetrics, TimedPoint,
};
use crate::observability::{GatewayMetrics, StructuredLogger};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use templates::MetricTemplate;
use tracing::debug;

/// Resolution of every range query
pub const RANGE_STEP: &str = "15s";

pub const DEFAULT_DURATION: &str = "5m";

/// Window of the system metrics range queries
const SYSTEM_WINDOW: Duration = Duration::from_secs(300);

pub struct MonitoringEngine {
    client: PrometheusClient,
    retry: RetryPolicy,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl MonitoringEngine {
    pub fn new(client: PrometheusClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            metrics: GatewayMetrics::new(),
            logger: StructuredLogger::new("monitoring_engine"),
        }
    }

    /// CPU, memory and network series of one container over `duration`
    ///
    /// `duration` drives both the rate lookback and the query window.
    pub async fn container_metrics(
        &self,
        container_id: &str,
        duration: &str,
    ) -> GatewayResult<ContainerMetrics> {
        let window = templates::parse_duration(duration).map_err(GatewayError::InvalidRequest)?;
        let id = templates::escape_label(container_id);
        let (start, end) = window_ending_now(window);

        let batch = templates::CONTAINER_METRICS.iter().map(|metric| {
            let query =
                templates::render(metric.query, &[("id", id.as_str()), ("lookback", duration)]);
            async move {
                let points: Vec<MetricPoint> = self
                    .range_points(metric, &query, start, end)
                    .await
                    .into_iter()
                    .map(|(timestamp, value)| MetricPoint { timestamp, value })
                    .collect();
                (metric.name.to_string(), points)
            }
        });

        Ok(join_all(batch).await.into_iter().collect())
    }

    /// Per-node aggregates at the current instant, grouped by instance
    pub async fn cluster_metrics(&self) -> ClusterMetrics {
        let batch = templates::CLUSTER_METRICS.iter().map(|metric| async move {
            let samples: Vec<InstanceSample> = match self
                .store_call("query", || self.client.query(metric.query))
                .await
            {
                Ok(samples) => samples.into_iter().filter_map(instance_sample).collect(),
                Err(err) => {
                    self.degrade(metric, &err);
                    Vec::new()
                }
            };
            (metric.name.to_string(), samples)
        });

        join_all(batch).await.into_iter().collect()
    }

    /// Host-wide series over the last five minutes with wall-clock timestamps
    pub async fn system_metrics(&self) -> SystemMetrics {
        let (start, end) = window_ending_now(SYSTEM_WINDOW);

        let batch = templates::SYSTEM_METRICS.iter().map(|metric| async move {
            let points: Vec<TimedPoint> = self
                .range_points(metric, metric.query, start, end)
                .await
                .into_iter()
                .filter_map(|(timestamp, value)| {
                    Some(TimedPoint {
                        timestamp: rfc3339(timestamp)?,
                        value,
                    })
                })
                .collect();
            (metric.name.to_string(), points)
        });

        join_all(batch).await.into_iter().collect()
    }

    pub async fn alerts(&self) -> GatewayResult<Vec<Alert>> {
        let raw = self.raw_alerts().await?;
        Ok(self.fold(
            raw.iter()
                .enumerate()
                .map(|(i, alert)| (alert_key(i, alert), normalize_alert(alert))),
        ))
    }

    /// Alerts reshaped as threshold alarms on a resource
    pub async fn system_alarms(&self) -> GatewayResult<Vec<SystemAlarm>> {
        let raw = self.raw_alerts().await?;
        Ok(self.fold(
            raw.iter()
                .enumerate()
                .map(|(i, alert)| (alert_key(i, alert), normalize_alarm(alert))),
        ))
    }

    pub async fn ping(&self) -> GatewayResult<()> {
        self.store_call("ping", || self.client.ping()).await
    }

    async fn raw_alerts(&self) -> GatewayResult<Vec<Value>> {
        self.store_call("alerts", || self.client.alerts()).await
    }

    /// `(timestamp, value)` pairs of the first returned series
    async fn range_points(
        &self,
        metric: &MetricTemplate,
        query: &str,
        start: f64,
        end: f64,
    ) -> Vec<(f64, f64)> {
        let series = match self
            .store_call("query_range", || {
                self.client.query_range(query, start, end, RANGE_STEP)
            })
            .await
        {
            Ok(series) => series,
            Err(err) => {
                self.degrade(metric, &err);
                return Vec::new();
            }
        };

        let Some(first) = series.into_iter().next() else {
            debug!(metric = metric.name, "Query returned no series");
            return Vec::new();
        };
        first
            .values
            .into_iter()
            .filter_map(|(timestamp, raw)| Some((timestamp, raw.parse::<f64>().ok()?)))
            .collect()
    }

    fn degrade(&self, metric: &MetricTemplate, err: &GatewayError) {
        self.logger
            .log_metric_query_failed(metric.name, &err.to_string());
        self.metrics.inc_metric_query_failed(metric.name);
    }

    fn fold<T>(
        &self,
        results: impl Iterator<Item = (String, Result<T, NormalizeError>)>,
    ) -> Vec<T> {
        let partial = Partial::fold(results);
        if !partial.is_complete() {
            self.logger
                .log_skipped(Backend::MetricsStore, &partial.skipped);
            self.metrics
                .add_records_skipped(Backend::MetricsStore, partial.skipped.len());
        }
        partial.items
    }

    /// Retried, timed and classified call against the store
    async fn store_call<T, F, Fut>(&self, operation: &'static str, mut op: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        self.retry
            .run(operation, || {
                let call = op();
                async move {
                    let started = Instant::now();
                    let result = call.await;
                    self.metrics.record_call(
                        Backend::MetricsStore,
                        operation,
                        result.is_ok(),
                        started.elapsed().as_secs_f64(),
                    );
                    result.map_err(|err| classify(operation, err))
                }
            })
            .await
    }
}

/// Transport failures and 5xx are outages; anything else is a rejection
/// that a retry would only repeat
fn classify(operation: &'static str, err: StoreError) -> GatewayError {
    if err.is_transient() {
        return GatewayError::unavailable(Backend::MetricsStore, operation, err);
    }
    GatewayError::PartialFailure {
        resource: "metrics store response",
        id: operation.to_string(),
        source: NormalizeError::Malformed {
            field: "response",
            reason: err.to_string(),
        },
    }
}

fn window_ending_now(window: Duration) -> (f64, f64) {
    let end = Utc::now().timestamp_millis() as f64 / 1000.0;
    (end - window.as_secs_f64(), end)
}

fn rfc3339(timestamp: f64) -> Option<String> {
    let millis = (timestamp * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|t| t.to_rfc3339())
}

fn instance_sample(sample: InstantSample) -> Option<InstanceSample> {
    let (timestamp, raw) = sample.value;
    let value = raw.parse::<f64>().ok()?;
    Some(InstanceSample {
        instance: sample
            .metric
            .get("instance")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        timestamp,
        value,
    })
}

fn alert_key(index: usize, alert: &Value) -> String {
    match string_at(alert, "/labels/alertname") {
        Field::Present(name) => name,
        _ => format!("alert[{index}]"),
    }
}

/// Store fingerprint, or a stable digest of the label set
fn alert_id(alert: &Value) -> Result<String, NormalizeError> {
    if let Some(fingerprint) = string_at(alert, "/fingerprint").optional("fingerprint")? {
        return Ok(fingerprint);
    }

    let labels = match alert.get("labels") {
        Some(Value::Object(labels)) => labels,
        _ => return Err(NormalizeError::Missing("labels")),
    };
    let mut hasher = DefaultHasher::new();
    // serde_json maps iterate in key order
    for (key, value) in labels {
        key.hash(&mut hasher);
        value.to_string().hash(&mut hasher);
    }
    Ok(format!("{:016x}", hasher.finish()))
}

fn alert_status(alert: &Value) -> Result<AlertStatus, NormalizeError> {
    let state = string_at(alert, "/state").or("state", String::new())?;
    Ok(if state == "firing" {
        AlertStatus::Active
    } else {
        AlertStatus::Resolved
    })
}

/// Alertmanager reports `startsAt`, the rule evaluator `activeAt`
fn alert_started_at(alert: &Value) -> Result<String, NormalizeError> {
    match string_at(alert, "/startsAt") {
        Field::Absent => string_at(alert, "/activeAt").or("activeAt", String::new()),
        other => other.required("startsAt"),
    }
}

fn normalize_alert(alert: &Value) -> Result<Alert, NormalizeError> {
    let name = string_at(alert, "/labels/alertname").required("labels.alertname")?;
    let description = match string_at(alert, "/annotations/description") {
        Field::Absent => string_at(alert, "/annotations/summary"),
        other => other,
    }
    .or("annotations.description", String::new())?;

    Ok(Alert {
        id: alert_id(alert)?,
        name,
        severity: string_at(alert, "/labels/severity").or("labels.severity", "unknown".into())?,
        status: alert_status(alert)?,
        description,
        started_at: alert_started_at(alert)?,
    })
}

fn normalize_alarm(alert: &Value) -> Result<SystemAlarm, NormalizeError> {
    let threshold = string_at(alert, "/annotations/threshold")
        .and_then(|raw| match raw.trim().parse::<f64>() {
            Ok(value) => Field::Present(value),
            Err(err) => Field::Malformed(format!("{raw:?}: {err}")),
        })
        .or("annotations.threshold", 0.0)?;

    let condition = match string_at(alert, "/annotations/condition")
        .optional("annotations.condition")?
        .as_deref()
    {
        Some(">") => AlarmCondition::Above,
        _ => AlarmCondition::Below,
    };

    Ok(SystemAlarm {
        id: alert_id(alert)?,
        resource: string_at(alert, "/labels/instance").or("labels.instance", "unknown".into())?,
        threshold,
        condition,
        status: alert_status(alert)?,
        created_at: alert_started_at(alert)?,
    })
}
