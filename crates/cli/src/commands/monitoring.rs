//! Metrics and alert CLI commands

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{Alert, ApiClient, HealthResponse, MetricPoint, TimedPoint};
use crate::output::{
    color_status, format_timestamp, format_unix, print_json, print_rows, print_warning,
    OutputFormat,
};

/// Row for alerts table
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Started")]
    started_at: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Row for metric summary tables
#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "At")]
    at: String,
}

fn series_row(metric: &str, points: usize, latest: Option<(f64, String)>) -> SeriesRow {
    let (latest, at) = match latest {
        Some((value, at)) => (format!("{:.4}", value), at),
        None => ("-".to_string(), "-".to_string()),
    };
    SeriesRow {
        metric: metric.to_string(),
        points,
        latest,
        at,
    }
}

/// Per-container CPU, memory and network series
pub async fn container_metrics(
    client: &ApiClient,
    id: &str,
    duration: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/monitoring/containers/{}/metrics", id);
    let metrics: BTreeMap<String, Vec<MetricPoint>> = client
        .get(&path, &[("duration", duration.to_string())])
        .await?;

    match format {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Table => {
            println!("Container {} over the last {}", id.cyan(), duration);
            let rows = metrics
                .iter()
                .map(|(name, points)| {
                    let latest = points.last().map(|p| (p.value, format_unix(p.timestamp)));
                    series_row(name, points.len(), latest)
                })
                .collect();
            print_rows(rows, "No metrics returned");
        }
    }

    Ok(())
}

/// Host-wide CPU, memory, disk and network series
pub async fn system_metrics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let metrics: BTreeMap<String, Vec<TimedPoint>> = client.get("api/v1/metrics", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Table => {
            let rows = metrics
                .iter()
                .map(|(name, points)| {
                    let latest = points
                        .last()
                        .map(|p| (p.value, format_timestamp(&p.timestamp)));
                    series_row(name, points.len(), latest)
                })
                .collect();
            print_rows(rows, "No metrics returned");
        }
    }

    Ok(())
}

/// Alerts currently known to the metrics store
pub async fn alerts(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let alerts: Vec<Alert> = client.get("api/v1/monitoring/alerts", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&alerts)?,
        OutputFormat::Table => {
            let rows = alerts
                .iter()
                .map(|a| AlertRow {
                    name: a.name.clone(),
                    severity: color_status(&a.severity),
                    status: color_status(&a.status),
                    started_at: format_timestamp(&a.started_at),
                    description: a.description.clone(),
                })
                .collect();
            print_rows(rows, "No alerts");
        }
    }

    Ok(())
}

/// Per-backend health as last probed by the gateway
pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("api/v1/health", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("{}", "Gateway Health".bold());
            println!("{}", "=".repeat(40));
            println!("Overall: {}", color_status(&health.status));
            if health.components.is_empty() {
                print_warning("No components reported");
            }
            for (name, component) in &health.components {
                match &component.message {
                    Some(message) => println!(
                        "  {:<14} {} ({})",
                        name,
                        color_status(&component.status),
                        message
                    ),
                    None => println!("  {:<14} {}", name, color_status(&component.status)),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_row() {
        let row = series_row("cpu", 3, Some((0.123456, "now".into())));
        assert_eq!(row.latest, "0.1235");
        assert_eq!(row.at, "now");

        let empty = series_row("memory", 0, None);
        assert_eq!(empty.latest, "-");
    }
}
