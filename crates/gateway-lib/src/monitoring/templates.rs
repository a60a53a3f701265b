//! Named PromQL templates and their rendering
//!
//! Placeholders are `{name}`; anything else in braces (label matchers) is
//! emitted verbatim.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct MetricTemplate {
    pub name: &'static str,
    pub query: &'static str,
}

const fn template(name: &'static str, query: &'static str) -> MetricTemplate {
    MetricTemplate { name, query }
}

/// Per-container series; `{id}` is the container identifier, `{lookback}`
/// the rate window.
pub const CONTAINER_METRICS: &[MetricTemplate] = &[
    template(
        "cpu_usage",
        r#"rate(container_cpu_usage_seconds_total{container_id="{id}"}[{lookback}])"#,
    ),
    template(
        "memory_usage",
        r#"container_memory_usage_bytes{container_id="{id}"}"#,
    ),
    template(
        "network_receive",
        r#"rate(container_network_receive_bytes_total{container_id="{id}"}[{lookback}])"#,
    ),
    template(
        "network_transmit",
        r#"rate(container_network_transmit_bytes_total{container_id="{id}"}[{lookback}])"#,
    ),
];

/// Per-node aggregates, evaluated as instant queries
pub const CLUSTER_METRICS: &[MetricTemplate] = &[
    template(
        "node_cpu_usage",
        r#"sum(rate(node_cpu_seconds_total{mode!="idle"}[5m])) by (instance)"#,
    ),
    template(
        "node_memory_usage",
        "sum(node_memory_MemTotal_bytes - node_memory_MemAvailable_bytes) by (instance)",
    ),
    template(
        "node_disk_usage",
        "sum(node_filesystem_size_bytes - node_filesystem_free_bytes) by (instance)",
    ),
    template(
        "node_network_receive",
        "sum(rate(node_network_receive_bytes_total[5m])) by (instance)",
    ),
    template(
        "node_network_transmit",
        "sum(rate(node_network_transmit_bytes_total[5m])) by (instance)",
    ),
];

/// Host-wide percentages and rates over the last few minutes
pub const SYSTEM_METRICS: &[MetricTemplate] = &[
    template(
        "cpu",
        r#"avg(rate(node_cpu_seconds_total{mode="user"}[5m])) * 100"#,
    ),
    template(
        "memory",
        "(node_memory_MemTotal_bytes - node_memory_MemAvailable_bytes) / node_memory_MemTotal_bytes * 100",
    ),
    template(
        "disk",
        r#"(node_filesystem_size_bytes{mountpoint="/"} - node_filesystem_free_bytes{mountpoint="/"}) / node_filesystem_size_bytes{mountpoint="/"} * 100"#,
    ),
    template("network", "rate(node_network_receive_bytes_total[5m])"),
];

/// Substitute `{key}` placeholders in a single pass
pub fn render(query: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(query.len());
    let mut rest = query;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let substituted = tail.find('}').and_then(|close| {
            let key = &tail[..close];
            params
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape a value for use inside a double-quoted label matcher
pub fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Parse a Prometheus duration of the form `<n>(s|m|h|d)`
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration {raw:?}, expected e.g. 30s, 5m, 1h, 7d");

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let unit_secs = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    if amount == 0 {
        return Err(invalid());
    }
    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}
