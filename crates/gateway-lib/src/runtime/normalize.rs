//! Docker inspect/stats payloads to normalized records

use crate::error::{GatewayError, GatewayResult};
use crate::field::{object_at, string_at, u64_at, Field, NormalizeError};
use crate::models::{
    ContainerRecord, ContainerStats, HostBinding, PortBindings, UNTAGGED_IMAGE,
};
use serde_json::{Map, Value};

/// Interface whose counters are reported as the container's network usage
pub(crate) const PRIMARY_INTERFACE: &str = "eth0";

/// Image identifier the container was created from
pub(crate) fn image_ref(inspect: &Value) -> Field<String> {
    string_at(inspect, "/Image")
}

pub(crate) fn container_record(
    inspect: &Value,
    image: Field<String>,
    detailed: bool,
) -> Result<ContainerRecord, NormalizeError> {
    let id = string_at(inspect, "/Id").required("Id")?;
    let name = string_at(inspect, "/Name").or("Name", String::new())?;
    let status = string_at(inspect, "/State/Status").or("State.Status", "unknown".into())?;
    let created_at = string_at(inspect, "/Created").or("Created", String::new())?;
    let image = image.or("Image", UNTAGGED_IMAGE.to_string())?;
    let ports = port_bindings(inspect).or("NetworkSettings.Ports", PortBindings::new())?;

    let (state, config, network_settings) = if detailed {
        (
            object_at(inspect, "/State").or("State", Map::new())?,
            object_at(inspect, "/Config").or("Config", Map::new())?,
            object_at(inspect, "/NetworkSettings").or("NetworkSettings", Map::new())?,
        )
    } else {
        (Map::new(), Map::new(), Map::new())
    };

    Ok(ContainerRecord {
        id,
        name: name.trim_start_matches('/').to_string(),
        image,
        status,
        ports,
        created_at,
        state,
        config,
        network_settings,
    })
}

/// `NetworkSettings.Ports`: exposed ports map to `null` when unpublished
fn port_bindings(inspect: &Value) -> Field<PortBindings> {
    object_at(inspect, "/NetworkSettings/Ports").and_then(|ports| {
        let mut bindings = PortBindings::new();
        for (port, value) in ports {
            let hosts = match value {
                Value::Null => Vec::new(),
                Value::Array(items) => {
                    let mut hosts = Vec::with_capacity(items.len());
                    for item in &items {
                        match host_binding(item) {
                            Some(binding) => hosts.push(binding),
                            None => {
                                return Field::Malformed(format!(
                                    "unexpected binding for {port}: {item}"
                                ))
                            }
                        }
                    }
                    hosts
                }
                other => {
                    return Field::Malformed(format!("unexpected bindings for {port}: {other}"))
                }
            };
            bindings.insert(port, hosts);
        }
        Field::Present(bindings)
    })
}

fn host_binding(item: &Value) -> Option<HostBinding> {
    let host_port = item.get("HostPort")?.as_str()?.to_string();
    let host_ip = item
        .get("HostIp")
        .and_then(Value::as_str)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);
    Some(HostBinding { host_ip, host_port })
}

/// Counters from a single stats snapshot
///
/// CPU and memory default to zero when the runtime omits them (stopped
/// containers). A missing primary interface is reported as not found.
pub(crate) fn container_stats(stats: &Value, id: &str) -> GatewayResult<ContainerStats> {
    let malformed = |source| GatewayError::PartialFailure {
        resource: "container stats",
        id: id.to_string(),
        source,
    };

    let cpu_usage = u64_at(stats, "/cpu_stats/cpu_usage/total_usage")
        .or("cpu_stats.cpu_usage.total_usage", 0)
        .map_err(malformed)?;
    let memory_usage = u64_at(stats, "/memory_stats/usage")
        .or("memory_stats.usage", 0)
        .map_err(malformed)?;

    let interface = format!("/networks/{PRIMARY_INTERFACE}");
    let network = match object_at(stats, &interface) {
        Field::Present(map) => Value::Object(map),
        Field::Absent => {
            return Err(GatewayError::not_found(
                "network interface",
                format!("{id}/{PRIMARY_INTERFACE}"),
            ))
        }
        Field::Malformed(reason) => {
            return Err(malformed(NormalizeError::Malformed {
                field: "networks",
                reason,
            }))
        }
    };

    let network_rx = u64_at(&network, "/rx_bytes")
        .or("rx_bytes", 0)
        .map_err(malformed)?;
    let network_tx = u64_at(&network, "/tx_bytes")
        .or("tx_bytes", 0)
        .map_err(malformed)?;

    Ok(ContainerStats {
        cpu_usage,
        memory_usage,
        network_rx,
        network_tx,
    })
}
