//! Normalized response and request shapes shared by every backend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sentinel image name for untagged images
pub const UNTAGGED_IMAGE: &str = "<none>";

pub const DEFAULT_NAMESPACE: &str = "default";

/// A published host binding for one container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    pub host_port: String,
}

/// Container-side port spec (e.g. "80/tcp") to its host bindings
pub type PortBindings = BTreeMap<String, Vec<HostBinding>>;

/// Container as seen through the runtime adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub ports: PortBindings,
    pub created_at: String,
    /// Detail fields, only populated on single-record fetch
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub network_settings: Map<String, Value>,
}

/// Point-in-time resource counters for one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu_usage: u64,
    pub memory_usage: u64,
    pub network_rx: u64,
    pub network_tx: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLogs {
    pub logs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    pub image: String,
    pub name: String,
    #[serde(default)]
    pub ports: Option<PortBindings>,
    #[serde(default, alias = "environment")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Short echo of a container after a create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedContainer {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDeployment {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub available_replicas: Option<i32>,
    pub image: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDeploymentRequest {
    pub name: String,
    pub image: String,
    /// Target namespace; the gateway's configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

impl CreateDeploymentRequest {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

/// Echo of a deployment after a create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDeployment {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ClusterIP" => Ok(ServiceType::ClusterIP),
            "NodePort" => Ok(ServiceType::NodePort),
            "LoadBalancer" => Ok(ServiceType::LoadBalancer),
            other => Err(format!("unsupported service type {other}")),
        }
    }
}

/// Target port of a service, either a number or a named container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetPort {
    Number(i32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub port: i32,
    #[serde(alias = "target_port")]
    pub target_port: TargetPort,
}

impl ServicePort {
    pub fn new(port: i32, target_port: i32) -> Self {
        Self {
            port,
            target_port: TargetPort::Number(target_port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkService {
    pub name: String,
    pub namespace: String,
    pub service_type: ServiceType,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: Option<String>,
    #[serde(rename = "externalIP")]
    pub external_ip: Option<String>,
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, alias = "service_type")]
    pub service_type: ServiceType,
    #[serde(default)]
    pub ports: Option<Vec<ServicePort>>,
    #[serde(default)]
    pub selector: Option<BTreeMap<String, String>>,
}

impl CreateServiceRequest {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

/// Whether the orchestration adapter talks to a live cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    Live,
    Simulated,
}

/// One sample of a range query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub metric_name: String,
    pub points: Vec<MetricPoint>,
}

/// Range sample rendered with a wall-clock timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub timestamp: String,
    pub value: f64,
}

/// Instant sample of a per-node aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSample {
    pub instance: String,
    pub timestamp: f64,
    pub value: f64,
}

pub type ContainerMetrics = BTreeMap<String, Vec<MetricPoint>>;
pub type ClusterMetrics = BTreeMap<String, Vec<InstanceSample>>;
pub type SystemMetrics = BTreeMap<String, Vec<TimedPoint>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub name: String,
    pub severity: String,
    pub status: AlertStatus,
    pub description: String,
    pub started_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmCondition {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAlarm {
    pub id: String,
    pub resource: String,
    pub threshold: f64,
    pub condition: AlarmCondition,
    pub status: AlertStatus,
    pub created_at: String,
}

fn default_replicas() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_network_service_uses_wire_names() {
        let svc = NetworkService {
            name: "web".into(),
            namespace: "default".into(),
            service_type: ServiceType::LoadBalancer,
            cluster_ip: Some("10.0.0.7".into()),
            external_ip: Some("34.1.2.3".into()),
            ports: vec![ServicePort::new(80, 8080)],
            selector: BTreeMap::from([("app".to_string(), "web".to_string())]),
        };

        let value = serde_json::to_value(&svc).unwrap();
        assert_eq!(value["serviceType"], "LoadBalancer");
        assert_eq!(value["clusterIP"], "10.0.0.7");
        assert_eq!(value["externalIP"], "34.1.2.3");
        assert_eq!(value["ports"][0]["targetPort"], 8080);
    }

    #[test]
    fn test_create_deployment_request_defaults() {
        let req: CreateDeploymentRequest =
            serde_json::from_value(json!({"name": "api", "image": "nginx:latest"})).unwrap();
        assert!(req.namespace.is_none());
        assert_eq!(req.namespace(), "default");
        assert_eq!(req.replicas, 1);
        assert!(req.labels.is_none());
    }

    #[test]
    fn test_target_port_accepts_names() {
        let port: ServicePort =
            serde_json::from_value(json!({"port": 443, "target_port": "https"})).unwrap();
        assert_eq!(port.target_port, TargetPort::Name("https".into()));
    }

    #[test]
    fn test_create_container_request_accepts_environment_alias() {
        let req: CreateContainerRequest = serde_json::from_value(json!({
            "image": "redis:7",
            "name": "cache",
            "environment": {"MODE": "standalone"}
        }))
        .unwrap();
        assert_eq!(req.env.unwrap()["MODE"], "standalone");
        assert!(req.ports.is_none());
    }
}
