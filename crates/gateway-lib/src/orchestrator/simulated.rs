//! Canned answers used while the orchestrator is unreachable

use super::resources::{default_labels, default_ports};
use crate::models::{
    CreateDeploymentRequest, CreateServiceRequest, CreatedDeployment, NetworkService,
    ServiceType, WorkloadDeployment,
};
use std::collections::BTreeMap;

pub(crate) const SAMPLE_DEPLOYMENT: &str = "sample-deployment";
pub(crate) const SAMPLE_SERVICE: &str = "sample-service";
pub(crate) const SIMULATED_CLUSTER_IP: &str = "10.0.0.1";

pub(crate) fn deployments(namespace: &str) -> Vec<WorkloadDeployment> {
    vec![WorkloadDeployment {
        name: SAMPLE_DEPLOYMENT.to_string(),
        namespace: namespace.to_string(),
        replicas: 3,
        available_replicas: Some(3),
        image: "nginx:latest".to_string(),
        created_at: Some("2023-01-01T00:00:00Z".to_string()),
        labels: BTreeMap::new(),
    }]
}

pub(crate) fn created_deployment(request: &CreateDeploymentRequest) -> CreatedDeployment {
    CreatedDeployment {
        name: request.name.clone(),
        namespace: request.namespace().to_string(),
        replicas: request.replicas,
    }
}

pub(crate) fn services(namespace: &str) -> Vec<NetworkService> {
    vec![NetworkService {
        name: SAMPLE_SERVICE.to_string(),
        namespace: namespace.to_string(),
        service_type: ServiceType::ClusterIP,
        cluster_ip: Some(SIMULATED_CLUSTER_IP.to_string()),
        external_ip: None,
        ports: default_ports(),
        selector: BTreeMap::new(),
    }]
}

pub(crate) fn created_service(request: &CreateServiceRequest) -> NetworkService {
    NetworkService {
        name: request.name.clone(),
        namespace: request.namespace().to_string(),
        service_type: request.service_type,
        cluster_ip: Some(SIMULATED_CLUSTER_IP.to_string()),
        external_ip: None,
        ports: request.ports.clone().unwrap_or_else(default_ports),
        selector: request
            .selector
            .clone()
            .unwrap_or_else(|| default_labels(&request.name)),
    }
}
