//! The single seam the HTTP boundary depends on

use crate::error::GatewayResult;
use crate::models::{
    Alert, ClusterMetrics, ConnectivityMode, ContainerLogs, ContainerMetrics, ContainerRecord,
    ContainerStats, CreateContainerRequest, CreateDeploymentRequest, CreateServiceRequest,
    CreatedContainer, CreatedDeployment, NetworkService, SystemAlarm, SystemMetrics,
    WorkloadDeployment,
};
use crate::monitoring::MonitoringEngine;
use crate::orchestrator::OrchestrationAdapter;
use crate::runtime::RuntimeAdapter;
use std::sync::Arc;

/// Aggregation facade over the three adapters
///
/// Every method forwards to exactly one adapter call.
#[derive(Clone)]
pub struct Gateway {
    runtime: Arc<RuntimeAdapter>,
    orchestrator: Arc<OrchestrationAdapter>,
    monitoring: Arc<MonitoringEngine>,
}

impl Gateway {
    pub fn new(
        runtime: Arc<RuntimeAdapter>,
        orchestrator: Arc<OrchestrationAdapter>,
        monitoring: Arc<MonitoringEngine>,
    ) -> Self {
        Self {
            runtime,
            orchestrator,
            monitoring,
        }
    }

    // Containers

    pub async fn list_containers(&self) -> GatewayResult<Vec<ContainerRecord>> {
        self.runtime.list().await
    }

    pub async fn get_container(&self, id: &str) -> GatewayResult<Option<ContainerRecord>> {
        self.runtime.get(id).await
    }

    pub async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> GatewayResult<CreatedContainer> {
        self.runtime.create(request).await
    }

    pub async fn start_container(&self, id: &str) -> GatewayResult<()> {
        self.runtime.start(id).await
    }

    pub async fn stop_container(&self, id: &str) -> GatewayResult<()> {
        self.runtime.stop(id).await
    }

    pub async fn remove_container(&self, id: &str, force: bool) -> GatewayResult<()> {
        self.runtime.remove(id, force).await
    }

    pub async fn container_logs(&self, id: &str, tail: usize) -> GatewayResult<ContainerLogs> {
        self.runtime.logs(id, tail).await
    }

    pub async fn container_stats(&self, id: &str) -> GatewayResult<ContainerStats> {
        self.runtime.stats(id).await
    }

    // Orchestration

    pub async fn orchestrator_mode(&self) -> ConnectivityMode {
        self.orchestrator.mode().await
    }

    pub async fn list_deployments(&self, namespace: &str) -> GatewayResult<Vec<WorkloadDeployment>> {
        self.orchestrator.list_deployments(namespace).await
    }

    pub async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> GatewayResult<CreatedDeployment> {
        self.orchestrator.create_deployment(request).await
    }

    pub async fn delete_deployment(&self, name: &str, namespace: &str) -> GatewayResult<bool> {
        self.orchestrator.delete_deployment(name, namespace).await
    }

    pub async fn scale_deployment(
        &self,
        name: &str,
        replicas: i32,
        namespace: &str,
    ) -> GatewayResult<bool> {
        self.orchestrator
            .scale_deployment(name, replicas, namespace)
            .await
    }

    pub async fn list_services(&self, namespace: &str) -> GatewayResult<Vec<NetworkService>> {
        self.orchestrator.list_services(namespace).await
    }

    pub async fn create_service(&self, request: &CreateServiceRequest) -> GatewayResult<NetworkService> {
        self.orchestrator.create_service(request).await
    }

    pub async fn delete_service(&self, name: &str, namespace: &str) -> GatewayResult<bool> {
        self.orchestrator.delete_service(name, namespace).await
    }

    // Monitoring

    pub async fn container_metrics(
        &self,
        container_id: &str,
        duration: &str,
    ) -> GatewayResult<ContainerMetrics> {
        self.monitoring
            .container_metrics(container_id, duration)
            .await
    }

    pub async fn cluster_metrics(&self) -> ClusterMetrics {
        self.monitoring.cluster_metrics().await
    }

    pub async fn system_metrics(&self) -> SystemMetrics {
        self.monitoring.system_metrics().await
    }

    pub async fn alerts(&self) -> GatewayResult<Vec<Alert>> {
        self.monitoring.alerts().await
    }

    pub async fn system_alarms(&self) -> GatewayResult<Vec<SystemAlarm>> {
        self.monitoring.system_alarms().await
    }

    // Reachability probes for health reporting

    pub async fn ping_runtime(&self) -> GatewayResult<()> {
        self.runtime.ping().await
    }

    pub async fn ping_metrics_store(&self) -> GatewayResult<()> {
        self.monitoring.ping().await
    }
}
