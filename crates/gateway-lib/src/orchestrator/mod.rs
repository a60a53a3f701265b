//! Cluster orchestration adapter
//!
//! The adapter owns a connectivity state decided at construction:
//!
//! - **Live**: every call goes to a [`ClusterBackend`] (Kubernetes in
//!   production) and results are normalized into the gateway's shapes.
//! - **Simulated**: no cluster credentials could be loaded, so every call is
//!   answered with deterministic canned data and nothing touches the network.
//!
//! Construction never fails. A Simulated adapter stays simulated unless a
//! re-probe interval is configured, in which case the first call after the
//! interval re-runs the connector once.

mod live;
mod resources;
mod simulated;

#[cfg(test)]
mod tests;

pub use live::{KubeBackend, KubeConnector};

use crate::error::{Backend, GatewayError, GatewayResult};
use crate::field::{NormalizeError, Partial};
use crate::models::{
    ConnectivityMode, CreateDeploymentRequest, CreateServiceRequest, CreatedDeployment,
    NetworkService, WorkloadDeployment,
};
use crate::observability::{GatewayMetrics, StructuredLogger};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors reported by a cluster backend, before classification
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("rejected by cluster: {0}")]
    Invalid(String),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

impl ClusterError {
    fn classify(self, context: &'static str, resource: &'static str, name: &str) -> GatewayError {
        match self {
            ClusterError::NotFound(_) => GatewayError::not_found(resource, name),
            ClusterError::Conflict(message) => GatewayError::Conflict(message),
            ClusterError::Invalid(message) => GatewayError::InvalidRequest(message),
            ClusterError::Unavailable(message) => {
                GatewayError::unavailable(Backend::Orchestrator, context, message)
            }
        }
    }
}

/// Namespaced workload and networking operations against a live cluster
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, ClusterError>;

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

pub type DynClusterBackend = Arc<dyn ClusterBackend>;

/// Loads cluster credentials and binds a live backend
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<DynClusterBackend>;
}

enum Binding {
    Live(DynClusterBackend),
    Simulated { cause: String, last_attempt: Instant },
}

const DEPLOYMENT: &str = "deployment";
const SERVICE: &str = "service";

pub struct OrchestrationAdapter {
    binding: RwLock<Binding>,
    connector: Option<Arc<dyn ClusterConnector>>,
    reprobe_interval: Option<Duration>,
    reprobing: AtomicBool,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl OrchestrationAdapter {
    /// Run the connector once; any failure lands in simulation mode
    pub async fn initialize(
        connector: Arc<dyn ClusterConnector>,
        reprobe_interval: Option<Duration>,
    ) -> Self {
        let binding = match connector.connect().await {
            Ok(backend) => Binding::Live(backend),
            Err(err) => Binding::Simulated {
                cause: format!("{err:#}"),
                last_attempt: Instant::now(),
            },
        };

        let adapter = Self::from_binding(binding, Some(connector), reprobe_interval);
        adapter.report_mode(&*adapter.binding.read().await);
        adapter
    }

    /// An adapter bound to `backend` for its whole lifetime
    pub fn with_backend(backend: DynClusterBackend) -> Self {
        Self::from_binding(Binding::Live(backend), None, None)
    }

    /// An adapter that only ever answers from canned data
    pub fn simulated(cause: impl Into<String>) -> Self {
        let binding = Binding::Simulated {
            cause: cause.into(),
            last_attempt: Instant::now(),
        };
        Self::from_binding(binding, None, None)
    }

    fn from_binding(
        binding: Binding,
        connector: Option<Arc<dyn ClusterConnector>>,
        reprobe_interval: Option<Duration>,
    ) -> Self {
        Self {
            binding: RwLock::new(binding),
            connector,
            reprobe_interval,
            reprobing: AtomicBool::new(false),
            metrics: GatewayMetrics::new(),
            logger: StructuredLogger::new("orchestration_adapter"),
        }
    }

    pub async fn mode(&self) -> ConnectivityMode {
        match &*self.binding.read().await {
            Binding::Live(_) => ConnectivityMode::Live,
            Binding::Simulated { .. } => ConnectivityMode::Simulated,
        }
    }

    pub async fn list_deployments(&self, namespace: &str) -> GatewayResult<Vec<WorkloadDeployment>> {
        let Some(backend) = self.live().await else {
            debug!(namespace = %namespace, "Simulated deployment listing");
            return Ok(simulated::deployments(namespace));
        };

        let raw = self
            .observe(
                "list_deployments",
                DEPLOYMENT,
                namespace,
                backend.list_deployments(namespace),
            )
            .await?;

        Ok(self.fold(raw.iter().map(|d| {
            (
                key(namespace, d.metadata.name.as_deref()),
                resources::normalize_deployment(d, namespace),
            )
        })))
    }

    pub async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> GatewayResult<CreatedDeployment> {
        validate_replicas(request.replicas)?;

        let Some(backend) = self.live().await else {
            info!(name = %request.name, namespace = %request.namespace(), "Simulated deployment create");
            return Ok(simulated::created_deployment(request));
        };

        let manifest = resources::deployment_manifest(request);
        let created = self
            .observe(
                "create_deployment",
                DEPLOYMENT,
                &request.name,
                backend.create_deployment(request.namespace(), &manifest),
            )
            .await?;

        info!(name = %request.name, namespace = %request.namespace(), replicas = request.replicas, "Created deployment");
        Ok(CreatedDeployment {
            name: created.metadata.name.unwrap_or_else(|| request.name.clone()),
            namespace: created
                .metadata
                .namespace
                .unwrap_or_else(|| request.namespace().to_string()),
            replicas: created
                .spec
                .and_then(|spec| spec.replicas)
                .unwrap_or(request.replicas),
        })
    }

    /// `false` when the deployment does not exist
    pub async fn delete_deployment(&self, name: &str, namespace: &str) -> GatewayResult<bool> {
        let Some(backend) = self.live().await else {
            return Ok(true);
        };

        let result = self
            .observe(
                "delete_deployment",
                DEPLOYMENT,
                name,
                backend.delete_deployment(namespace, name),
            )
            .await;
        found(result)
    }

    /// `false` when the deployment does not exist
    pub async fn scale_deployment(
        &self,
        name: &str,
        replicas: i32,
        namespace: &str,
    ) -> GatewayResult<bool> {
        validate_replicas(replicas)?;

        let Some(backend) = self.live().await else {
            return Ok(true);
        };

        let result = self
            .observe(
                "scale_deployment",
                DEPLOYMENT,
                name,
                backend.scale_deployment(namespace, name, replicas),
            )
            .await;
        found(result)
    }

    pub async fn list_services(&self, namespace: &str) -> GatewayResult<Vec<NetworkService>> {
        let Some(backend) = self.live().await else {
            debug!(namespace = %namespace, "Simulated service listing");
            return Ok(simulated::services(namespace));
        };

        let raw = self
            .observe(
                "list_services",
                SERVICE,
                namespace,
                backend.list_services(namespace),
            )
            .await?;

        Ok(self.fold(raw.iter().map(|s| {
            (
                key(namespace, s.metadata.name.as_deref()),
                resources::normalize_service(s, namespace),
            )
        })))
    }

    pub async fn create_service(&self, request: &CreateServiceRequest) -> GatewayResult<NetworkService> {
        let Some(backend) = self.live().await else {
            info!(name = %request.name, namespace = %request.namespace(), "Simulated service create");
            return Ok(simulated::created_service(request));
        };

        let manifest = resources::service_manifest(request);
        let created = self
            .observe(
                "create_service",
                SERVICE,
                &request.name,
                backend.create_service(request.namespace(), &manifest),
            )
            .await?;

        info!(name = %request.name, namespace = %request.namespace(), "Created service");
        resources::normalize_service(&created, request.namespace()).map_err(|source| {
            GatewayError::PartialFailure {
                resource: SERVICE,
                id: request.name.clone(),
                source,
            }
        })
    }

    /// `false` when the service does not exist
    pub async fn delete_service(&self, name: &str, namespace: &str) -> GatewayResult<bool> {
        let Some(backend) = self.live().await else {
            return Ok(true);
        };

        let result = self
            .observe(
                "delete_service",
                SERVICE,
                name,
                backend.delete_service(namespace, name),
            )
            .await;
        found(result)
    }

    /// The live backend, or `None` while simulated
    async fn live(&self) -> Option<DynClusterBackend> {
        self.maybe_reprobe().await;
        match &*self.binding.read().await {
            Binding::Live(backend) => Some(backend.clone()),
            Binding::Simulated { .. } => None,
        }
    }

    async fn maybe_reprobe(&self) {
        let (Some(interval), Some(connector)) = (self.reprobe_interval, &self.connector) else {
            return;
        };

        match &*self.binding.read().await {
            Binding::Simulated { last_attempt, .. } if last_attempt.elapsed() >= interval => {}
            _ => return,
        }

        // One re-probe at a time; other callers keep answering from simulation
        if self.reprobing.swap(true, Ordering::AcqRel) {
            return;
        }

        let outcome = connector.connect().await;
        {
            let mut binding = self.binding.write().await;
            if let Binding::Simulated { .. } = &*binding {
                *binding = match outcome {
                    Ok(backend) => Binding::Live(backend),
                    Err(err) => Binding::Simulated {
                        cause: format!("{err:#}"),
                        last_attempt: Instant::now(),
                    },
                };
                if matches!(&*binding, Binding::Live(_)) {
                    self.report_mode(&binding);
                } else {
                    debug!("Orchestrator re-probe failed, staying in simulation mode");
                }
            }
        }
        self.reprobing.store(false, Ordering::Release);
    }

    fn report_mode(&self, binding: &Binding) {
        match binding {
            Binding::Live(_) => {
                self.metrics.set_connectivity_mode(ConnectivityMode::Live);
                self.logger.log_connectivity(ConnectivityMode::Live, None);
            }
            Binding::Simulated { cause, .. } => {
                self.metrics.set_connectivity_mode(ConnectivityMode::Simulated);
                self.logger
                    .log_connectivity(ConnectivityMode::Simulated, Some(cause));
            }
        }
    }

    fn fold<T>(
        &self,
        results: impl Iterator<Item = (String, Result<T, NormalizeError>)>,
    ) -> Vec<T> {
        let partial = Partial::fold(results);
        if !partial.is_complete() {
            self.logger
                .log_skipped(Backend::Orchestrator, &partial.skipped);
            self.metrics
                .add_records_skipped(Backend::Orchestrator, partial.skipped.len());
        }
        partial.items
    }

    async fn observe<T>(
        &self,
        operation: &'static str,
        resource: &'static str,
        name: &str,
        call: impl Future<Output = Result<T, ClusterError>>,
    ) -> GatewayResult<T> {
        let started = Instant::now();
        let result = call.await;
        self.metrics.record_call(
            Backend::Orchestrator,
            operation,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result.map_err(|err| err.classify(operation, resource, name))
    }
}

fn key(namespace: &str, name: Option<&str>) -> String {
    format!("{namespace}/{}", name.unwrap_or("<unnamed>"))
}

fn found(result: GatewayResult<()>) -> GatewayResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(GatewayError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

fn validate_replicas(replicas: i32) -> GatewayResult<()> {
    if replicas < 0 {
        return Err(GatewayError::InvalidRequest(format!(
            "replicas must be non-negative, got {replicas}"
        )));
    }
    Ok(())
}
