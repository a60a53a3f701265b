//! Orchestration adapter tests: live against an in-process cluster,
//! simulated without any backend at all.

use super::*;
use crate::error::ErrorKind;
use crate::models::{ServicePort, ServiceType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct FakeCluster {
    deployments: Mutex<HashMap<(String, String), Deployment>>,
    services: Mutex<HashMap<(String, String), Service>>,
}

impl FakeCluster {
    fn insert_deployment(&self, namespace: &str, deployment: Deployment) {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), deployment);
    }
}

#[async_trait]
impl ClusterBackend for FakeCluster {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        let deployments = self.deployments.lock().unwrap();
        let mut items: Vec<_> = deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect();
        items.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(items)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let mut deployments = self.deployments.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        if deployments.contains_key(&key) {
            return Err(ClusterError::Conflict(format!("deployment {name}")));
        }
        let mut created = deployment.clone();
        created.metadata.namespace = Some(namespace.to_string());
        deployments.insert(key, created.clone());
        Ok(created)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deployments
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        Ok(())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, ClusterError> {
        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut created = service.clone();
        created.metadata.namespace = Some(namespace.to_string());
        if let Some(spec) = created.spec.as_mut() {
            spec.cluster_ip = Some("10.96.0.12".into());
        }
        self.services
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), created.clone());
        Ok(created)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.services
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }
}

/// Fails the first `failures` attempts, then binds `cluster`
struct FlakyConnector {
    failures: u32,
    attempts: AtomicU32,
    cluster: Arc<FakeCluster>,
}

#[async_trait]
impl ClusterConnector for FlakyConnector {
    async fn connect(&self) -> anyhow::Result<DynClusterBackend> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            anyhow::bail!("no credentials (attempt {attempt})");
        }
        Ok(self.cluster.clone())
    }
}

/// Fails once, then holds every connect until `gate` is notified
struct GatedConnector {
    attempts: AtomicU32,
    gate: tokio::sync::Notify,
    cluster: Arc<FakeCluster>,
}

#[async_trait]
impl ClusterConnector for GatedConnector {
    async fn connect(&self) -> anyhow::Result<DynClusterBackend> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("no credentials");
        }
        self.gate.notified().await;
        Ok(self.cluster.clone())
    }
}

fn deployment_request(name: &str, namespace: &str, replicas: i32) -> CreateDeploymentRequest {
    CreateDeploymentRequest {
        name: name.into(),
        image: "nginx:latest".into(),
        namespace: Some(namespace.into()),
        replicas,
        labels: None,
    }
}

fn service_request(name: &str) -> CreateServiceRequest {
    CreateServiceRequest {
        name: name.into(),
        namespace: None,
        service_type: ServiceType::ClusterIP,
        ports: None,
        selector: None,
    }
}

fn live() -> (OrchestrationAdapter, Arc<FakeCluster>) {
    let cluster = Arc::new(FakeCluster::default());
    (OrchestrationAdapter::with_backend(cluster.clone()), cluster)
}

#[tokio::test]
async fn test_simulated_create_deployment_echoes_request() {
    let adapter = OrchestrationAdapter::simulated("no credentials");

    let created = adapter
        .create_deployment(&deployment_request("foo", "ns", 2))
        .await
        .unwrap();

    assert_eq!(
        created,
        CreatedDeployment {
            name: "foo".into(),
            namespace: "ns".into(),
            replicas: 2,
        }
    );
    assert_eq!(adapter.mode().await, ConnectivityMode::Simulated);
}

#[tokio::test]
async fn test_simulated_listings_are_deterministic() {
    let adapter = OrchestrationAdapter::simulated("no credentials");

    let deployments = adapter.list_deployments("staging").await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].name, "sample-deployment");
    assert_eq!(deployments[0].namespace, "staging");
    assert_eq!(deployments[0].replicas, 3);
    assert_eq!(deployments[0].available_replicas, Some(3));
    assert_eq!(deployments[0].image, "nginx:latest");
    assert_eq!(deployments[0].created_at.as_deref(), Some("2023-01-01T00:00:00Z"));

    let services = adapter.list_services("default").await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "sample-service");
    assert_eq!(services[0].service_type, ServiceType::ClusterIP);
    assert_eq!(services[0].cluster_ip.as_deref(), Some("10.0.0.1"));
    assert!(services[0].external_ip.is_none());
    assert_eq!(services[0].ports, vec![ServicePort::new(80, 80)]);

    assert_eq!(adapter.list_deployments("staging").await.unwrap(), deployments);
}

#[tokio::test]
async fn test_simulated_mutations_always_succeed() {
    let adapter = OrchestrationAdapter::simulated("no credentials");

    assert!(adapter.scale_deployment("ghost", 4, "default").await.unwrap());
    assert!(adapter.delete_deployment("ghost", "default").await.unwrap());
    assert!(adapter.delete_service("ghost", "default").await.unwrap());
}

#[tokio::test]
async fn test_simulated_create_service_uses_defaults() {
    let adapter = OrchestrationAdapter::simulated("no credentials");

    let service = adapter.create_service(&service_request("web")).await.unwrap();

    assert_eq!(service.cluster_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(service.ports, vec![ServicePort::new(80, 80)]);
    assert_eq!(service.selector["app"], "web");
}

#[tokio::test]
async fn test_live_scale_unknown_deployment_is_false() {
    let (adapter, _) = live();

    assert!(!adapter.scale_deployment("ghost", 2, "default").await.unwrap());
    assert!(!adapter.delete_deployment("ghost", "default").await.unwrap());
}

#[tokio::test]
async fn test_live_create_then_list_and_scale() {
    let (adapter, _) = live();

    let created = adapter
        .create_deployment(&deployment_request("api", "prod", 2))
        .await
        .unwrap();
    assert_eq!(created.namespace, "prod");
    assert_eq!(created.replicas, 2);

    assert!(adapter.scale_deployment("api", 5, "prod").await.unwrap());

    let deployments = adapter.list_deployments("prod").await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].replicas, 5);
    assert_eq!(deployments[0].labels["app"], "api");
    assert_eq!(deployments[0].image, "nginx:latest");
}

#[tokio::test]
async fn test_live_duplicate_deployment_is_invalid_request() {
    let (adapter, _) = live();
    let request = deployment_request("api", "prod", 1);

    adapter.create_deployment(&request).await.unwrap();
    let err = adapter.create_deployment(&request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_live_list_skips_malformed_deployment() {
    let (adapter, cluster) = live();
    adapter
        .create_deployment(&deployment_request("api", "prod", 1))
        .await
        .unwrap();

    let mut broken = resources::deployment_manifest(&deployment_request("broken", "prod", 1));
    broken.spec = None;
    cluster.insert_deployment("prod", broken);

    let deployments = adapter.list_deployments("prod").await.unwrap();

    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].name, "api");
}

#[tokio::test]
async fn test_live_create_service_defaults_ports() {
    let (adapter, _) = live();

    let service = adapter.create_service(&service_request("web")).await.unwrap();

    assert_eq!(service.ports, vec![ServicePort::new(80, 80)]);
    assert_eq!(service.cluster_ip.as_deref(), Some("10.96.0.12"));
    assert_eq!(adapter.list_services("default").await.unwrap().len(), 1);
    assert!(adapter.delete_service("web", "default").await.unwrap());
    assert!(!adapter.delete_service("web", "default").await.unwrap());
}

#[tokio::test]
async fn test_negative_replicas_rejected() {
    let adapter = OrchestrationAdapter::simulated("no credentials");

    let err = adapter.scale_deployment("api", -1, "default").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_failed_connector_lands_in_simulation_without_reprobe() {
    let connector = Arc::new(FlakyConnector {
        failures: 1,
        attempts: AtomicU32::new(0),
        cluster: Arc::new(FakeCluster::default()),
    });

    let adapter = OrchestrationAdapter::initialize(connector.clone(), None).await;
    adapter.list_deployments("default").await.unwrap();

    assert_eq!(adapter.mode().await, ConnectivityMode::Simulated);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reprobe_switches_to_live() {
    let connector = Arc::new(FlakyConnector {
        failures: 1,
        attempts: AtomicU32::new(0),
        cluster: Arc::new(FakeCluster::default()),
    });

    let adapter = OrchestrationAdapter::initialize(connector.clone(), Some(Duration::ZERO)).await;
    assert_eq!(adapter.mode().await, ConnectivityMode::Simulated);

    let deployments = adapter.list_deployments("default").await.unwrap();

    assert!(deployments.is_empty());
    assert_eq!(adapter.mode().await, ConnectivityMode::Live);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reprobe_waits_for_interval() {
    let connector = Arc::new(FlakyConnector {
        failures: 1,
        attempts: AtomicU32::new(0),
        cluster: Arc::new(FakeCluster::default()),
    });

    let adapter =
        OrchestrationAdapter::initialize(connector.clone(), Some(Duration::from_secs(3600))).await;
    adapter.list_deployments("default").await.unwrap();

    assert_eq!(adapter.mode().await, ConnectivityMode::Simulated);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_calls_during_reprobe_answer_from_simulation() {
    let connector = Arc::new(GatedConnector {
        attempts: AtomicU32::new(0),
        gate: tokio::sync::Notify::new(),
        cluster: Arc::new(FakeCluster::default()),
    });
    let adapter =
        Arc::new(OrchestrationAdapter::initialize(connector.clone(), Some(Duration::ZERO)).await);

    let reprobe = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.list_deployments("default").await }
    });
    while connector.attempts.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    let meanwhile = tokio::time::timeout(
        Duration::from_secs(1),
        adapter.list_deployments("default"),
    )
    .await
    .expect("call blocked behind the re-probe")
    .unwrap();
    assert_eq!(meanwhile[0].name, "sample-deployment");
    assert_eq!(adapter.mode().await, ConnectivityMode::Simulated);

    connector.gate.notify_one();
    let deployments = reprobe.await.unwrap().unwrap();

    assert!(deployments.is_empty());
    assert_eq!(adapter.mode().await, ConnectivityMode::Live);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
}
