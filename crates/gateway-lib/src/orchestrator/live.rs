//! Kubernetes-backed [`ClusterBackend`] and its credential loader

use super::{ClusterBackend, ClusterConnector, ClusterError, DynClusterBackend};
use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Live cluster access through the Kubernetes API
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        let list = self
            .deployments(namespace)
            .list(&ListParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(map_kube_error)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deployments(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, ClusterError> {
        let list = self
            .services(namespace)
            .list(&ListParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        self.services(namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(map_kube_error)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }
}

fn map_kube_error(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => ClusterError::NotFound(response.message),
            409 => ClusterError::Conflict(response.message),
            400 | 422 => ClusterError::Invalid(response.message),
            _ => ClusterError::Unavailable(format!("{} ({})", response.message, response.code)),
        },
        other => ClusterError::Unavailable(other.to_string()),
    }
}

/// Credential loading in strict order: an existing kubeconfig file at the
/// configured path, otherwise in-cluster service account credentials.
#[derive(Debug, Clone)]
pub struct KubeConnector {
    kubeconfig_path: Option<PathBuf>,
    timeout: Duration,
}

impl KubeConnector {
    pub fn new(kubeconfig_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            kubeconfig_path,
            timeout,
        }
    }

    async fn load_config(&self) -> anyhow::Result<Config> {
        match self.kubeconfig_path.as_ref().filter(|path| path.exists()) {
            Some(path) => {
                info!(kubeconfig = %path.display(), "Loading cluster credentials from file");
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .with_context(|| format!("Invalid kubeconfig {}", path.display()))
            }
            None => {
                info!("Trying in-cluster credentials");
                Config::incluster().context("Failed to load in-cluster credentials")
            }
        }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self) -> anyhow::Result<DynClusterBackend> {
        let mut config = self.load_config().await?;
        config.connect_timeout = Some(self.timeout);
        config.read_timeout = Some(self.timeout);

        let client = Client::try_from(config).context("Failed to build cluster client")?;
        Ok(Arc::new(KubeBackend::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("code {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn test_api_errors_are_classified() {
        assert!(matches!(map_kube_error(api_error(404)), ClusterError::NotFound(_)));
        assert!(matches!(map_kube_error(api_error(409)), ClusterError::Conflict(_)));
        assert!(matches!(map_kube_error(api_error(422)), ClusterError::Invalid(_)));
        assert!(matches!(map_kube_error(api_error(500)), ClusterError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unparseable_kubeconfig_fails_to_connect() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this: [is not a kubeconfig").unwrap();

        let connector =
            KubeConnector::new(Some(file.path().to_path_buf()), Duration::from_secs(1));

        assert!(connector.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_valid_kubeconfig_connects_without_network() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"apiVersion: v1
kind: Config
clusters:
- name: test
  cluster:
    server: https://127.0.0.1:6443
users:
- name: test
  user:
    token: abc123
contexts:
- name: test
  context:
    cluster: test
    user: test
current-context: test
"#
        )
        .unwrap();

        let connector =
            KubeConnector::new(Some(file.path().to_path_buf()), Duration::from_secs(1));

        assert!(connector.connect().await.is_ok());
    }
}
