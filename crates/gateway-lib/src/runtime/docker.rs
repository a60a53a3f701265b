use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    errors::Error as DockerError,
    models::{ContainerCreateBody, HostConfig, PortBinding},
    query_parameters::{
        CreateContainerOptionsBuilder, InspectContainerOptions, ListContainersOptionsBuilder,
        LogsOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
        StatsOptionsBuilder, StopContainerOptions,
    },
    Docker, API_DEFAULT_VERSION,
};
use futures_util::{StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::info;

use crate::models::CreateContainerRequest;
use crate::runtime::{ContainerBackend, RuntimeError};

/// [`ContainerBackend`] over the Docker Engine API
#[derive(Clone)]
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connect to `host` when given (`unix://`, `tcp://` or `http://`),
    /// otherwise to the local defaults (`DOCKER_HOST` or the default socket).
    pub fn connect(host: Option<&str>, timeout: Duration) -> Result<Self, RuntimeError> {
        let timeout_secs = timeout.as_secs();
        let docker = match host {
            None => Docker::connect_with_defaults(),
            Some(addr) if addr.starts_with("unix://") => {
                Docker::connect_with_unix(addr, timeout_secs, API_DEFAULT_VERSION)
            }
            Some(addr) => Docker::connect_with_http(addr, timeout_secs, API_DEFAULT_VERSION),
        }
        .map_err(|err| RuntimeError::Connection(err.to_string()))?
        .with_timeout(timeout);

        info!(
            docker_host = host.unwrap_or("default"),
            timeout_secs, "Docker client configured"
        );
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerBackend for DockerBackend {
    async fn list_ids(&self) -> Result<Vec<String>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptionsBuilder::new().all(true).build()))
            .await
            .map_err(map_docker_error)?;

        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn inspect(&self, id: &str) -> Result<Value, RuntimeError> {
        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(map_docker_error)?;

        to_json(&details)
    }

    async fn image_tags(&self, image: &str) -> Result<Vec<String>, RuntimeError> {
        let inspect = self
            .docker
            .inspect_image(image)
            .await
            .map_err(map_docker_error)?;

        Ok(inspect.repo_tags.unwrap_or_default())
    }

    async fn create(&self, request: &CreateContainerRequest) -> Result<String, RuntimeError> {
        let options = CreateContainerOptionsBuilder::new()
            .name(&request.name)
            .build();

        let created = self
            .docker
            .create_container(Some(options), create_body(request))
            .await
            .map_err(map_docker_error)?;

        Ok(created.id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .start_container(id, None::<StartContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if is_not_modified(&err) => Ok(()),
            Err(err) => Err(map_docker_error(err)),
        }
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if is_not_modified(&err) => Ok(()),
            Err(err) => Err(map_docker_error(err)),
        }
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptionsBuilder::new().force(force).build()),
            )
            .await
            .map_err(map_docker_error)
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String, RuntimeError> {
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail(&tail.to_string())
            .build();

        let mut stream = self.docker.logs(id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.try_next().await.map_err(map_docker_error)? {
            output.push_str(&chunk.to_string());
        }
        Ok(output)
    }

    async fn stats(&self, id: &str) -> Result<Value, RuntimeError> {
        let mut stream = self
            .docker
            .stats(
                id,
                Some(
                    StatsOptionsBuilder::default()
                        .stream(false)
                        .one_shot(true)
                        .build(),
                ),
            )
            .take(1);

        let stats = stream
            .try_next()
            .await
            .map_err(map_docker_error)?
            .ok_or_else(|| RuntimeError::NotFound(format!("stats for {id}")))?;

        to_json(&stats)
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(map_docker_error)?;
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(payload: &T) -> Result<Value, RuntimeError> {
    serde_json::to_value(payload).map_err(|err| RuntimeError::Other(err.to_string()))
}

/// Engine API create body: image, env as `KEY=value`, published ports
fn create_body(request: &CreateContainerRequest) -> ContainerCreateBody {
    let env = request.env.as_ref().map(|vars| {
        vars.iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
    });

    let mut exposed_ports: Vec<String> = Vec::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for (container_port, hosts) in request.ports.iter().flatten() {
        exposed_ports.push(container_port.clone());
        port_bindings.insert(
            container_port.clone(),
            Some(
                hosts
                    .iter()
                    .map(|host| PortBinding {
                        host_ip: host.host_ip.clone(),
                        host_port: Some(host.host_port.clone()),
                    })
                    .collect(),
            ),
        );
    }

    ContainerCreateBody {
        image: Some(request.image.clone()),
        env,
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: (!port_bindings.is_empty()).then(|| HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn is_not_modified(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

fn is_connection_error(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::IOError { .. }
            | DockerError::HyperResponseError { .. }
            | DockerError::RequestTimeoutError
            | DockerError::SocketNotFoundError(_)
    )
}

fn map_docker_error(err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } if (400..500).contains(&status_code) => RuntimeError::Rejected {
            status: status_code,
            message,
        },
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Server {
            status: status_code,
            message,
        },
        other if is_connection_error(&other) => RuntimeError::Connection(other.to_string()),
        other => RuntimeError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HostBinding;
    use std::collections::BTreeMap;

    fn server_error(status_code: u16) -> DockerError {
        DockerError::DockerResponseServerError {
            status_code,
            message: format!("status {status_code}"),
        }
    }

    #[test]
    fn test_status_codes_map_to_runtime_errors() {
        assert!(matches!(
            map_docker_error(server_error(404)),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            map_docker_error(server_error(409)),
            RuntimeError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            map_docker_error(server_error(400)),
            RuntimeError::Rejected { status: 400, .. }
        ));
        assert!(matches!(
            map_docker_error(server_error(500)),
            RuntimeError::Server { status: 500, .. }
        ));
        assert!(matches!(
            map_docker_error(DockerError::RequestTimeoutError),
            RuntimeError::Connection(_)
        ));
    }

    #[test]
    fn test_not_modified_detection() {
        assert!(is_not_modified(&server_error(304)));
        assert!(!is_not_modified(&server_error(404)));
    }

    #[test]
    fn test_create_body_forwards_ports_and_env() {
        let request = CreateContainerRequest {
            image: "nginx:latest".into(),
            name: "web".into(),
            ports: Some(BTreeMap::from([(
                "80/tcp".to_string(),
                vec![HostBinding {
                    host_ip: None,
                    host_port: "8080".into(),
                }],
            )])),
            env: Some(BTreeMap::from([("MODE".to_string(), "prod".to_string())])),
        };

        let body = create_body(&request);

        assert_eq!(body.image.as_deref(), Some("nginx:latest"));
        assert_eq!(body.env, Some(vec!["MODE=prod".to_string()]));
        assert!(body.exposed_ports.unwrap().contains(&"80/tcp".to_string()));
        let bindings = body.host_config.unwrap().port_bindings.unwrap();
        let published = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(published[0].host_port.as_deref(), Some("8080"));
    }

    #[test]
    fn test_create_body_without_options() {
        let request = CreateContainerRequest {
            image: "redis:7".into(),
            name: "cache".into(),
            ports: None,
            env: None,
        };

        let body = create_body(&request);

        assert!(body.env.is_none());
        assert!(body.exposed_ports.is_none());
        assert!(body.host_config.is_none());
    }
}
