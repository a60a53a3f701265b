//! Runtime adapter tests against an in-process backend

use super::*;
use crate::error::ErrorKind;
use crate::models::UNTAGGED_IMAGE;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct FakeBackend {
    containers: Mutex<HashMap<String, Value>>,
    images: HashMap<String, Vec<String>>,
    stats: HashMap<String, Value>,
    unreachable: bool,
    /// Inspecting this container fails at the transport level
    dropped_inspect: Option<String>,
    images_unreachable: bool,
    inspect_calls: AtomicU32,
    image_calls: AtomicU32,
}

impl FakeBackend {
    fn with_container(self, doc: Value) -> Self {
        let id = doc["Id"].as_str().unwrap_or("broken").to_string();
        self.containers.lock().unwrap().insert(id, doc);
        self
    }

    fn with_image(mut self, image_id: &str, tags: &[&str]) -> Self {
        self.images.insert(
            image_id.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl ContainerBackend for FakeBackend {
    async fn list_ids(&self) -> Result<Vec<String>, RuntimeError> {
        if self.unreachable {
            return Err(RuntimeError::Connection("connection refused".into()));
        }
        let mut ids: Vec<_> = self.containers.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn inspect(&self, id: &str) -> Result<Value, RuntimeError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        if self.dropped_inspect.as_deref() == Some(id) {
            return Err(RuntimeError::Connection("connection reset".into()));
        }
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn image_tags(&self, image: &str) -> Result<Vec<String>, RuntimeError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.images_unreachable {
            return Err(RuntimeError::Connection("connection reset".into()));
        }
        self.images
            .get(image)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(image.to_string()))
    }

    async fn create(&self, request: &CreateContainerRequest) -> Result<String, RuntimeError> {
        if request.image == "missing:latest" {
            return Err(RuntimeError::NotFound("No such image".into()));
        }
        let mut containers = self.containers.lock().unwrap();
        if containers
            .values()
            .any(|doc| doc["Name"] == format!("/{}", request.name))
        {
            return Err(RuntimeError::Rejected {
                status: 409,
                message: format!("name {} already in use", request.name),
            });
        }
        let id = format!("id-{}", request.name);
        containers.insert(
            id.clone(),
            container_doc(&id, &request.name, "sha256:new", "created"),
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.set_status(id, "running")
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.set_status(id, "exited")
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().unwrap();
        let running = match containers.get(id) {
            Some(doc) => doc["State"]["Status"] == "running",
            None => return Err(RuntimeError::NotFound(id.to_string())),
        };
        if running && !force {
            return Err(RuntimeError::Rejected {
                status: 409,
                message: "container is running".into(),
            });
        }
        containers.remove(id);
        Ok(())
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String, RuntimeError> {
        if !self.containers.lock().unwrap().contains_key(id) {
            return Err(RuntimeError::NotFound(id.to_string()));
        }
        Ok((0..tail.min(3)).map(|n| format!("line {n}\n")).collect())
    }

    async fn stats(&self, id: &str) -> Result<Value, RuntimeError> {
        self.stats
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.unreachable {
            Err(RuntimeError::Connection("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl FakeBackend {
    fn set_status(&self, id: &str, status: &str) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().unwrap();
        let doc = containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        doc["State"]["Status"] = json!(status);
        Ok(())
    }
}

fn container_doc(id: &str, name: &str, image: &str, status: &str) -> Value {
    json!({
        "Id": id,
        "Name": format!("/{name}"),
        "Created": "2024-03-01T10:00:00Z",
        "Image": image,
        "State": {"Status": status},
        "Config": {"Image": image},
        "NetworkSettings": {"Ports": {}}
    })
}

fn adapter(backend: FakeBackend) -> (RuntimeAdapter, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let policy = RetryPolicy {
        attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
    };
    (RuntimeAdapter::new(backend.clone(), policy), backend)
}

#[tokio::test]
async fn test_get_unknown_container_is_absent() {
    let (runtime, _) = adapter(FakeBackend::default());

    let result = runtime.get("does-not-exist").await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_get_returns_detail_shape() {
    let (runtime, _) = adapter(
        FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:web", "running"))
            .with_image("sha256:web", &["nginx:latest"]),
    );

    let record = runtime.get("a1").await.unwrap().unwrap();

    assert_eq!(record.name, "web");
    assert_eq!(record.image, "nginx:latest");
    assert_eq!(record.state["Status"], "running");
    assert_eq!(record.config["Image"], "sha256:web");
}

#[tokio::test]
async fn test_list_skips_malformed_record() {
    let mut broken = container_doc("c3", "broken", "sha256:web", "running");
    broken["State"]["Status"] = json!(17);

    let (runtime, _) = adapter(
        FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:web", "running"))
            .with_container(container_doc("b2", "worker", "sha256:web", "exited"))
            .with_container(broken)
            .with_image("sha256:web", &["nginx:latest"]),
    );

    let records = runtime.list().await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.id != "c3"));
    assert!(records.iter().all(|r| r.state.is_empty()));
}

#[tokio::test]
async fn test_list_resolves_each_image_once() {
    let (runtime, backend) = adapter(
        FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:web", "running"))
            .with_container(container_doc("b2", "web-2", "sha256:web", "running"))
            .with_container(container_doc("c3", "orphan", "sha256:gone", "exited"))
            .with_image("sha256:web", &["nginx:latest"]),
    );

    let records = runtime.list().await.unwrap();

    assert_eq!(records.len(), 3);
    let orphan = records.iter().find(|r| r.id == "c3").unwrap();
    assert_eq!(orphan.image, UNTAGGED_IMAGE);
    assert_eq!(backend.image_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_untagged_image_yields_sentinel() {
    let (runtime, _) = adapter(
        FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:dangling", "running"))
            .with_image("sha256:dangling", &[]),
    );

    let records = runtime.list().await.unwrap();

    assert_eq!(records[0].image, UNTAGGED_IMAGE);
}

#[tokio::test]
async fn test_unreachable_runtime_is_backend_unavailable() {
    let (runtime, _) = adapter(FakeBackend {
        unreachable: true,
        ..Default::default()
    });

    let err = runtime.list().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_list_fails_when_inspect_loses_runtime() {
    let (runtime, _) = adapter(FakeBackend {
        dropped_inspect: Some("b2".into()),
        ..FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:web", "running"))
            .with_container(container_doc("b2", "worker", "sha256:web", "running"))
            .with_image("sha256:web", &["nginx:latest"])
    });

    let err = runtime.list().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_list_fails_when_image_lookup_loses_runtime() {
    let (runtime, _) = adapter(FakeBackend {
        images_unreachable: true,
        ..FakeBackend::default()
            .with_container(container_doc("a1", "web", "sha256:web", "running"))
    });

    let err = runtime.list().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);

    let err = runtime.get("a1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_create_conflict_and_missing_image_are_invalid_requests() {
    let (runtime, _) = adapter(
        FakeBackend::default().with_container(container_doc("a1", "web", "sha256:web", "running")),
    );

    let duplicate = CreateContainerRequest {
        image: "nginx:latest".into(),
        name: "web".into(),
        ports: None,
        env: None,
    };
    let err = runtime.create(&duplicate).await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let missing = CreateContainerRequest {
        image: "missing:latest".into(),
        name: "fresh".into(),
        ports: None,
        env: None,
    };
    let err = runtime.create(&missing).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_create_echoes_identifier() {
    let (runtime, _) = adapter(FakeBackend::default());

    let created = runtime
        .create(&CreateContainerRequest {
            image: "redis:7".into(),
            name: "cache".into(),
            ports: None,
            env: None,
        })
        .await
        .unwrap();

    assert_eq!(created.id, "id-cache");
    assert_eq!(created.name, "cache");
    assert_eq!(created.status, "created");
}

#[tokio::test]
async fn test_force_remove_twice_reports_not_found() {
    let (runtime, _) = adapter(
        FakeBackend::default().with_container(container_doc("a1", "web", "sha256:web", "running")),
    );

    runtime.remove("a1", true).await.unwrap();
    let err = runtime.remove("a1", true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_remove_running_without_force_is_rejected() {
    let (runtime, _) = adapter(
        FakeBackend::default().with_container(container_doc("a1", "web", "sha256:web", "running")),
    );

    let err = runtime.remove("a1", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_start_and_stop_update_status() {
    let (runtime, _) = adapter(
        FakeBackend::default().with_container(container_doc("a1", "web", "sha256:web", "created")),
    );

    runtime.start("a1").await.unwrap();
    assert_eq!(runtime.get("a1").await.unwrap().unwrap().status, "running");

    runtime.stop("a1").await.unwrap();
    assert_eq!(runtime.get("a1").await.unwrap().unwrap().status, "exited");

    let err = runtime.start("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_logs_are_tailed() {
    let (runtime, _) = adapter(
        FakeBackend::default().with_container(container_doc("a1", "web", "sha256:web", "running")),
    );

    let logs = runtime.logs("a1", 2).await.unwrap();

    assert_eq!(logs.logs, "line 0\nline 1\n");
}

#[tokio::test]
async fn test_stats_without_eth0_is_not_found() {
    let mut backend = FakeBackend::default();
    backend.stats.insert(
        "a1".into(),
        json!({
            "cpu_stats": {"cpu_usage": {"total_usage": 5}},
            "memory_stats": {"usage": 10},
            "networks": {}
        }),
    );
    let (runtime, _) = adapter(backend);

    let err = runtime.stats("a1").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_not_found_reads_are_not_retried() {
    let (runtime, backend) = adapter(FakeBackend::default());

    assert!(runtime.get("ghost").await.unwrap().is_none());

    assert_eq!(backend.inspect_calls.load(Ordering::SeqCst), 1);
}
