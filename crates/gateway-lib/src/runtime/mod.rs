//! Container runtime adapter
//!
//! Wraps a [`ContainerBackend`] (Docker in production) and normalizes its
//! loosely-typed inspect and stats payloads into [`ContainerRecord`] and
//! [`ContainerStats`]. Reads go through the retry policy; mutations are
//! issued exactly once.

mod docker;
mod normalize;

#[cfg(test)]
mod tests;

pub use docker::DockerBackend;

use crate::error::{Backend, ErrorKind, GatewayError, GatewayResult};
use crate::field::{Field, Partial};
use crate::models::{
    ContainerLogs, ContainerRecord, ContainerStats, CreateContainerRequest, CreatedContainer,
};
use crate::observability::{GatewayMetrics, StructuredLogger};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by a container backend, before classification
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("cannot reach container runtime: {0}")]
    Connection(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("runtime rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("runtime error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("runtime client error: {0}")]
    Other(String),
}

impl RuntimeError {
    /// Classify into the gateway taxonomy for a call on `resource`
    fn classify(self, context: &'static str, resource: &'static str, id: &str) -> GatewayError {
        match self {
            RuntimeError::NotFound(_) => GatewayError::not_found(resource, id),
            RuntimeError::Rejected { status: 409, message } => GatewayError::Conflict(message),
            RuntimeError::Rejected { message, .. } => GatewayError::InvalidRequest(message),
            other => GatewayError::unavailable(Backend::Runtime, context, other),
        }
    }
}

/// Raw operations against a container runtime
///
/// Payloads are returned in the runtime's own JSON shape; normalization
/// happens in [`RuntimeAdapter`].
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Identifiers of all containers, running or not
    async fn list_ids(&self) -> Result<Vec<String>, RuntimeError>;

    async fn inspect(&self, id: &str) -> Result<Value, RuntimeError>;

    /// Repository tags of an image, most specific first
    async fn image_tags(&self, image: &str) -> Result<Vec<String>, RuntimeError>;

    /// Create (but do not start) a container, returning its identifier
    async fn create(&self, request: &CreateContainerRequest) -> Result<String, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError>;

    async fn logs(&self, id: &str, tail: usize) -> Result<String, RuntimeError>;

    /// One non-streaming stats snapshot
    async fn stats(&self, id: &str) -> Result<Value, RuntimeError>;

    async fn ping(&self) -> Result<(), RuntimeError>;
}

pub type DynContainerBackend = Arc<dyn ContainerBackend>;

const CONTAINER: &str = "container";

/// Normalizing adapter over a container backend
pub struct RuntimeAdapter {
    backend: DynContainerBackend,
    retry: RetryPolicy,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl RuntimeAdapter {
    pub fn new(backend: DynContainerBackend, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            metrics: GatewayMetrics::new(),
            logger: StructuredLogger::new("runtime_adapter"),
        }
    }

    /// All containers regardless of run state
    ///
    /// Records that fail normalization, or vanish between listing and
    /// inspection, are dropped and logged. Losing the runtime mid-listing
    /// fails the whole call.
    pub async fn list(&self) -> GatewayResult<Vec<ContainerRecord>> {
        let ids = self
            .read("list_containers", "", || self.backend.list_ids())
            .await?;

        let mut tags: HashMap<String, Field<String>> = HashMap::new();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&id, false, &mut tags).await {
                Err(err) if err.kind() == ErrorKind::BackendUnavailable => return Err(err),
                record => results.push((id, record)),
            }
        }

        let partial = Partial::fold(results);
        if !partial.is_complete() {
            self.logger.log_skipped(Backend::Runtime, &partial.skipped);
            self.metrics
                .add_records_skipped(Backend::Runtime, partial.skipped.len());
        }
        debug!(count = partial.items.len(), "Listed containers");
        Ok(partial.items)
    }

    /// Full detail record, or `None` for an unknown identifier
    pub async fn get(&self, id: &str) -> GatewayResult<Option<ContainerRecord>> {
        let mut tags = HashMap::new();
        match self.load(id, true, &mut tags).await {
            Ok(record) => Ok(Some(record)),
            Err(GatewayError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create(&self, request: &CreateContainerRequest) -> GatewayResult<CreatedContainer> {
        if request.image.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("image must not be empty".into()));
        }

        let id = self
            .observe("create_container", &request.name, self.backend.create(request))
            .await
            .map_err(|err| match err {
                // The only thing create can fail to find is the image
                GatewayError::NotFound { .. } => {
                    GatewayError::InvalidRequest(format!("image {} not found", request.image))
                }
                other => other,
            })?;

        info!(container_id = %id, name = %request.name, image = %request.image, "Created container");
        Ok(CreatedContainer {
            id,
            name: request.name.clone(),
            status: "created".to_string(),
        })
    }

    pub async fn start(&self, id: &str) -> GatewayResult<()> {
        self.observe("start_container", id, self.backend.start(id))
            .await?;
        info!(container_id = %id, "Started container");
        Ok(())
    }

    pub async fn stop(&self, id: &str) -> GatewayResult<()> {
        self.observe("stop_container", id, self.backend.stop(id))
            .await?;
        info!(container_id = %id, "Stopped container");
        Ok(())
    }

    pub async fn remove(&self, id: &str, force: bool) -> GatewayResult<()> {
        self.observe("remove_container", id, self.backend.remove(id, force))
            .await?;
        info!(container_id = %id, force, "Removed container");
        Ok(())
    }

    pub async fn logs(&self, id: &str, tail: usize) -> GatewayResult<ContainerLogs> {
        let logs = self
            .read("container_logs", id, || self.backend.logs(id, tail))
            .await?;
        Ok(ContainerLogs { logs })
    }

    pub async fn stats(&self, id: &str) -> GatewayResult<ContainerStats> {
        let raw = self
            .read("container_stats", id, || self.backend.stats(id))
            .await?;
        normalize::container_stats(&raw, id)
    }

    /// Cheap reachability probe for health reporting
    pub async fn ping(&self) -> GatewayResult<()> {
        self.observe("ping", "", self.backend.ping()).await
    }

    async fn load(
        &self,
        id: &str,
        detailed: bool,
        tags: &mut HashMap<String, Field<String>>,
    ) -> GatewayResult<ContainerRecord> {
        let raw = self
            .read("inspect_container", id, || self.backend.inspect(id))
            .await?;

        let image = match normalize::image_ref(&raw) {
            Field::Present(image_id) => self.resolve_image(&image_id, tags).await?,
            Field::Absent => Field::Absent,
            Field::Malformed(reason) => Field::Malformed(reason),
        };

        normalize::container_record(&raw, image, detailed).map_err(|source| {
            GatewayError::PartialFailure {
                resource: CONTAINER,
                id: id.to_string(),
                source,
            }
        })
    }

    /// First repository tag of an image, memoized for one list call
    async fn resolve_image(
        &self,
        image_id: &str,
        tags: &mut HashMap<String, Field<String>>,
    ) -> GatewayResult<Field<String>> {
        if let Some(known) = tags.get(image_id) {
            return Ok(known.clone());
        }

        let resolved = match self
            .read("inspect_image", image_id, || self.backend.image_tags(image_id))
            .await
        {
            Ok(list) => Field::from_option(list.into_iter().find(|t| !t.is_empty())),
            Err(GatewayError::NotFound { .. }) => Field::Absent,
            Err(err) => return Err(err),
        };
        tags.insert(image_id.to_string(), resolved.clone());
        Ok(resolved)
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, id: &str, mut op: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RuntimeError>>,
    {
        self.retry
            .run(operation, || {
                let call = op();
                self.observe(operation, id, call)
            })
            .await
    }

    /// Time one backend call, count its outcome and classify its error
    async fn observe<T>(
        &self,
        operation: &'static str,
        id: &str,
        call: impl Future<Output = Result<T, RuntimeError>>,
    ) -> GatewayResult<T> {
        let started = Instant::now();
        let result = call.await;
        self.metrics.record_call(
            Backend::Runtime,
            operation,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result.map_err(|err| err.classify(operation, CONTAINER, id))
    }
}
