//! HTTP API: the gateway's `/api/v1` surface plus health checks and
//! Prometheus metrics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use gateway_lib::{
    health::components,
    monitoring::DEFAULT_DURATION,
    ComponentStatus, CreateContainerRequest, CreateDeploymentRequest, CreateServiceRequest,
    ErrorKind, Gateway, GatewayError, HealthRegistry,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub health_registry: HealthRegistry,
    /// Namespace used when a request names none
    pub default_namespace: String,
}

impl AppState {
    pub fn new(
        gateway: Gateway,
        health_registry: HealthRegistry,
        default_namespace: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            health_registry,
            default_namespace: default_namespace.into(),
        }
    }

    fn namespace(&self, requested: Option<String>) -> String {
        requested
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.default_namespace.clone())
    }
}

/// Gateway failure rendered as `{ "error", "kind" }`
#[derive(Debug)]
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if let GatewayError::Conflict(_) = self.0 {
            return StatusCode::CONFLICT;
        }
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PartialFailure => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn message(text: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "message": text.into() }))
}

/// `false` from a delete or scale means the target does not exist
fn found(exists: bool, resource: &'static str, name: &str) -> ApiResult<()> {
    if exists {
        Ok(())
    } else {
        Err(GatewayError::not_found(resource, name).into())
    }
}

/// Ping the backends and fold the outcome into the health registry
pub async fn probe_backends(gateway: &Gateway, health_registry: &HealthRegistry) {
    let (runtime, store) = tokio::join!(gateway.ping_runtime(), gateway.ping_metrics_store());
    health_registry
        .record_probe(components::RUNTIME, &runtime)
        .await;
    health_registry
        .record_probe(components::METRICS_STORE, &store)
        .await;
    health_registry
        .set_orchestrator_mode(gateway.orchestrator_mode().await)
        .await;
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    probe_backends(&state.gateway, &state.health_registry).await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Last known per-backend health, without probing
async fn api_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health_registry.health().await)
}

// Containers

#[derive(Debug, Deserialize)]
struct RemoveParams {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    #[serde(default = "default_tail")]
    tail: usize,
}

fn default_tail() -> usize {
    100
}

async fn list_containers(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.gateway.list_containers().await?))
}

async fn create_container(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateContainerRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state.gateway.create_container(&request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.gateway.get_container(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(GatewayError::not_found("container", id).into()),
    }
}

async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.gateway.start_container(&id).await?;
    Ok(message(format!("container {id} started")))
}

async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.gateway.stop_container(&id).await?;
    Ok(message(format!("container {id} stopped")))
}

async fn remove_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RemoveParams>,
) -> ApiResult<impl IntoResponse> {
    state.gateway.remove_container(&id, params.force).await?;
    Ok(message(format!("container {id} removed")))
}

async fn container_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LogsParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.gateway.container_logs(&id, params.tail).await?))
}

async fn container_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.gateway.container_stats(&id).await?))
}

// Kubernetes

#[derive(Debug, Deserialize)]
struct NamespaceParams {
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScaleParams {
    replicas: i32,
    namespace: Option<String>,
}

async fn orchestrator_mode(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "mode": state.gateway.orchestrator_mode().await }))
}

async fn list_deployments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NamespaceParams>,
) -> ApiResult<impl IntoResponse> {
    let namespace = state.namespace(params.namespace);
    Ok(Json(state.gateway.list_deployments(&namespace).await?))
}

async fn create_deployment(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<CreateDeploymentRequest>,
) -> ApiResult<impl IntoResponse> {
    request.namespace = Some(state.namespace(request.namespace.take()));
    let created = state.gateway.create_deployment(&request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_deployment(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<NamespaceParams>,
) -> ApiResult<impl IntoResponse> {
    let namespace = state.namespace(params.namespace);
    let deleted = state.gateway.delete_deployment(&name, &namespace).await?;
    found(deleted, "deployment", &name)?;
    Ok(message(format!("deployment {name} deleted")))
}

async fn scale_deployment(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<ScaleParams>,
) -> ApiResult<impl IntoResponse> {
    let namespace = state.namespace(params.namespace);
    let scaled = state
        .gateway
        .scale_deployment(&name, params.replicas, &namespace)
        .await?;
    found(scaled, "deployment", &name)?;
    Ok(message(format!(
        "deployment {name} scaled to {} replicas",
        params.replicas
    )))
}

async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NamespaceParams>,
) -> ApiResult<impl IntoResponse> {
    let namespace = state.namespace(params.namespace);
    Ok(Json(state.gateway.list_services(&namespace).await?))
}

async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<CreateServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    request.namespace = Some(state.namespace(request.namespace.take()));
    let created = state.gateway.create_service(&request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<NamespaceParams>,
) -> ApiResult<impl IntoResponse> {
    let namespace = state.namespace(params.namespace);
    let deleted = state.gateway.delete_service(&name, &namespace).await?;
    found(deleted, "service", &name)?;
    Ok(message(format!("service {name} deleted")))
}

// Monitoring

#[derive(Debug, Deserialize)]
struct DurationParams {
    #[serde(default = "default_duration")]
    duration: String,
}

fn default_duration() -> String {
    DEFAULT_DURATION.to_string()
}

async fn container_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DurationParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .gateway
            .container_metrics(&id, &params.duration)
            .await?,
    ))
}

async fn cluster_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.gateway.cluster_metrics().await)
}

async fn alerts(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.gateway.alerts().await?))
}

async fn system_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.gateway.system_metrics().await)
}

async fn system_alarms(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.gateway.system_alarms().await?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/health", get(api_health))
        .route(
            "/api/v1/containers",
            get(list_containers).post(create_container),
        )
        .route(
            "/api/v1/containers/:id",
            get(get_container).delete(remove_container),
        )
        .route("/api/v1/containers/:id/start", post(start_container))
        .route("/api/v1/containers/:id/stop", post(stop_container))
        .route("/api/v1/containers/:id/logs", get(container_logs))
        .route("/api/v1/containers/:id/stats", get(container_stats))
        .route("/api/v1/kubernetes/mode", get(orchestrator_mode))
        .route(
            "/api/v1/kubernetes/deployments",
            get(list_deployments).post(create_deployment),
        )
        .route(
            "/api/v1/kubernetes/deployments/:name",
            delete(delete_deployment),
        )
        .route(
            "/api/v1/kubernetes/deployments/:name/scale",
            put(scale_deployment),
        )
        .route(
            "/api/v1/kubernetes/services",
            get(list_services).post(create_service),
        )
        .route(
            "/api/v1/kubernetes/services/:name",
            delete(delete_service),
        )
        .route(
            "/api/v1/monitoring/containers/:id/metrics",
            get(container_metrics),
        )
        .route("/api/v1/monitoring/cluster/metrics", get(cluster_metrics))
        .route("/api/v1/monitoring/alerts", get(alerts))
        .route("/api/v1/metrics", get(system_metrics))
        .route("/api/v1/metrics/alarms", get(system_alarms))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
