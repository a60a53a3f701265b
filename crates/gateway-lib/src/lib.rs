//! Backend adapter layer for the container platform gateway
//!
//! This crate provides:
//! - A runtime adapter normalizing Docker containers into one record shape
//! - An orchestration adapter over Kubernetes with a simulated fallback mode
//! - A query template engine over the Prometheus HTTP API
//! - The aggregation facade consumed by the HTTP boundary
//! - Health checks, retry policy and observability

pub mod error;
pub mod facade;
pub mod field;
pub mod health;
pub mod models;
pub mod monitoring;
pub mod observability;
pub mod orchestrator;
pub mod retry;
pub mod runtime;

pub use error::{Backend, ErrorKind, GatewayError, GatewayResult};
pub use facade::Gateway;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitoring::{MonitoringEngine, PrometheusClient};
pub use observability::{GatewayMetrics, StructuredLogger};
pub use orchestrator::{
    ClusterBackend, ClusterConnector, KubeConnector, OrchestrationAdapter,
};
pub use retry::RetryPolicy;
pub use runtime::{ContainerBackend, DockerBackend, RuntimeAdapter};
