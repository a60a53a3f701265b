//! Per-backend health for the liveness and readiness probes
//!
//! Each backend is a named component whose status is refreshed from a
//! reachability probe. The gateway as a whole is as healthy as its worst
//! component; a simulated orchestrator counts as degraded, not failed.

use crate::error::GatewayResult;
use crate::models::ConnectivityMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered from best to worst so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Answering, but not from the real backend
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names, one per backend
pub mod components {
    pub const RUNTIME: &str = "runtime";
    pub const ORCHESTRATOR: &str = "orchestrator";
    pub const METRICS_STORE: &str = "metrics_store";
}

#[derive(Debug, Default)]
struct State {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared, cloneable view of backend health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `name`, assumed healthy until its first probe
    pub async fn register(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    /// Fold the outcome of a reachability probe into a component's status
    pub async fn record_probe(&self, name: &str, outcome: &GatewayResult<()>) {
        match outcome {
            Ok(()) => self.set(name, ComponentStatus::Healthy, None).await,
            Err(err) => {
                self.set(name, ComponentStatus::Unhealthy, Some(err.to_string()))
                    .await
            }
        }
    }

    pub async fn set_orchestrator_mode(&self, mode: ConnectivityMode) {
        let (status, message) = match mode {
            ConnectivityMode::Live => (ComponentStatus::Healthy, None),
            ConnectivityMode::Simulated => {
                (ComponentStatus::Degraded, Some("simulation mode".to_string()))
            }
        };
        self.set(components::ORCHESTRATOR, status, message).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    /// Ready once started, unless some backend is down
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = self.state.read().await.ready;
        let reason = if !ready {
            Some("Gateway not yet initialized")
        } else if self.health().await.status == ComponentStatus::Unhealthy {
            Some("Backend unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }
}
