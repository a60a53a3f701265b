//! Management gateway - one HTTP API over the container runtime, the
//! cluster orchestrator and the metrics store
//!
//! The orchestrator falls back to simulated data when no cluster credentials
//! can be loaded; the runtime and the metrics store are reported unhealthy
//! but never block startup.

use anyhow::{Context, Result};
use gateway_lib::{
    health::components, DockerBackend, Gateway, HealthRegistry, KubeConnector, MonitoringEngine,
    OrchestrationAdapter, PrometheusClient, RuntimeAdapter, StructuredLogger,
};
use mgmt_gateway::{api, config::GatewayConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting mgmt-gateway");

    let config = GatewayConfig::load()?;
    info!(
        api_port = config.api_port,
        prometheus_endpoint = %config.prometheus_endpoint,
        default_namespace = %config.default_namespace,
        "Gateway configured"
    );

    let retry = config.retry_policy();

    let docker = DockerBackend::connect(config.docker_host.as_deref(), config.docker_timeout())
        .context("Failed to configure container runtime client")?;
    let runtime = RuntimeAdapter::new(Arc::new(docker), retry.clone());

    let connector = KubeConnector::new(config.kubeconfig_path.clone(), config.request_timeout());
    let orchestrator =
        OrchestrationAdapter::initialize(Arc::new(connector), config.reprobe_interval()).await;

    let store = PrometheusClient::new(&config.prometheus_endpoint, config.request_timeout())
        .context("Failed to configure metrics store client")?;
    let monitoring = MonitoringEngine::new(store, retry);

    let gateway = Gateway::new(
        Arc::new(runtime),
        Arc::new(orchestrator),
        Arc::new(monitoring),
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::RUNTIME).await;
    health_registry.register(components::ORCHESTRATOR).await;
    health_registry.register(components::METRICS_STORE).await;
    api::probe_backends(&gateway, &health_registry).await;

    let logger = StructuredLogger::new("gateway");
    logger.log_startup(GATEWAY_VERSION, gateway.orchestrator_mode().await);

    let app_state = Arc::new(api::AppState::new(
        gateway,
        health_registry.clone(),
        config.default_namespace.clone(),
    ));

    health_registry.set_ready(true).await;

    let server = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = server => {
            result.context("API server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
