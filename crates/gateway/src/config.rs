//! Gateway configuration

use anyhow::{Context, Result};
use gateway_lib::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Gateway configuration, read from `GATEWAY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Container runtime address (`unix://`, `tcp://` or `http://`);
    /// local socket defaults when unset
    #[serde(default)]
    pub docker_host: Option<String>,

    #[serde(default = "default_docker_timeout")]
    pub docker_timeout_secs: u64,

    /// Cluster credentials file; in-cluster credentials when absent
    #[serde(default)]
    pub kubeconfig_path: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    #[serde(default = "default_prometheus_endpoint")]
    pub prometheus_endpoint: String,

    /// Per-call timeout for the metrics store and the cluster API
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff")]
    pub retry_max_backoff_ms: u64,

    /// Re-run cluster credential loading while simulated; never when unset
    #[serde(default)]
    pub reprobe_interval_secs: Option<u64>,
}

fn default_api_port() -> u16 {
    8000
}

fn default_docker_timeout() -> u64 {
    120
}

fn default_namespace() -> String {
    gateway_lib::DEFAULT_NAMESPACE.to_string()
}

fn default_prometheus_endpoint() -> String {
    "http://localhost:9090".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_initial_backoff() -> u64 {
    200
}

fn default_retry_max_backoff() -> u64 {
    2000
}

/// `GATEWAY_API_PORT`; `__` separates nested keys
fn environment() -> config::Environment {
    config::Environment::with_prefix("GATEWAY")
        .prefix_separator("_")
        .separator("__")
}

impl GatewayConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(environment())
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read gateway configuration")?
            .try_deserialize()
            .context("Invalid gateway configuration")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
        }
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reprobe_interval(&self) -> Option<Duration> {
        self.reprobe_interval_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_source(environment().source(Some(env)))
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.prometheus_endpoint, "http://localhost:9090");
        assert!(config.docker_host.is_none());
        assert!(config.reprobe_interval().is_none());

        let retry = config.retry_policy();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.initial_backoff, Duration::from_millis(200));
        assert_eq!(retry.max_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_environment_overrides() {
        let config = from_vars(&[
            ("GATEWAY_API_PORT", "9000"),
            ("GATEWAY_DOCKER_HOST", "tcp://10.0.0.5:2375"),
            ("GATEWAY_KUBECONFIG_PATH", "/etc/gateway/kubeconfig"),
            ("GATEWAY_REPROBE_INTERVAL_SECS", "60"),
            ("GATEWAY_RETRY_ATTEMPTS", "0"),
        ])
        .unwrap();

        assert_eq!(config.api_port, 9000);
        assert_eq!(config.docker_host.as_deref(), Some("tcp://10.0.0.5:2375"));
        assert_eq!(
            config.kubeconfig_path,
            Some(PathBuf::from("/etc/gateway/kubeconfig"))
        );
        assert_eq!(config.reprobe_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.retry_policy().attempts, 1);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        assert!(from_vars(&[("GATEWAY_API_PORT", "not-a-port")]).is_err());
    }
}
