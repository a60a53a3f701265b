//! Minimal client for the Prometheus HTTP API

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid metrics store endpoint: {0}")]
    Endpoint(String),

    #[error("metrics store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics store answered HTTP {0}")]
    Status(u16),

    #[error("metrics store query failed ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("unexpected metrics store payload: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether a repeat of the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Status(status) => *status >= 500,
            StoreError::Endpoint(_) | StoreError::Query { .. } | StoreError::Decode(_) => false,
        }
    }
}

/// `{status, data, errorType, error}` wrapper around every response
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData<R> {
    result: Vec<R>,
}

/// One series of a range query; values are `[unix_ts, "value"]` pairs
#[derive(Debug, Clone, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<(f64, String)>,
}

/// One sample of an instant query
#[derive(Debug, Clone, Deserialize)]
pub struct InstantSample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    alerts: Vec<Value>,
}

pub struct PrometheusClient {
    client: Client,
    base_url: Url,
}

impl PrometheusClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        // Keep any path prefix when joining API paths
        let mut base_url =
            Url::parse(endpoint).map_err(|err| StoreError::Endpoint(format!("{endpoint}: {err}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    pub async fn query_range(
        &self,
        query: &str,
        start: f64,
        end: f64,
        step: &str,
    ) -> Result<Vec<RangeSeries>, StoreError> {
        let params = [
            ("query", query.to_string()),
            ("start", format!("{start:.3}")),
            ("end", format!("{end:.3}")),
            ("step", step.to_string()),
        ];
        let data: QueryData<RangeSeries> = self.get("api/v1/query_range", &params).await?;
        Ok(data.result)
    }

    pub async fn query(&self, query: &str) -> Result<Vec<InstantSample>, StoreError> {
        let data: QueryData<InstantSample> = self
            .get("api/v1/query", &[("query", query.to_string())])
            .await?;
        Ok(data.result)
    }

    /// Raw alert objects; shapes differ between store versions
    pub async fn alerts(&self) -> Result<Vec<Value>, StoreError> {
        let data: AlertsData = self.get("api/v1/alerts", &[]).await?;
        Ok(data.alerts)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: Value = self.get("api/v1/status/buildinfo", &[]).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, StoreError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| StoreError::Endpoint(err.to_string()))?;

        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))?;

        match (envelope.status.as_str(), envelope.data) {
            ("success", Some(data)) => Ok(data),
            _ => Err(StoreError::Query {
                error_type: envelope.error_type.unwrap_or_else(|| envelope.status.clone()),
                message: envelope.error.unwrap_or_default(),
            }),
        }
    }
}
