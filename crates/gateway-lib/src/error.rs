//! Typed error taxonomy returned to the HTTP boundary

use crate::field::NormalizeError;
use serde::Serialize;
use thiserror::Error;

/// Backend a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Runtime,
    Orchestrator,
    MetricsStore,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Runtime => "runtime",
            Backend::Orchestrator => "orchestrator",
            Backend::MetricsStore => "metrics_store",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification the boundary maps to transport status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    BackendUnavailable,
    PartialFailure,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{backend} unavailable ({context}): {message}")]
    BackendUnavailable {
        backend: Backend,
        context: &'static str,
        message: String,
    },

    #[error("malformed {resource} {id}: {source}")]
    PartialFailure {
        resource: &'static str,
        id: String,
        #[source]
        source: NormalizeError,
    },
}

impl GatewayError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        GatewayError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn unavailable(backend: Backend, context: &'static str, message: impl ToString) -> Self {
        GatewayError::BackendUnavailable {
            backend,
            context,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::InvalidRequest(_) | GatewayError::Conflict(_) => {
                ErrorKind::InvalidRequest
            }
            GatewayError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            GatewayError::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }

    /// Only transport-level failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
