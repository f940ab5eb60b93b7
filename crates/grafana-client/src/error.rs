//! Grafana client errors

use thiserror::Error;

/// Errors that can occur when talking to the Grafana HTTP API
#[derive(Debug, Error)]
pub enum GrafanaError {
    /// HTTP request/response error (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Grafana answered but is not (yet) healthy
    #[error("Grafana not ready: {0}")]
    NotReady(String),

    /// Authentication failed (wrong admin credential)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Grafana API returned an unexpected error
    #[error("Grafana API error: {0}")]
    Api(String),

    /// JSON decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
