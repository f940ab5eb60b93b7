//! Controller-specific error types.
//!
//! The taxonomy mirrors how failures are handled: configuration-shape
//! errors are surfaced immediately and never retried, service-availability
//! errors are retried within a bounded budget, and peer-state failures
//! degrade to local behavior with a warning.

use grafana_client::GrafanaError;
use thiserror::Error;

/// Errors that can occur in the Grafana controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Bad operator input; reconciliation aborted, previous state keeps running
    #[error("Invalid configuration: {0}")]
    Validation(#[from] model::ValidationError),

    /// A dashboard slot holds JSON that does not parse; the slot is skipped
    #[error("Malformed dashboard JSON in slot {slot}: {source}")]
    MalformedDashboard {
        /// Slot index 0..9
        slot: usize,
        /// The parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Service not healthy after the retry budget; recoverable, the next
    /// triggering event re-attempts the full desired state
    #[error("Grafana not healthy after {attempts} attempts: {source}")]
    Transient {
        /// Probes performed before giving up
        attempts: u32,
        /// Last probe failure
        #[source]
        source: GrafanaError,
    },

    /// Peer state unreachable; falls back to local secret generation
    #[error("Peer state unavailable: {0}")]
    SecretResolution(String),

    /// Grafana API error outside the health-probe path
    #[error("Grafana error: {0}")]
    Grafana(#[from] GrafanaError),

    /// Filesystem error while writing artifacts or state
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Provisioning YAML encode/decode error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Controller state or action output encode/decode error
    #[error("State file error: {0}")]
    StateFile(#[from] serde_json::Error),

    /// Payload download failure during installation
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),

    /// Service manager (systemd) failure
    #[error("Service error: {0}")]
    Service(String),

    /// Invalid controller environment/bootstrap configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ControllerError {
    /// True for configuration-shape errors that must never be retried.
    ///
    /// Everything else is treated as recoverable: the reconciliation loop
    /// reports a degraded status and re-attempts on the next event.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::MalformedDashboard { .. } | Self::InvalidConfig(_)
        )
    }
}
