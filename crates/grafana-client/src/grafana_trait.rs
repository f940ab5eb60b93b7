//! Trait abstraction over the Grafana HTTP API
//!
//! The apply engine and the status reporter depend on this trait rather
//! than the concrete client so tests can swap in a mock.

use crate::error::GrafanaError;
use async_trait::async_trait;

/// Operations the operator performs against a running Grafana.
#[async_trait]
pub trait GrafanaApi {
    /// Probe the health endpoint once.
    ///
    /// Returns `Ok(())` only when Grafana is ready to serve provisioned
    /// content; a reachable-but-initializing instance is an error.
    async fn check_health(&self) -> Result<(), GrafanaError>;

    /// Number of datasources Grafana currently knows about.
    ///
    /// Requires the admin credential.
    async fn datasource_count(&self, user: &str, password: &str) -> Result<usize, GrafanaError>;
}
