//! Reconciliation logic.
//!
//! Organized by provisioned artifact:
//! - `datasources`: relation entries -> datasource provisioning YAML
//! - `dashboards`: config slots -> dashboard JSON files
//! - `apply`: the apply engine tying both together with `grafana.ini`,
//!   restart decisions and health probing

pub mod apply;
pub mod dashboards;
pub mod datasources;

#[cfg(test)]
mod apply_test;
#[cfg(test)]
mod datasources_test;

use crate::backoff::RetryPolicy;
use crate::error::ControllerError;
use crate::paths::Paths;
use crate::service::ServiceManager;
use grafana_client::GrafanaApi;
use model::LastApplied;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

/// Reconciles the managed Grafana instance with the desired state.
pub struct Reconciler {
    pub(crate) paths: Paths,
    pub(crate) grafana: Arc<dyn GrafanaApi + Send + Sync>,
    pub(crate) service: Arc<dyn ServiceManager>,
    pub(crate) retry: RetryPolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("paths", &self.paths)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        paths: Paths,
        grafana: Arc<dyn GrafanaApi + Send + Sync>,
        service: Arc<dyn ServiceManager>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            paths,
            grafana,
            service,
            retry,
        }
    }
}

/// What an apply pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Desired state fingerprint matched `LastApplied`; nothing was touched
    Unchanged,
    /// Artifacts were (re)written
    Applied,
}

/// Result of one apply pass.
#[derive(Debug)]
pub struct ApplyResult {
    /// Whether anything was written
    pub outcome: ApplyOutcome,
    /// Whether the service was restarted
    pub restarted: bool,
    /// Snapshot to carry into the next pass
    pub last_applied: LastApplied,
    /// Malformed-dashboard reports (slots skipped this pass)
    pub malformed_slots: Vec<ControllerError>,
}

/// Write `content` to `path` only when the on-disk content hash differs.
///
/// Creates parent directories as needed. Returns whether a write happened,
/// which is what feeds the restart/no-restart decision upstream.
pub(crate) fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool, ControllerError> {
    if let Ok(existing) = std::fs::read(path) {
        if Sha256::digest(&existing) == Sha256::digest(content) {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(true)
}
