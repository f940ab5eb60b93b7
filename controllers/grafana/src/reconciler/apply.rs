//! Apply engine.
//!
//! Persists the desired state to disk and confirms the service picked it
//! up. The pass is skipped entirely when the desired-state fingerprint
//! matches the last applied one, and the service is restarted only when
//! `grafana.ini` itself changed; provisioning-only changes rely on
//! Grafana's own directory scanning.

use super::{ApplyOutcome, ApplyResult, Reconciler, write_if_changed};
use crate::backoff::ExponentialBackoff;
use crate::error::ControllerError;
use crate::paths::Paths;
use model::{DesiredState, LastApplied};
use tracing::{debug, info};

impl Reconciler {
    /// Apply `desired`, given the snapshot of the previous successful pass.
    ///
    /// Transient health failures exhaust the retry budget and come back as
    /// [`ControllerError::Transient`]; in every failure case `LastApplied`
    /// on disk is left unchanged so the next triggering event retries the
    /// full desired state.
    pub async fn apply(
        &self,
        desired: &DesiredState,
        last_applied: Option<&LastApplied>,
    ) -> Result<ApplyResult, ControllerError> {
        let fingerprint = desired.fingerprint();
        if let Some(last) = last_applied {
            if last.fingerprint == fingerprint {
                debug!("Desired state unchanged, skipping apply");
                return Ok(ApplyResult {
                    outcome: ApplyOutcome::Unchanged,
                    restarted: false,
                    last_applied: last.clone(),
                    malformed_slots: Vec::new(),
                });
            }
        }

        let ini = render_ini(desired, &self.paths);
        if write_if_changed(&self.paths.config_file(), ini.as_bytes())? {
            // Cleared only after the restart succeeds; if the restart fails
            // the retry pass finds the ini already on disk but the marker
            // still set, and restarts then
            self.mark_restart_pending()?;
        }
        let restart_needed = self.paths.restart_pending_file().exists();

        self.ensure_dashboard_provider()?;
        let datasources_changed = self.reconcile_datasources(&desired.datasources)?;
        let dashboard_changes = self.reconcile_dashboards(&desired.dashboards)?;

        if restart_needed {
            // Port/credential/url/version live in the ini; those need a restart
            self.service.restart().await?;
            self.clear_restart_pending()?;
        } else if datasources_changed || dashboard_changes.changed {
            debug!("Provisioning-only change, relying on Grafana's directory scan");
        }

        let attempts = self.await_healthy().await?;
        debug!("Grafana healthy after {attempts} probe(s)");

        let snapshot = LastApplied::now(fingerprint);
        self.persist_last_applied(&snapshot)?;
        info!(
            "Applied desired state (restarted: {restart_needed}, datasources: {})",
            desired.datasources.len()
        );

        Ok(ApplyResult {
            outcome: ApplyOutcome::Applied,
            restarted: restart_needed,
            last_applied: snapshot,
            malformed_slots: dashboard_changes.malformed,
        })
    }

    fn mark_restart_pending(&self) -> Result<(), ControllerError> {
        let path = self.paths.restart_pending_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"")?;
        Ok(())
    }

    fn clear_restart_pending(&self) -> Result<(), ControllerError> {
        match std::fs::remove_file(self.paths.restart_pending_file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Probe the health endpoint until it succeeds or the budget runs out.
    ///
    /// Returns the number of probes performed.
    async fn await_healthy(&self) -> Result<u32, ControllerError> {
        let mut backoff = ExponentialBackoff::new(self.retry);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.grafana.check_health().await {
                Ok(()) => return Ok(attempts),
                Err(source) if attempts >= self.retry.attempts => {
                    return Err(ControllerError::Transient { attempts, source });
                }
                Err(e) => {
                    let delay = backoff.next_backoff();
                    debug!("Health probe {attempts} failed ({e}), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Load the persisted snapshot, `None` on first run.
    pub fn load_last_applied(&self) -> Result<Option<LastApplied>, ControllerError> {
        match std::fs::read(self.paths.last_applied_file()) {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(ControllerError::StateFile)?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist_last_applied(&self, snapshot: &LastApplied) -> Result<(), ControllerError> {
        let encoded = serde_json::to_vec_pretty(snapshot).map_err(ControllerError::StateFile)?;
        let path = self.paths.last_applied_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, encoded)?;
        Ok(())
    }
}

/// Render `grafana.ini` from the desired state.
///
/// The managed-by header carries the Grafana version, so a version bump
/// changes the file and therefore triggers the restart path.
pub(crate) fn render_ini(desired: &DesiredState, paths: &Paths) -> String {
    format!(
        r"# Managed by grafana-controller for Grafana {version}

[paths]
data = {data}
logs = {logs}
plugins = {plugins}
provisioning = {provisioning}

[server]
http_port = {port}
root_url = {root_url}
enable_gzip = true

[security]
admin_user = {admin_user}
admin_password = {admin_password}
allow_embedding = {allow_embedding}

[auth.anonymous]
enabled = {enable_anonymous}
org_role = Viewer

[log]
mode = console file
level = {log_level}

[log.console]
level = {log_level}

[log.file]
level = {log_level}
log_rotate = true
max_lines = 1000000
max_size_shift = 28
daily_rotate = true
max_days = 7

[analytics]
reporting_enabled = false
check_for_updates = false

[snapshots]
external_enabled = false
",
        version = desired.grafana_version,
        data = paths.data_dir.display(),
        logs = paths.logs_dir.display(),
        plugins = paths.plugins_dir().display(),
        provisioning = paths.provisioning_dir().display(),
        port = desired.http_port,
        root_url = desired.external_url,
        admin_user = desired.admin_user,
        admin_password = desired.admin_password,
        allow_embedding = desired.allow_embedding,
        enable_anonymous = desired.enable_anonymous,
        log_level = desired.log_level,
    )
}
