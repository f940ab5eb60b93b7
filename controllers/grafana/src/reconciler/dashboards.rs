//! Dashboard reconciliation.
//!
//! Maps the ten fixed config slots onto dashboard JSON files in the
//! directory the static provider descriptor points at. A slot owns at most
//! one file, named `<sanitized-title>-<slot>.json`; emptying the slot
//! removes the file, and malformed JSON skips the slot without touching
//! whatever it provisioned earlier.

use super::{Reconciler, write_if_changed};
use crate::error::ControllerError;
use model::DASHBOARD_SLOTS;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of one dashboard reconciliation pass.
#[derive(Debug, Default)]
pub(crate) struct DashboardChanges {
    /// Whether any file was written or removed
    pub changed: bool,
    /// Per-slot malformed-JSON reports; these slots were skipped
    pub malformed: Vec<ControllerError>,
}

/// Derive a filesystem-safe name from a dashboard title.
///
/// Lowercases, maps runs of non-alphanumeric characters to a single `-`,
/// and trims. A title that sanitizes to nothing becomes `dashboard`.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "dashboard".to_string()
    } else {
        out
    }
}

impl Reconciler {
    /// Reconcile all dashboard slots against the dashboards directory.
    ///
    /// Slots are independent: a malformed slot is reported and skipped
    /// while the rest still reconcile.
    pub(crate) fn reconcile_dashboards(
        &self,
        slots: &[Option<String>; DASHBOARD_SLOTS],
    ) -> Result<DashboardChanges, ControllerError> {
        let dir = self.paths.dashboards_dir();
        std::fs::create_dir_all(&dir)?;

        let mut changes = DashboardChanges::default();
        for (slot, value) in slots.iter().enumerate() {
            let owned = slot_files(&dir, slot)?;
            match value {
                None => {
                    // Empty slot: remove its file, touch nothing else
                    for path in owned {
                        info!("Removing dashboard file {}", path.display());
                        std::fs::remove_file(path)?;
                        changes.changed = true;
                    }
                }
                Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                    Err(source) => {
                        // Configuration error, not a transient fault: skip the
                        // slot, leave its prior file as it was
                        warn!("Dashboard slot {slot} holds malformed JSON, skipping");
                        changes
                            .malformed
                            .push(ControllerError::MalformedDashboard { slot, source });
                    }
                    Ok(doc) => {
                        let title = doc
                            .get("title")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default();
                        let expected = dir.join(format!("{}-{slot}.json", sanitize_title(title)));

                        // Title changes rename the file; drop the old one
                        for path in owned {
                            if path != expected {
                                info!("Removing stale dashboard file {}", path.display());
                                std::fs::remove_file(path)?;
                                changes.changed = true;
                            }
                        }

                        if write_if_changed(&expected, raw.as_bytes())? {
                            info!("Wrote dashboard file {}", expected.display());
                            changes.changed = true;
                        }
                    }
                },
            }
        }
        Ok(changes)
    }

    /// Write the static dashboard provider descriptor once.
    ///
    /// Grafana scans the directory this points at, which is what lets
    /// dashboard-only changes apply without a restart.
    pub(crate) fn ensure_dashboard_provider(&self) -> Result<(), ControllerError> {
        let path = self.paths.dashboard_provider_file();
        if path.exists() {
            return Ok(());
        }
        let provider = format!(
            r"apiVersion: 1
providers:
  - name: operator
    orgId: 1
    folder: ''
    type: file
    disableDeletion: false
    updateIntervalSeconds: 10
    options:
      path: {}
",
            self.paths.dashboards_dir().display()
        );
        write_if_changed(&path, provider.as_bytes())?;
        info!("Wrote dashboard provider descriptor");
        Ok(())
    }
}

/// Files in `dir` owned by `slot`, i.e. ending in `-<slot>.json`.
fn slot_files(dir: &std::path::Path, slot: usize) -> Result<Vec<PathBuf>, ControllerError> {
    let suffix = format!("-{slot}.json");
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Hex sha256 of a file's content, `None` when absent.
#[cfg(test)]
pub(crate) fn content_hash(path: &std::path::Path) -> Option<String> {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let bytes = std::fs::read(path).ok()?;
    let digest = Sha256::digest(&bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    Some(out)
}
