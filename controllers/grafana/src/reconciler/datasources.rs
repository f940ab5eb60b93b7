//! Datasource reconciliation.
//!
//! Converts relation entries from metrics-source collaborators into a
//! deterministic set of datasource definitions and writes them as one
//! provisioning file per pass. Names are stable for identical inputs, so
//! a relation that disappears is removed by name via `deleteDatasources`.

use super::{Reconciler, write_if_changed};
use crate::error::ControllerError;
use model::{DatasourceSpec, SourceEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// On-disk shape of the datasource provisioning file (`apiVersion: 1`).
#[derive(Debug, Serialize, Deserialize)]
struct DatasourceProvisioning {
    #[serde(rename = "apiVersion")]
    api_version: u32,
    #[serde(rename = "deleteDatasources", default, skip_serializing_if = "Vec::is_empty")]
    delete_datasources: Vec<DatasourceDeletion>,
    #[serde(default)]
    datasources: Vec<ProvisionedDatasource>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasourceDeletion {
    name: String,
    #[serde(rename = "orgId")]
    org_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProvisionedDatasource {
    name: String,
    #[serde(rename = "type")]
    source_type: String,
    access: String,
    url: Url,
    #[serde(rename = "isDefault")]
    is_default: bool,
    editable: bool,
}

impl From<&DatasourceSpec> for ProvisionedDatasource {
    fn from(spec: &DatasourceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            source_type: spec.source_type.clone(),
            access: spec.access.clone(),
            url: spec.url.clone(),
            is_default: spec.is_default,
            editable: true,
        }
    }
}

/// Compute the datasource set for the current relation entries.
///
/// Deterministic: entries are deduplicated and sorted by derived name, and
/// the lexicographically first spec is the single default. Same inputs
/// always produce the same output.
#[must_use]
pub fn plan(entries: &[SourceEntry]) -> Vec<DatasourceSpec> {
    let mut specs: Vec<DatasourceSpec> = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.datasource_name();
        if specs.iter().any(|s| s.name == name) {
            continue;
        }
        specs.push(DatasourceSpec {
            name,
            source_type: entry.source_type.clone(),
            url: entry.url.clone(),
            is_default: false,
            access: "proxy".to_string(),
        });
    }
    specs.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(first) = specs.first_mut() {
        first.is_default = true;
    }
    specs
}

impl Reconciler {
    /// Write the datasource provisioning file for this pass.
    ///
    /// Names present in the previously written file but absent from
    /// `specs` become `deleteDatasources` entries, so Grafana drops them
    /// on its next provisioning scan. Returns whether the file changed.
    pub(crate) fn reconcile_datasources(
        &self,
        specs: &[DatasourceSpec],
    ) -> Result<bool, ControllerError> {
        let path = self.paths.datasources_file();
        let previous = previous_names(&path);

        let current: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        let removed: Vec<DatasourceDeletion> = previous
            .iter()
            .filter(|name| !current.contains(&name.as_str()))
            .map(|name| DatasourceDeletion {
                name: name.clone(),
                org_id: 1,
            })
            .collect();

        if specs.is_empty() && removed.is_empty() && !path.exists() {
            debug!("No datasources to provision");
            return Ok(false);
        }

        for name in &removed {
            info!("Removing datasource {}", name.name);
        }

        let provisioning = DatasourceProvisioning {
            api_version: 1,
            delete_datasources: removed,
            datasources: specs.iter().map(ProvisionedDatasource::from).collect(),
        };
        let encoded = serde_yaml::to_string(&provisioning)?;

        let changed = write_if_changed(&path, encoded.as_bytes())?;
        if changed {
            info!("Provisioned {} datasources", specs.len());
        }
        Ok(changed)
    }
}

/// Names provisioned by the previous pass, from the file on disk.
///
/// An unreadable or corrupt file is treated as empty; the current pass
/// overwrites it anyway.
fn previous_names(path: &std::path::Path) -> Vec<String> {
    let Ok(bytes) = std::fs::read(path) else {
        return Vec::new();
    };
    match serde_yaml::from_slice::<DatasourceProvisioning>(&bytes) {
        Ok(provisioning) => provisioning
            .datasources
            .into_iter()
            .map(|d| d.name)
            .collect(),
        Err(_) => Vec::new(),
    }
}
