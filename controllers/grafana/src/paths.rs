//! Filesystem layout for the managed Grafana instance.
//!
//! All artifact and state locations hang off a single root so tests can
//! relocate the whole tree into a temp directory.

use std::path::{Path, PathBuf};

/// Locations of everything the controller reads or writes on disk.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Grafana config directory (`/etc/grafana`)
    pub config_dir: PathBuf,
    /// Grafana data directory (`/var/lib/grafana`)
    pub data_dir: PathBuf,
    /// Grafana log directory (`/var/log/grafana`)
    pub logs_dir: PathBuf,
    /// Grafana install directory (`/usr/local/grafana`)
    pub install_dir: PathBuf,
    /// Controller-private state directory (`/var/lib/grafana-controller`)
    pub state_dir: PathBuf,
}

impl Paths {
    /// The standard machine layout.
    #[must_use]
    pub fn system() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/grafana"),
            data_dir: PathBuf::from("/var/lib/grafana"),
            logs_dir: PathBuf::from("/var/log/grafana"),
            install_dir: PathBuf::from("/usr/local/grafana"),
            state_dir: PathBuf::from("/var/lib/grafana-controller"),
        }
    }

    /// Relocate the whole layout under `root` (test deployments).
    #[must_use]
    pub fn under_root(root: &Path) -> Self {
        Self {
            config_dir: root.join("etc/grafana"),
            data_dir: root.join("var/lib/grafana"),
            logs_dir: root.join("var/log/grafana"),
            install_dir: root.join("usr/local/grafana"),
            state_dir: root.join("var/lib/grafana-controller"),
        }
    }

    /// `grafana.ini`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("grafana.ini")
    }

    /// Provisioning root scanned by Grafana
    #[must_use]
    pub fn provisioning_dir(&self) -> PathBuf {
        self.config_dir.join("provisioning")
    }

    /// Datasource provisioning file, one per reconciliation pass
    #[must_use]
    pub fn datasources_file(&self) -> PathBuf {
        self.provisioning_dir().join("datasources/datasources.yaml")
    }

    /// Static dashboard provider descriptor
    #[must_use]
    pub fn dashboard_provider_file(&self) -> PathBuf {
        self.provisioning_dir().join("dashboards/dashboards.yaml")
    }

    /// Directory holding the dashboard JSON files the provider points at
    #[must_use]
    pub fn dashboards_dir(&self) -> PathBuf {
        self.data_dir.join("dashboards")
    }

    /// Grafana plugin directory
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    /// Persisted fingerprint of the last successfully applied state
    #[must_use]
    pub fn last_applied_file(&self) -> PathBuf {
        self.state_dir.join("last_applied.json")
    }

    /// Marker recording that an ini change still needs a restart
    #[must_use]
    pub fn restart_pending_file(&self) -> PathBuf {
        self.state_dir.join("restart_pending")
    }

    /// File-backed peer store (single shared key)
    #[must_use]
    pub fn peer_file(&self) -> PathBuf {
        self.state_dir.join("peer.json")
    }
}
