//! One-time installation of the Grafana payload.
//!
//! Fetches the upstream release tarball, unpacks it into the install
//! prefix and drops a systemd unit pointing at the managed config. Runs
//! once at deploy time; reconciliation never re-enters this path.

use crate::error::ControllerError;
use crate::paths::Paths;
use crate::service::SERVICE_UNIT;
use semver::Version;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

const DOWNLOAD_BASE: &str = "https://dl.grafana.com/oss/release";

/// Installs the Grafana binary payload and its systemd unit.
#[derive(Debug)]
pub struct Installer {
    paths: Paths,
    client: reqwest::Client,
}

impl Installer {
    pub fn new(paths: Paths) -> Result<Self, ControllerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { paths, client })
    }

    /// Create the directory layout the reconcilers write into.
    pub fn ensure_layout(&self) -> Result<(), ControllerError> {
        for dir in [
            &self.paths.config_dir,
            &self.paths.data_dir,
            &self.paths.logs_dir,
            &self.paths.install_dir,
            &self.paths.state_dir,
            &self.paths.provisioning_dir().join("datasources"),
            &self.paths.provisioning_dir().join("dashboards"),
            &self.paths.dashboards_dir(),
            &self.paths.plugins_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Download and unpack the release tarball for `version` into the
    /// install prefix.
    pub async fn fetch_payload(&self, version: &Version) -> Result<PathBuf, ControllerError> {
        let arch = debian_arch()?;
        let url = format!("{DOWNLOAD_BASE}/grafana-{version}.linux-{arch}.tar.gz");
        info!("Downloading Grafana {version} from {url}");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let tarball = self.paths.state_dir.join(format!("grafana-{version}.tar.gz"));
        std::fs::write(&tarball, &bytes)?;

        let status = Command::new("tar")
            .arg("xzf")
            .arg(&tarball)
            .arg("-C")
            .arg(&self.paths.install_dir)
            .arg("--strip-components=1")
            .status()
            .await?;
        if !status.success() {
            return Err(ControllerError::Service(format!(
                "tar exited with {status} unpacking {}",
                tarball.display()
            )));
        }
        info!("Unpacked Grafana {version} into {}", self.paths.install_dir.display());
        Ok(self.paths.install_dir.clone())
    }

    /// Systemd unit content for the installed payload.
    #[must_use]
    pub fn render_systemd_unit(&self) -> String {
        format!(
            "[Unit]\n\
             Description=Grafana\n\
             After=network-online.target\n\
             Wants=network-online.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             WorkingDirectory={install}\n\
             ExecStart={install}/bin/grafana-server --config={config}\n\
             Restart=on-failure\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            install = self.paths.install_dir.display(),
            config = self.paths.config_file().display(),
        )
    }

    /// Write the unit file and reload systemd.
    pub async fn install_systemd_unit(&self) -> Result<(), ControllerError> {
        let unit_path = PathBuf::from(format!("/etc/systemd/system/{SERVICE_UNIT}.service"));
        std::fs::write(&unit_path, self.render_systemd_unit())?;
        let status = Command::new("systemctl").arg("daemon-reload").status().await?;
        if !status.success() {
            return Err(ControllerError::Service(format!(
                "systemctl daemon-reload exited with {status}"
            )));
        }
        Ok(())
    }
}

fn debian_arch() -> Result<&'static str, ControllerError> {
    match std::env::consts::ARCH {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        other => Err(ControllerError::Service(format!(
            "unsupported architecture {other}"
        ))),
    }
}
