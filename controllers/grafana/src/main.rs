//! Grafana lifecycle controller.
//!
//! Manages a machine-local Grafana deployment declaratively: operator
//! config and relation data go in, a converged `grafana.ini`,
//! provisioning tree and running service come out.
//!
//! Subcommands:
//! * `run` (default) - watch the inputs and reconcile on every change
//! * `install` - fetch the Grafana payload and register the service
//! * `get-admin-password` - print the resolved admin credential as JSON

mod actions;
mod backoff;
mod controller;
mod error;
mod install;
mod paths;
mod peers;
mod reconciler;
mod secret;
mod service;
mod test_utils;
mod watcher;

use crate::backoff::RetryPolicy;
use crate::controller::{Controller, Event, Inputs};
use crate::error::ControllerError;
use crate::install::Installer;
use crate::paths::Paths;
use crate::peers::FilePeerStore;
use crate::reconciler::Reconciler;
use crate::secret::SecretStore;
use crate::service::{SERVICE_UNIT, ServiceManager, SystemdManager};
use grafana_client::GrafanaClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "/etc/grafana-controller/config.yaml";
const DEFAULT_SOURCES_FILE: &str = "/etc/grafana-controller/sources.json";
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    let paths = match std::env::var_os("GRAFANA_CONTROLLER_ROOT") {
        Some(root) => Paths::under_root(PathBuf::from(root).as_path()),
        None => Paths::system(),
    };
    let inputs = Inputs {
        config_file: env_path("GRAFANA_CONTROLLER_CONFIG", DEFAULT_CONFIG_FILE),
        sources_file: env_path("GRAFANA_CONTROLLER_SOURCES", DEFAULT_SOURCES_FILE),
        bind_address: std::env::var("GRAFANA_CONTROLLER_BIND_ADDRESS")
            .ok()
            .and_then(|addr| addr.parse().ok()),
    };

    match std::env::args().nth(1).as_deref() {
        None | Some("run") => run(paths, inputs).await,
        Some("install") => install(paths, inputs).await,
        Some("get-admin-password") => get_admin_password(paths, inputs).await,
        Some(other) => Err(ControllerError::InvalidConfig(format!(
            "unknown subcommand {other:?}, expected run, install or get-admin-password"
        ))),
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// The configured HTTP port, falling back to the default when the config
/// is absent or invalid. Only used to aim the API client at startup; the
/// reconciliation path revalidates the config properly.
fn startup_port(inputs: &Inputs) -> u16 {
    inputs
        .load_config()
        .ok()
        .and_then(|raw| model::normalize(&raw, inputs.bind_address).ok())
        .map_or(model::config::DEFAULT_HTTP_PORT, |desired| desired.http_port)
}

async fn run(paths: Paths, inputs: Inputs) -> Result<(), ControllerError> {
    info!("Starting Grafana controller");

    let grafana = Arc::new(GrafanaClient::new(format!(
        "http://localhost:{}",
        startup_port(&inputs)
    ))?);
    let service = Arc::new(SystemdManager::new(SERVICE_UNIT));
    let reconciler = Reconciler::new(
        paths.clone(),
        grafana.clone(),
        service,
        RetryPolicy::default(),
    );
    let secrets = SecretStore::new(Arc::new(FilePeerStore::new(paths.peer_file())));
    let controller = Controller::new(inputs.clone(), reconciler, secrets, grafana)?;

    let (tx, rx) = mpsc::channel(16);
    let watcher = watcher::InputWatcher::new(
        inputs.config_file,
        inputs.sources_file,
        paths.peer_file(),
        POLL_INTERVAL,
        tx.clone(),
    );
    let watcher_handle = tokio::spawn(watcher.run());

    // Converge on the current inputs before the first poll tick
    if tx.send(Event::ConfigChanged).await.is_err() {
        return Err(ControllerError::Service(
            "event channel closed before startup".to_string(),
        ));
    }

    tokio::select! {
        result = controller.run(rx) => result,
        result = watcher_handle => match result {
            Ok(inner) => inner,
            Err(e) => Err(ControllerError::Service(format!("watcher task failed: {e}"))),
        },
    }
}

async fn install(paths: Paths, inputs: Inputs) -> Result<(), ControllerError> {
    let raw = inputs.load_config()?;
    let desired = model::normalize(&raw, inputs.bind_address)?;

    let installer = Installer::new(paths)?;
    installer.ensure_layout()?;
    installer.fetch_payload(&desired.grafana_version).await?;
    installer.install_systemd_unit().await?;
    SystemdManager::new(SERVICE_UNIT).start().await?;
    info!("Grafana {} installed and started", desired.grafana_version);
    Ok(())
}

async fn get_admin_password(paths: Paths, inputs: Inputs) -> Result<(), ControllerError> {
    let secrets = SecretStore::new(Arc::new(FilePeerStore::new(paths.peer_file())));
    let credential = actions::get_admin_password(&inputs, &secrets).await?;
    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(())
}
