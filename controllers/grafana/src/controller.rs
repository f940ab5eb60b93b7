//! Top-level reconciliation loop.
//!
//! Driven by discrete external events (config change, relation change,
//! peer update). Events are processed strictly one at a time to
//! completion; an event arriving mid-apply waits in the channel and is
//! then evaluated against the latest inputs, so a deferred trigger never
//! applies stale desired state.

use crate::error::ControllerError;
use crate::reconciler::{ApplyResult, Reconciler, datasources};
use crate::secret::SecretStore;
use grafana_client::GrafanaApi;
use model::{LastApplied, RawConfig, SourceEntry};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// An observed state change that triggers reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Operator config changed
    ConfigChanged,
    /// Metrics-source relation data changed
    SourcesChanged,
    /// Peer-shared state changed
    PeerChanged,
    /// Periodic status refresh, no reconciliation
    UpdateStatus,
}

/// Reported unit status, in the order of decreasing severity the loop
/// assigns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Startup or installation in progress
    Maintenance(String),
    /// Bad operator input; previous good state keeps running
    Blocked(String),
    /// Recoverable condition, will retry on the next event
    Waiting(String),
    /// Service healthy and serving the applied state
    Active {
        /// Datasources Grafana reports (or the planned count when the API
        /// is unreachable)
        datasources: usize,
        /// Externally reachable URL
        url: String,
    },
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Maintenance(msg) => write!(f, "maintenance: {msg}"),
            Self::Blocked(msg) => write!(f, "blocked: {msg}"),
            Self::Waiting(msg) => write!(f, "waiting: {msg}"),
            Self::Active { datasources: 0, url } => {
                write!(f, "Grafana ready (no datasources) - {url}")
            }
            Self::Active { datasources, url } => {
                write!(f, "Grafana ready ({datasources} datasources) - {url}")
            }
        }
    }
}

/// Where the declarative inputs live.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Operator config file (YAML key/value surface)
    pub config_file: PathBuf,
    /// Relation data published by metrics-source collaborators (JSON)
    pub sources_file: PathBuf,
    /// This unit's own address, for deriving `external_url`
    pub bind_address: Option<IpAddr>,
}

impl Inputs {
    /// Read the raw operator config; a missing file means defaults.
    pub fn load_config(&self) -> Result<RawConfig, ControllerError> {
        match std::fs::read(&self.config_file) {
            Ok(bytes) => serde_yaml::from_slice(&bytes)
                .map_err(|e| ControllerError::InvalidConfig(format!("config file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RawConfig::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the current relation entries; a missing file means no relations.
    pub fn load_sources(&self) -> Result<Vec<SourceEntry>, ControllerError> {
        match std::fs::read(&self.sources_file) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ControllerError::InvalidConfig(format!("sources file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Main controller: computes desired state from the inputs and drives the
/// reconcilers.
pub struct Controller {
    inputs: Inputs,
    reconciler: Reconciler,
    secrets: SecretStore,
    grafana: Arc<dyn GrafanaApi + Send + Sync>,
    last_applied: Option<LastApplied>,
    status: Status,
    /// Credential of the last pass, for authenticated status queries
    credentials: Option<(String, String)>,
    external_url: Option<String>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("inputs", &self.inputs)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance, loading the persisted
    /// last-applied snapshot.
    pub fn new(
        inputs: Inputs,
        reconciler: Reconciler,
        secrets: SecretStore,
        grafana: Arc<dyn GrafanaApi + Send + Sync>,
    ) -> Result<Self, ControllerError> {
        let last_applied = reconciler.load_last_applied()?;
        Ok(Self {
            inputs,
            reconciler,
            secrets,
            grafana,
            last_applied,
            status: Status::Maintenance("starting".to_string()),
            credentials: None,
            external_url: None,
        })
    }

    /// Current reported status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Runs the controller until the event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) -> Result<(), ControllerError> {
        info!("Grafana controller running");
        while let Some(event) = events.recv().await {
            debug!("Processing {event:?}");
            match event {
                Event::UpdateStatus => self.refresh_status().await,
                Event::ConfigChanged | Event::SourcesChanged | Event::PeerChanged => {
                    self.reconcile().await;
                }
            }
        }
        info!("Event channel closed, controller exiting");
        Ok(())
    }

    /// One reconciliation pass, mapping failures onto status.
    pub async fn reconcile(&mut self) {
        match self.reconcile_once().await {
            Ok(result) => {
                if result.malformed_slots.is_empty() {
                    self.refresh_status().await;
                } else {
                    // Other slots applied; surface the bad ones to the operator
                    let reasons: Vec<String> = result
                        .malformed_slots
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    self.report(Status::Blocked(reasons.join("; ")));
                }
            }
            Err(e) if e.is_config_error() => {
                error!("Reconciliation aborted on configuration error: {e}");
                self.report(Status::Blocked(e.to_string()));
            }
            Err(e) => {
                warn!("Reconciliation failed, will retry on next event: {e}");
                self.report(Status::Waiting(e.to_string()));
            }
        }
    }

    async fn reconcile_once(&mut self) -> Result<ApplyResult, ControllerError> {
        let raw = self.inputs.load_config()?;
        let mut desired = model::normalize(&raw, self.inputs.bind_address)?;

        // The operator's admin_password (possibly empty) is only an
        // override; the secret store decides the authoritative value
        let secret = self
            .secrets
            .resolve(&desired.admin_user, &desired.admin_password)
            .await;
        desired.admin_password = secret.password;

        let entries = self.inputs.load_sources()?;
        desired.datasources = datasources::plan(&entries);

        let result = self
            .reconciler
            .apply(&desired, self.last_applied.as_ref())
            .await?;

        self.last_applied = Some(result.last_applied.clone());
        self.credentials = Some((desired.admin_user.clone(), desired.admin_password.clone()));
        self.external_url = Some(desired.external_url.to_string());
        Ok(result)
    }

    /// Refresh the Active status, querying the datasource count from the
    /// API when the credential is known (best effort).
    async fn refresh_status(&mut self) {
        let url = self
            .external_url
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let datasources = match &self.credentials {
            Some((user, password)) => match self.grafana.datasource_count(user, password).await {
                Ok(count) => count,
                Err(e) => {
                    debug!("Could not query datasource count: {e}");
                    0
                }
            },
            None => 0,
        };
        self.report(Status::Active { datasources, url });
    }

    fn report(&mut self, status: Status) {
        if status != self.status {
            info!("Status: {status}");
            self.status = status;
        }
    }
}
