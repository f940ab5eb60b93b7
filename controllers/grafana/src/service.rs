//! Monitored-service management.
//!
//! The apply engine only needs restart/start/stop and an activity probe;
//! the trait keeps systemd behind a seam so tests can record restarts
//! instead of shelling out.

use crate::error::ControllerError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

/// Systemd unit name of the managed Grafana instance.
pub const SERVICE_UNIT: &str = "grafana-server";

/// Lifecycle operations on the monitored service.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Start and enable the service.
    async fn start(&self) -> Result<(), ControllerError>;

    /// Stop the service.
    async fn stop(&self) -> Result<(), ControllerError>;

    /// Restart the service.
    async fn restart(&self) -> Result<(), ControllerError>;

    /// Whether the service is currently active.
    async fn is_active(&self) -> bool;
}

/// Systemd-backed service manager.
#[derive(Debug, Clone)]
pub struct SystemdManager {
    unit: String,
}

impl SystemdManager {
    /// Manage the given systemd unit.
    #[must_use]
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    async fn systemctl(&self, verb: &str) -> Result<(), ControllerError> {
        let output = Command::new("systemctl")
            .arg(verb)
            .arg(&self.unit)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControllerError::Service(format!(
                "systemctl {verb} {} failed: {stderr}",
                self.unit
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceManager for SystemdManager {
    async fn start(&self) -> Result<(), ControllerError> {
        info!("Starting {}", self.unit);
        self.systemctl("enable").await?;
        self.systemctl("start").await
    }

    async fn stop(&self) -> Result<(), ControllerError> {
        info!("Stopping {}", self.unit);
        self.systemctl("stop").await
    }

    async fn restart(&self) -> Result<(), ControllerError> {
        info!("Restarting {}", self.unit);
        self.systemctl("restart").await
    }

    async fn is_active(&self) -> bool {
        Command::new("systemctl")
            .arg("is-active")
            .arg(&self.unit)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
