//! Test utilities for unit testing reconcilers
//!
//! Helpers for creating test desired states and a fully mocked reconciler
//! rooted in a temp directory.

#[cfg(test)]
use crate::backoff::RetryPolicy;
#[cfg(test)]
use crate::error::ControllerError;
#[cfg(test)]
use crate::paths::Paths;
#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use crate::service::ServiceManager;
#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use grafana_client::MockGrafanaClient;
#[cfg(test)]
use model::{DesiredState, SourceEntry};
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};
#[cfg(test)]
use std::time::Duration;

/// Service manager that records calls instead of touching systemd
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingServiceManager {
    restarts: AtomicU32,
    starts: AtomicU32,
    failing_restarts: AtomicU32,
}

#[cfg(test)]
impl RecordingServiceManager {
    /// Successful restarts observed
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Make the next `n` restart calls fail (for test setup)
    pub fn fail_next_restarts(&self, n: u32) {
        self.failing_restarts.store(n, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl ServiceManager for RecordingServiceManager {
    async fn start(&self) -> Result<(), ControllerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ControllerError> {
        Ok(())
    }

    async fn restart(&self) -> Result<(), ControllerError> {
        let failing = self.failing_restarts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_restarts.store(failing - 1, Ordering::SeqCst);
            return Err(ControllerError::Service(
                "systemctl restart grafana-server failed".to_string(),
            ));
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_active(&self) -> bool {
        true
    }
}

/// Retry policy with millisecond delays so tests don't sleep for real
#[cfg(test)]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial: Duration::from_millis(1),
        max: Duration::from_millis(4),
    }
}

/// Reconciler wired to mocks, rooted under `root`
#[cfg(test)]
pub fn test_reconciler(
    root: &std::path::Path,
) -> (Reconciler, Arc<MockGrafanaClient>, Arc<RecordingServiceManager>) {
    let grafana = Arc::new(MockGrafanaClient::new());
    let service = Arc::new(RecordingServiceManager::default());
    let reconciler = Reconciler::new(
        Paths::under_root(root),
        grafana.clone(),
        service.clone(),
        fast_retry(),
    );
    (reconciler, grafana, service)
}

/// Helper to create a test desired state
#[cfg(test)]
pub fn test_desired_state() -> DesiredState {
    DesiredState {
        http_port: 3000,
        external_url: "http://localhost:3000".parse().unwrap(),
        admin_user: "admin".to_string(),
        admin_password: "test-password".to_string(),
        grafana_version: "11.4.0".parse().unwrap(),
        log_level: "info".to_string(),
        enable_anonymous: false,
        allow_embedding: false,
        datasources: Vec::new(),
        dashboards: Default::default(),
    }
}

/// Helper to create a test relation entry
#[cfg(test)]
pub fn test_source_entry(unit_name: &str, url: &str) -> SourceEntry {
    SourceEntry {
        unit_name: unit_name.to_string(),
        model_name: "observability".to_string(),
        model_uuid: "b0561ca9-5e7c-4d8a-8f90-4b3f1e2a6c01".parse().unwrap(),
        url: url.parse().unwrap(),
        source_type: "prometheus".to_string(),
    }
}
