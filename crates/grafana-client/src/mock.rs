//! Mock Grafana client for unit testing
//!
//! In-memory implementation of [`GrafanaApi`] that can be configured to
//! stay unhealthy for a number of probes, which is how the apply engine's
//! retry/backoff behavior is exercised without a running Grafana.

use crate::error::GrafanaError;
use crate::grafana_trait::GrafanaApi;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mock Grafana client for testing
#[derive(Debug, Clone, Default)]
pub struct MockGrafanaClient {
    /// Number of health probes that fail before the instance reports healthy
    unhealthy_probes: Arc<Mutex<u32>>,
    /// Total health probes observed
    probes: Arc<Mutex<u32>>,
    /// Datasource names the mock instance "knows"
    datasources: Arc<Mutex<Vec<String>>>,
    /// Expected admin credential, when set
    credential: Arc<Mutex<Option<(String, String)>>>,
}

impl MockGrafanaClient {
    /// Create a mock that is healthy from the first probe
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` health probes (for test setup)
    pub fn fail_health_probes(&self, n: u32) {
        *self.unhealthy_probes.lock().unwrap() = n;
    }

    /// Number of health probes seen so far
    pub fn probe_count(&self) -> u32 {
        *self.probes.lock().unwrap()
    }

    /// Set the datasource names the mock reports (for test setup)
    pub fn set_datasources(&self, names: Vec<String>) {
        *self.datasources.lock().unwrap() = names;
    }

    /// Require this credential for authenticated calls (for test setup)
    pub fn require_credential(&self, user: &str, password: &str) {
        *self.credential.lock().unwrap() = Some((user.to_string(), password.to_string()));
    }
}

#[async_trait]
impl GrafanaApi for MockGrafanaClient {
    async fn check_health(&self) -> Result<(), GrafanaError> {
        *self.probes.lock().unwrap() += 1;
        let mut remaining = self.unhealthy_probes.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(GrafanaError::NotReady("database starting up".to_string()));
        }
        Ok(())
    }

    async fn datasource_count(&self, user: &str, password: &str) -> Result<usize, GrafanaError> {
        if let Some((expected_user, expected_password)) = self.credential.lock().unwrap().as_ref() {
            if user != expected_user || password != expected_password {
                return Err(GrafanaError::Authentication("401 - bad credential".to_string()));
            }
        }
        Ok(self.datasources.lock().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_becomes_healthy_after_configured_failures() {
        let mock = MockGrafanaClient::new();
        mock.fail_health_probes(2);

        assert!(mock.check_health().await.is_err());
        assert!(mock.check_health().await.is_err());
        assert!(mock.check_health().await.is_ok());
        assert_eq!(mock.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_credential_enforcement() {
        let mock = MockGrafanaClient::new();
        mock.set_datasources(vec!["prometheus".to_string()]);
        mock.require_credential("admin", "hunter2");

        assert!(matches!(
            mock.datasource_count("admin", "wrong").await,
            Err(GrafanaError::Authentication(_))
        ));
        assert_eq!(mock.datasource_count("admin", "hunter2").await.unwrap(), 1);
    }
}
