//! Grafana API client
//!
//! Talks to the local Grafana instance over its HTTP API. The health
//! endpoint is unauthenticated; the datasource listing needs the admin
//! credential.

use crate::error::GrafanaError;
use crate::grafana_trait::GrafanaApi;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Response shape of `GET /api/health`
#[derive(Debug, Deserialize)]
struct HealthResponse {
    database: String,
}

/// Grafana API client
#[derive(Debug)]
pub struct GrafanaClient {
    client: Client,
    base_url: String,
}

impl GrafanaClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Grafana base URL (e.g., "http://localhost:3000")
    pub fn new(base_url: String) -> Result<Self, GrafanaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(GrafanaError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GrafanaApi for GrafanaClient {
    async fn check_health(&self) -> Result<(), GrafanaError> {
        let url = format!("{}/api/health", self.base_url);
        debug!("Probing Grafana health endpoint");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::NotReady(format!("{status} - {body}")));
        }

        let health: HealthResponse = response.json().await?;
        if health.database != "ok" {
            return Err(GrafanaError::NotReady(format!(
                "database status is {:?}",
                health.database
            )));
        }

        debug!("Grafana is healthy");
        Ok(())
    }

    async fn datasource_count(&self, user: &str, password: &str) -> Result<usize, GrafanaError> {
        let url = format!("{}/api/datasources", self.base_url);
        debug!("Querying Grafana datasources");

        let response = self
            .client
            .get(&url)
            .basic_auth(user, Some(password))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::Authentication(format!("{status} - {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::Api(format!(
                "Failed to list datasources: {status} - {body}"
            )));
        }

        let datasources: Vec<serde_json::Value> = response.json().await?;
        Ok(datasources.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = GrafanaClient::new("http://localhost:3000/".to_string()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }
}
