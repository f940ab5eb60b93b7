//! Grafana HTTP API client
//!
//! Thin client for the two endpoints the operator consumes:
//!
//! - `GET /api/health` — readiness contract; succeeds only when Grafana is
//!   ready to serve provisioned content (database reachable)
//! - `GET /api/datasources` — authenticated listing used for status
//!   reporting
//!
//! The [`GrafanaApi`] trait is the seam the apply engine depends on; enable
//! the `test-util` feature to get [`MockGrafanaClient`] for unit tests.

mod client;
mod error;
mod grafana_trait;

#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use client::GrafanaClient;
pub use error::GrafanaError;
pub use grafana_trait::GrafanaApi;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockGrafanaClient;
