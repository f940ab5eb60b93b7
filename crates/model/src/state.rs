//! Desired-state types
//!
//! `DesiredState` is the single source of truth handed to the apply engine.
//! Its fingerprint (sha256 over the canonical JSON encoding) is persisted as
//! `LastApplied` so an unchanged state can be skipped without touching the
//! service.

use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use url::Url;
use uuid::Uuid;

/// Number of dashboard configuration slots (`dashboard0`..`dashboard9`).
pub const DASHBOARD_SLOTS: usize = 10;

/// Fully validated desired state for one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesiredState {
    /// HTTP port Grafana listens on
    pub http_port: u16,

    /// Externally reachable root URL
    pub external_url: Url,

    /// Admin username
    pub admin_user: String,

    /// Authoritative admin password for this pass (resolved by the secret
    /// store before the state reaches the apply engine)
    pub admin_password: String,

    /// Grafana release to run
    pub grafana_version: Version,

    /// Grafana log level (`debug`, `info`, `warn`, `error`)
    pub log_level: String,

    /// Allow anonymous (Viewer) access
    pub enable_anonymous: bool,

    /// Allow embedding in iframes
    pub allow_embedding: bool,

    /// Datasources derived from relation data, sorted by name
    pub datasources: Vec<DatasourceSpec>,

    /// Raw dashboard JSON per slot; `None` means the slot is empty
    pub dashboards: [Option<String>; DASHBOARD_SLOTS],
}

impl DesiredState {
    /// Hex sha256 fingerprint of the canonical JSON encoding.
    ///
    /// Struct field order is fixed, so identical states always produce
    /// identical fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        // Serializing a fully-owned struct cannot fail
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        let mut out = String::with_capacity(64);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

/// One provisioned datasource definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasourceSpec {
    /// Deterministic name, unique across relations (see [`SourceEntry::datasource_name`])
    pub name: String,

    /// Datasource type (e.g., `prometheus`)
    #[serde(rename = "type")]
    pub source_type: String,

    /// URL the datasource is reachable at
    pub url: Url,

    /// Exactly one spec per pass carries `true`
    pub is_default: bool,

    /// Access mode (`proxy` or `direct`)
    pub access: String,
}

/// Per-unit relation data published by a metrics-source collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    /// Unit name of the publishing collaborator (e.g., `prometheus/0`)
    pub unit_name: String,

    /// Model the collaborator lives in
    pub model_name: String,

    /// UUID of that model
    pub model_uuid: Uuid,

    /// Scrape/query URL of the source
    pub url: Url,

    /// Source type; defaults to `prometheus`
    #[serde(default = "default_source_type")]
    pub source_type: String,
}

fn default_source_type() -> String {
    "prometheus".to_string()
}

impl SourceEntry {
    /// Deterministic datasource name: `juju_<model>_<uuid>_<type>_<unit>`.
    ///
    /// The same entry always produces the same name, so file writes are
    /// idempotent and removal-by-name is safe when the relation goes away.
    /// Unit names contain `/`, which is mapped to `_`.
    #[must_use]
    pub fn datasource_name(&self) -> String {
        format!(
            "juju_{}_{}_{}_{}",
            self.model_name,
            self.model_uuid,
            self.source_type,
            self.unit_name.replace('/', "_"),
        )
    }
}

/// Where the admin password came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecretOrigin {
    /// Generated by this group (first initializer wins)
    Generated,
    /// Explicitly set by the operator; always takes precedence
    OperatorOverride,
    /// Read back from peer state
    Peer,
}

/// The administrator credential, owned by the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSecret {
    /// Admin username
    pub username: String,
    /// Admin password; never logged in cleartext
    pub password: String,
    /// Provenance of the password
    pub origin: SecretOrigin,
}

/// Snapshot of the last successfully applied state, persisted on the
/// instance. Passed into and returned from the apply engine explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastApplied {
    /// Fingerprint of the applied [`DesiredState`]
    pub fingerprint: String,
    /// When the apply completed
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

impl LastApplied {
    /// Snapshot for a state applied now.
    #[must_use]
    pub fn now(fingerprint: String) -> Self {
        Self {
            fingerprint,
            applied_at: chrono::Utc::now(),
        }
    }
}
