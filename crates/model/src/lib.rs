//! Desired-state model for the Grafana operator.
//!
//! Raw operator config and relation payloads are loosely typed; this crate
//! parses them into strict types at the boundary so the reconcilers never
//! re-inspect raw payload shapes. Everything here is pure (no I/O).

pub mod config;
pub mod state;

pub use config::{RawConfig, ValidationError, normalize};
pub use state::{
    AdminSecret, DASHBOARD_SLOTS, DatasourceSpec, DesiredState, LastApplied, SecretOrigin,
    SourceEntry,
};
