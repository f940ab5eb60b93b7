//! Operator config normalization
//!
//! `normalize()` is the strict parsing boundary: it turns the loosely-typed
//! key/value config surface into a [`DesiredState`] or rejects it with a
//! [`ValidationError`]. It is a pure function with no side effects; the
//! reconcilers downstream never look at raw config again.

use crate::state::{DASHBOARD_SLOTS, DesiredState};
use semver::Version;
use std::collections::BTreeMap;
use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Raw operator config as read from the config file.
///
/// Values are YAML scalars; anything the operator can type. A `BTreeMap`
/// keeps iteration (and therefore error reporting) deterministic.
pub type RawConfig = BTreeMap<String, serde_yaml::Value>;

/// Bad operator input. Never retried; the previous good state keeps running.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Port outside 1..=65535 or not an integer
    #[error("http_port must be an integer in 1..=65535, got {0:?}")]
    InvalidPort(String),

    /// URL field failed to parse
    #[error("{field} is not a well-formed URL: {source}")]
    InvalidUrl {
        /// Offending config key
        field: &'static str,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// Version string does not match semver
    #[error("grafana_version is not a semantic version: {0}")]
    InvalidVersion(#[from] semver::Error),

    /// Dashboard key with a slot index outside 0..=9
    #[error("unknown dashboard slot key: {0} (slots are dashboard0..dashboard9)")]
    UnknownSlot(String),

    /// Config key outside the known surface
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Known key holding a value of the wrong shape
    #[error("config key {key} has an invalid value: {reason}")]
    InvalidValue {
        /// Offending config key
        key: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Port Grafana serves on when the operator does not set one.
pub const DEFAULT_HTTP_PORT: u16 = 3000;
const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_VERSION: &str = "11.4.0";
const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Validate and normalize raw operator config into a [`DesiredState`].
///
/// `bind_address` is the unit's own address, used to derive `external_url`
/// when the operator did not set one. The returned state carries the
/// operator's `admin_password` verbatim (possibly empty); the secret store
/// replaces it with the authoritative credential before apply.
///
/// Datasources are not part of operator config; the returned state has an
/// empty datasource list for the datasource reconciler to fill in.
pub fn normalize(
    raw: &RawConfig,
    bind_address: Option<IpAddr>,
) -> Result<DesiredState, ValidationError> {
    let mut http_port = DEFAULT_HTTP_PORT;
    let mut external_url: Option<String> = None;
    let mut admin_user = DEFAULT_ADMIN_USER.to_string();
    let mut admin_password = String::new();
    let mut grafana_version = DEFAULT_VERSION.to_string();
    let mut log_level = DEFAULT_LOG_LEVEL.to_string();
    let mut enable_anonymous = false;
    let mut allow_embedding = false;
    let mut dashboards: [Option<String>; DASHBOARD_SLOTS] = Default::default();

    for (key, value) in raw {
        match key.as_str() {
            "http_port" => http_port = parse_port(value)?,
            "external_url" => {
                let s = string_value(value, "external_url")?;
                if !s.trim().is_empty() {
                    external_url = Some(s);
                }
            }
            "admin_user" => {
                let s = string_value(value, "admin_user")?;
                if !s.trim().is_empty() {
                    admin_user = s;
                }
            }
            "admin_password" => admin_password = string_value(value, "admin_password")?,
            "grafana_version" => grafana_version = string_value(value, "grafana_version")?,
            "log_level" => {
                let s = string_value(value, "log_level")?;
                if !LOG_LEVELS.contains(&s.as_str()) {
                    return Err(ValidationError::InvalidValue {
                        key: "log_level",
                        reason: format!("expected one of {LOG_LEVELS:?}, got {s:?}"),
                    });
                }
                log_level = s;
            }
            "enable_anonymous" => enable_anonymous = bool_value(value, "enable_anonymous")?,
            "allow_embedding" => allow_embedding = bool_value(value, "allow_embedding")?,
            other if other.starts_with("dashboard") => {
                let slot = dashboard_slot(other)?;
                let s = string_value(value, "dashboardN")?;
                dashboards[slot] = if s.trim().is_empty() { None } else { Some(s) };
            }
            other => return Err(ValidationError::UnknownKey(other.to_string())),
        }
    }

    let grafana_version = Version::parse(&grafana_version)?;

    let external_url = match external_url {
        Some(s) => Url::parse(&s).map_err(|source| ValidationError::InvalidUrl {
            field: "external_url",
            source,
        })?,
        None => derive_external_url(bind_address, http_port)?,
    };

    Ok(DesiredState {
        http_port,
        external_url,
        admin_user,
        admin_password,
        grafana_version,
        log_level,
        enable_anonymous,
        allow_embedding,
        datasources: Vec::new(),
        dashboards,
    })
}

/// Map a `dashboardN` key to its slot index, rejecting anything outside 0..=9.
fn dashboard_slot(key: &str) -> Result<usize, ValidationError> {
    let suffix = &key["dashboard".len()..];
    match suffix.parse::<usize>() {
        Ok(slot) if slot < DASHBOARD_SLOTS && suffix.len() == 1 => Ok(slot),
        _ => Err(ValidationError::UnknownSlot(key.to_string())),
    }
}

fn derive_external_url(
    bind_address: Option<IpAddr>,
    http_port: u16,
) -> Result<Url, ValidationError> {
    let host = bind_address.map_or_else(|| "localhost".to_string(), |ip| ip.to_string());
    Url::parse(&format!("http://{host}:{http_port}")).map_err(|source| {
        ValidationError::InvalidUrl {
            field: "external_url",
            source,
        }
    })
}

fn parse_port(value: &serde_yaml::Value) -> Result<u16, ValidationError> {
    let rejected = || ValidationError::InvalidPort(format!("{value:?}"));
    let port = match value {
        serde_yaml::Value::Number(n) => n.as_u64().ok_or_else(rejected)?,
        serde_yaml::Value::String(s) => s.parse::<u64>().map_err(|_| rejected())?,
        _ => return Err(rejected()),
    };
    if port == 0 || port > u64::from(u16::MAX) {
        return Err(rejected());
    }
    Ok(port as u16)
}

fn string_value(value: &serde_yaml::Value, key: &'static str) -> Result<String, ValidationError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Null => Ok(String::new()),
        // YAML happily parses bare numbers; accept them for string-ish keys
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        _ => Err(ValidationError::InvalidValue {
            key,
            reason: format!("expected a string, got {value:?}"),
        }),
    }
}

fn bool_value(value: &serde_yaml::Value, key: &'static str) -> Result<bool, ValidationError> {
    match value {
        serde_yaml::Value::Bool(b) => Ok(*b),
        serde_yaml::Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ValidationError::InvalidValue {
                key,
                reason: format!("expected a boolean, got {s:?}"),
            }),
        },
        _ => Err(ValidationError::InvalidValue {
            key,
            reason: format!("expected a boolean, got {value:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, serde_yaml::Value)]) -> RawConfig {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_normalize_defaults() {
        let state = normalize(&RawConfig::new(), None).unwrap();
        assert_eq!(state.http_port, 3000);
        assert_eq!(state.admin_user, "admin");
        assert_eq!(state.external_url.as_str(), "http://localhost:3000/");
        assert_eq!(state.grafana_version.to_string(), "11.4.0");
        assert!(state.dashboards.iter().all(Option::is_none));
    }

    #[test]
    fn test_normalize_derives_external_url_from_bind_address() {
        let cfg = raw(&[("http_port", serde_yaml::Value::Number(3080.into()))]);
        let state = normalize(&cfg, Some("10.1.2.3".parse().unwrap())).unwrap();
        assert_eq!(state.external_url.as_str(), "http://10.1.2.3:3080/");
    }

    #[test]
    fn test_normalize_explicit_external_url_wins() {
        let cfg = raw(&[(
            "external_url",
            serde_yaml::Value::String("https://grafana.example.com".to_string()),
        )]);
        let state = normalize(&cfg, Some("10.1.2.3".parse().unwrap())).unwrap();
        assert_eq!(state.external_url.as_str(), "https://grafana.example.com/");
    }

    #[test]
    fn test_normalize_rejects_port_zero_and_out_of_range() {
        let cfg = raw(&[("http_port", serde_yaml::Value::Number(0.into()))]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::InvalidPort(_))
        ));

        let cfg = raw(&[("http_port", serde_yaml::Value::Number(70000.into()))]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_malformed_url() {
        let cfg = raw(&[(
            "external_url",
            serde_yaml::Value::String("not a url".to_string()),
        )]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_bad_semver() {
        let cfg = raw(&[(
            "grafana_version",
            serde_yaml::Value::String("eleven".to_string()),
        )]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_slot_out_of_range() {
        let cfg = raw(&[(
            "dashboard10",
            serde_yaml::Value::String("{}".to_string()),
        )]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::UnknownSlot(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_unknown_key() {
        let cfg = raw(&[("https_port", serde_yaml::Value::Number(443.into()))]);
        assert!(matches!(
            normalize(&cfg, None),
            Err(ValidationError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_normalize_fills_slots_and_treats_empty_as_removal() {
        let cfg = raw(&[
            (
                "dashboard0",
                serde_yaml::Value::String("{\"title\":\"CPU\"}".to_string()),
            ),
            ("dashboard3", serde_yaml::Value::String(String::new())),
        ]);
        let state = normalize(&cfg, None).unwrap();
        assert_eq!(state.dashboards[0].as_deref(), Some("{\"title\":\"CPU\"}"));
        assert!(state.dashboards[3].is_none());
    }

    #[test]
    fn test_normalize_accepts_port_as_string() {
        // Operators frequently quote numbers in YAML
        let cfg = raw(&[("http_port", serde_yaml::Value::String("3100".to_string()))]);
        assert_eq!(normalize(&cfg, None).unwrap().http_port, 3100);
    }
}
