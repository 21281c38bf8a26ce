use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::{IdType, Status};

/// Process-level settings, read from `WALKBOOK_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5434,
            data_dir: PathBuf::from("./data"),
            password: "walkbook".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            bind: lookup("WALKBOOK_BIND").unwrap_or(d.bind),
            port: parsed(&lookup, "WALKBOOK_PORT").unwrap_or(d.port),
            data_dir: lookup("WALKBOOK_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            password: lookup("WALKBOOK_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "WALKBOOK_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            compact_threshold: parsed(&lookup, "WALKBOOK_COMPACT_THRESHOLD").unwrap_or(d.compact_threshold),
            metrics_port: parsed(&lookup, "WALKBOOK_METRICS_PORT"),
            tls_cert: lookup("WALKBOOK_TLS_CERT"),
            tls_key: lookup("WALKBOOK_TLS_KEY"),
            request_timeout: parsed(&lookup, "WALKBOOK_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.request_timeout),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("walkbook.wal")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Scheduling rules handed to the validator and availability checker.
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    /// Status given to appointments created without one.
    pub default_status: Status,
    pub min_duration_hours: f64,
    pub max_duration_hours: f64,
    pub max_notes_len: usize,
    pub max_admin_notes_len: usize,
    /// Statuses whose appointments occupy their window.
    pub blocking_statuses: Vec<Status>,
    /// Re-run the availability checker when an inactive appointment moves
    /// back into a blocking status.
    pub recheck_on_reopen: bool,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            default_status: Status::Scheduled,
            min_duration_hours: 0.5,
            max_duration_hours: 8.0,
            max_notes_len: 250,
            max_admin_notes_len: 500,
            blocking_statuses: vec![Status::Scheduled, Status::InProgress],
            recheck_on_reopen: true,
        }
    }
}

impl SchedulingPolicy {
    pub fn is_blocking(&self, status: Status) -> bool {
        self.blocking_statuses.contains(&status)
    }
}

/// Values filled in for optional registry fields.
#[derive(Debug, Clone)]
pub struct RegistryDefaults {
    pub walker_rating: u8,
    pub walker_id_type: IdType,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            walker_rating: 1,
            walker_id_type: IdType::Cc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServerConfig::from_lookup(|_| None);
        assert_eq!(cfg.port, 5434);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/walkbook.wal"));
    }

    #[test]
    fn env_overrides() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("WALKBOOK_PORT", "7000"),
            ("WALKBOOK_DATA_DIR", "/tmp/wb"),
            ("WALKBOOK_METRICS_PORT", "9100"),
            ("WALKBOOK_REQUEST_TIMEOUT_MS", "250"),
        ]));
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/wb"));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[("WALKBOOK_PORT", "not-a-port")]));
        assert_eq!(cfg.port, 5434);
    }

    #[test]
    fn policy_defaults() {
        let p = SchedulingPolicy::default();
        assert_eq!(p.default_status, Status::Scheduled);
        assert!(p.is_blocking(Status::Scheduled));
        assert!(p.is_blocking(Status::InProgress));
        assert!(!p.is_blocking(Status::Completed));
        assert!(!p.is_blocking(Status::Cancelled));
    }
}
