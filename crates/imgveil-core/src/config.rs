//! Configuration resolution for imgveil.
//!
//! Resolution order:
//! 1. Built-in defaults
//! 2. JSON config file (optional, passed with `--config`)
//! 3. Environment variables (`IMGVEIL_*`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Plaintext bytes per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Delivery protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Plaintext bytes per chunk (the last chunk may be shorter).
    pub chunk_size: usize,
    /// Seconds a session stays usable after creation.
    pub session_ttl_secs: u64,
    /// Upper bound on live sessions; the oldest is evicted beyond it.
    pub max_sessions: usize,
    /// Derived ciphers memoised per session (one per client public key).
    pub max_cached_keys: usize,
    /// Seconds between background sweeps of expired sessions.
    pub sweep_interval_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            session_ttl_secs: 15 * 60,
            max_sessions: 10_000,
            max_cached_keys: 4,
            sweep_interval_secs: 60,
        }
    }
}

impl DeliveryConfig {
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Reject values the protocol cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if self.max_sessions == 0 {
            return Err(Error::Config("max_sessions must be greater than zero".into()));
        }
        if self.max_cached_keys == 0 {
            return Err(Error::Config(
                "max_cached_keys must be greater than zero".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration: defaults, then the optional file, then the environment.
pub fn load_config(path: Option<&Path>) -> Result<DeliveryConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => DeliveryConfig::default(),
    };
    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<DeliveryConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `IMGVEIL_*` overrides read through `lookup`. Unparseable values are ignored.
fn apply_overrides(config: &mut DeliveryConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(n) = lookup("IMGVEIL_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
        config.chunk_size = n;
    }
    if let Some(n) = lookup("IMGVEIL_SESSION_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.session_ttl_secs = n;
    }
    if let Some(n) = lookup("IMGVEIL_MAX_SESSIONS").and_then(|v| v.parse().ok()) {
        config.max_sessions = n;
    }
    if let Some(n) = lookup("IMGVEIL_MAX_CACHED_KEYS").and_then(|v| v.parse().ok()) {
        config.max_cached_keys = n;
    }
    if let Some(n) = lookup("IMGVEIL_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.sweep_interval_secs = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_chunk_size_is_32_kib() {
        assert_eq!(DeliveryConfig::default().chunk_size, 32768);
    }

    #[test]
    fn default_config_is_valid() {
        DeliveryConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = DeliveryConfig {
            chunk_size: 0,
            ..DeliveryConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size": 1024, "max_sessions": 5}}"#).unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.max_sessions, 5);
        assert_eq!(config.session_ttl_secs, DeliveryConfig::default().session_ttl_secs);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_config_file(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("IMGVEIL_CHUNK_SIZE", "4096"),
            ("IMGVEIL_SESSION_TTL_SECS", "30"),
            ("IMGVEIL_MAX_SESSIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = DeliveryConfig::default();
        apply_overrides(&mut config, |name| env.get(name).map(ToString::to_string));

        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.session_ttl(), Duration::from_secs(30));
        assert_eq!(config.max_sessions, DeliveryConfig::default().max_sessions);
    }
}
