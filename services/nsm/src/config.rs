//! Configuration handling for nsm clients.
//!
//! Settings are read from a YAML file and then overridden by environment
//! variables. A missing or unreadable file leaves the defaults in place.

use anyhow::Result;
use nsm_heal::HealConfig;
use nsm_vppagent::CommitSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A duration override could not be parsed
    #[error("invalid duration {value:?} in {var}: {source}")]
    InvalidDuration {
        /// Variable name
        var: String,
        /// Rejected value
        value: String,
        /// Parse failure
        #[source]
        source: humantime::DurationError,
    },

    /// A boolean override could not be parsed
    #[error("invalid boolean {value:?} in {var}")]
    InvalidBool {
        /// Variable name
        var: String,
        /// Rejected value
        value: String,
    },
}

/// Heal client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealSettings {
    /// Repair budget for requests without a deadline (milliseconds)
    pub heal_timeout_ms: u64,
    /// Pause after a failed monitor receive (milliseconds)
    pub recv_retry_interval_ms: u64,
    /// Close tracked connections on shutdown
    pub close_on_shutdown: bool,
}

impl Default for HealSettings {
    fn default() -> Self {
        let defaults = HealConfig::default();
        Self {
            heal_timeout_ms: defaults.default_heal_timeout.as_millis() as u64,
            recv_retry_interval_ms: defaults.recv_retry_interval.as_millis() as u64,
            close_on_shutdown: defaults.close_on_shutdown,
        }
    }
}

impl From<&HealSettings> for HealConfig {
    fn from(settings: &HealSettings) -> Self {
        Self {
            default_heal_timeout: Duration::from_millis(settings.heal_timeout_ms),
            recv_retry_interval: Duration::from_millis(settings.recv_retry_interval_ms),
            close_on_shutdown: settings.close_on_shutdown,
        }
    }
}

/// SDK configuration (matches the YAML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Heal client
    pub heal: HealSettings,
    /// vpp-agent commit
    pub vppagent: CommitSettings,
}

impl SdkConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<SdkConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {:?}, using defaults: {}",
                        config_path.as_ref(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", config_path.as_ref());
                Self::default()
            }
        };

        config.apply_environment_overrides()?;

        info!(
            "Final configuration: heal_timeout={}ms, vppagent={}, reset_on_init={}",
            config.heal.heal_timeout_ms, config.vppagent.endpoint, config.vppagent.reset_on_init
        );

        Ok(config)
    }

    /// Heal client configuration
    pub fn heal_config(&self) -> HealConfig {
        HealConfig::from(&self.heal)
    }

    /// Apply environment variable overrides
    pub fn apply_environment_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = duration_var(&lookup, "NSM_HEAL_TIMEOUT")? {
            self.heal.heal_timeout_ms = timeout.as_millis() as u64;
            info!("Heal timeout overridden by environment: {:?}", timeout);
        }

        if let Some(interval) = duration_var(&lookup, "NSM_HEAL_RECV_RETRY")? {
            self.heal.recv_retry_interval_ms = interval.as_millis() as u64;
            info!("Receive retry interval overridden by environment: {:?}", interval);
        }

        if let Some(close) = bool_var(&lookup, "NSM_HEAL_CLOSE_ON_SHUTDOWN")? {
            self.heal.close_on_shutdown = close;
            info!("Close on shutdown overridden by environment: {}", close);
        }

        if let Some(endpoint) = lookup("VPPAGENT_ENDPOINT") {
            self.vppagent.endpoint = endpoint;
            info!("vpp-agent endpoint overridden by environment: {}", self.vppagent.endpoint);
        }

        if let Some(reset) = bool_var(&lookup, "VPPAGENT_RESET")? {
            self.vppagent.reset_on_init = reset;
            info!("vpp-agent reset overridden by environment: {}", reset);
        }

        if let Some(timeout) = duration_var(&lookup, "VPPAGENT_CONNECT_TIMEOUT")? {
            self.vppagent.connect_timeout_secs = timeout.as_secs();
            info!("vpp-agent connect timeout overridden by environment: {:?}", timeout);
        }

        Ok(())
    }
}

fn duration_var<F>(lookup: &F, var: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    humantime::parse_duration(value.trim())
        .map(Some)
        .map_err(|source| ConfigError::InvalidDuration {
            var: var.to_string(),
            value,
            source,
        })
}

fn bool_var<F>(lookup: &F, var: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.heal.heal_timeout_ms, 15_000);
        assert_eq!(config.heal.recv_retry_interval_ms, 100);
        assert!(config.heal.close_on_shutdown);
        assert_eq!(config.vppagent.endpoint, "localhost:9111");
        assert!(!config.vppagent.reset_on_init);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
heal:
  heal_timeout_ms: 3000
  close_on_shutdown: false
vppagent:
  endpoint: "10.0.0.2:9111"
  reset_on_init: true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = SdkConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.heal.heal_timeout_ms, 3000);
        assert_eq!(config.heal.recv_retry_interval_ms, 100);
        assert!(!config.heal.close_on_shutdown);
        assert_eq!(config.vppagent.endpoint, "10.0.0.2:9111");
        assert!(config.vppagent.reset_on_init);
        assert_eq!(config.vppagent.connect_timeout_secs, 120);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.heal, HealSettings::default());
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"heal: [not, a, map]").unwrap();

        let config = SdkConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.heal, HealSettings::default());
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = SdkConfig::default();
        config
            .apply_overrides(env(&[
                ("NSM_HEAL_TIMEOUT", "1m 30s"),
                ("NSM_HEAL_RECV_RETRY", "250ms"),
                ("NSM_HEAL_CLOSE_ON_SHUTDOWN", "false"),
                ("VPPAGENT_ENDPOINT", "vpp:9112"),
                ("VPPAGENT_RESET", "1"),
                ("VPPAGENT_CONNECT_TIMEOUT", "5s"),
            ]))
            .unwrap();

        assert_eq!(config.heal.heal_timeout_ms, 90_000);
        assert_eq!(config.heal.recv_retry_interval_ms, 250);
        assert!(!config.heal.close_on_shutdown);
        assert_eq!(config.vppagent.endpoint, "vpp:9112");
        assert!(config.vppagent.reset_on_init);
        assert_eq!(config.vppagent.connect_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = SdkConfig::default();
        let err = config
            .apply_overrides(env(&[("NSM_HEAL_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));

        let err = config
            .apply_overrides(env(&[("VPPAGENT_RESET", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
    }

    #[test]
    fn test_heal_config_conversion() {
        let settings = HealSettings {
            heal_timeout_ms: 2500,
            recv_retry_interval_ms: 20,
            close_on_shutdown: false,
        };
        let config = HealConfig::from(&settings);
        assert_eq!(config.default_heal_timeout, Duration::from_millis(2500));
        assert_eq!(config.recv_retry_interval, Duration::from_millis(20));
        assert!(!config.close_on_shutdown);
    }
}
