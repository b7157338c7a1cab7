//! Dev-mode configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers::{ShutdownPolicy, ShutdownSignal};

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> String {
    "10s".to_string()
}

/// Settings for the local development topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Run the reverse proxy (enabled by default).
    #[serde(default = "default_true")]
    pub proxy: bool,

    /// Run the frontend dev server (enabled by default).
    #[serde(default = "default_true")]
    pub frontend: bool,

    /// Signal sent to dev processes on shutdown.
    #[serde(default)]
    pub shutdown_signal: ShutdownSignal,

    /// How long to wait after the shutdown signal before SIGKILL,
    /// in humantime notation (e.g. "10s", "1m").
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            proxy: true,
            frontend: true,
            shutdown_signal: ShutdownSignal::default(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl DevConfig {
    /// Parsed shutdown policy for dev process supervision.
    pub fn shutdown_policy(&self) -> Result<ShutdownPolicy, ConfigError> {
        let timeout: Duration = humantime::parse_duration(&self.shutdown_timeout)
            .map_err(|_| ConfigError::InvalidValue {
                field: "dev.shutdown_timeout".to_string(),
                value: self.shutdown_timeout.clone(),
            })?;
        Ok(ShutdownPolicy {
            signal: self.shutdown_signal,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dev = DevConfig::default();
        assert!(dev.proxy);
        assert!(dev.frontend);
        let policy = dev.shutdown_policy().unwrap();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.signal, ShutdownSignal::Sigint);
    }

    #[test]
    fn test_invalid_timeout_is_a_config_error() {
        let dev = DevConfig {
            shutdown_timeout: "soon".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            dev.shutdown_policy(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
