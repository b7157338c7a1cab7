//! # Stagecraft configuration
//!
//! A single `stagecraft.yaml` at the project root declares the project name,
//! dev domain, services, and environments. Provider payloads inside it stay
//! opaque to the core; they are handed to providers for parsing.

mod dev;
mod environment;
mod service;

pub use dev::DevConfig;
pub use environment::{EnvironmentConfig, ProviderSelection};
pub use service::{ServiceConfig, ServiceRole};

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config filename in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "stagecraft.yaml";

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagecraftConfig {
    /// Project name.
    pub name: String,

    /// Base domain for dev hostnames; the frontend lives at `app.<domain>`,
    /// the backend at `api.<domain>`.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Declared services, keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    /// Declared environments, keyed by name.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Dev-mode settings.
    #[serde(default)]
    pub dev: DevConfig,
}

fn default_domain() -> String {
    "localdev.test".to_string()
}

impl StagecraftConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                message: format!("{}: {}", path.display(), e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `stagecraft.yaml` from the working directory.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField {
                field: "name".to_string(),
            });
        }
        if self.domain.is_empty() {
            return Err(ConfigError::MissingField {
                field: "domain".to_string(),
            });
        }
        for (name, env) in &self.environments {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "environments".to_string(),
                    value: "(empty name)".to_string(),
                });
            }
            for host in &env.hosts {
                if host.name.is_empty() || host.address.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("environments.{}.hosts", name),
                        value: format!("{}@{}", host.name, host.address),
                    });
                }
            }
        }
        Ok(())
    }

    /// Declared environment names, lexicographically sorted.
    pub fn known_environments(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Declared service names, lexicographically sorted.
    pub fn known_services(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// Dev hostname of the frontend.
    pub fn frontend_domain(&self) -> String {
        format!("app.{}", self.domain)
    }

    /// Dev hostname of the backend.
    pub fn backend_domain(&self) -> String {
        format!("api.{}", self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: shop
domain: localdev.test
services:
  api:
    role: backend
    workdir: ./api
  web:
    role: frontend
environments:
  staging:
    providers:
      backend: generic
      migration: script
    provider_config:
      generic:
        dev_command: npm run dev
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: StagecraftConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.name, "shop");
        assert_eq!(config.known_services(), vec!["api", "web"]);
        assert_eq!(config.known_environments(), vec!["staging"]);
        assert_eq!(config.frontend_domain(), "app.localdev.test");
        assert_eq!(config.backend_domain(), "api.localdev.test");

        let staging = &config.environments["staging"];
        assert_eq!(staging.providers.backend.as_deref(), Some("generic"));
        assert!(!staging.provider_payload("generic").is_empty());
        assert!(staging.provider_payload("script").is_empty());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let config: StagecraftConfig = serde_yaml::from_str("domain: localdev.test").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StagecraftConfig::load(Path::new("/nonexistent/stagecraft.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
