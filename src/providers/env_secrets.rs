//! The `env` secrets provider.
//!
//! Resolves secret keys from the process environment, optionally behind a
//! prefix. An `overrides` map in the payload takes precedence over process
//! environment reads, which keeps lookups deterministic in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

use super::{Provider, ProviderPayload, SecretsProvider};

const ENV_ID: &str = "env";

/// Payload schema for the `env` secrets provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvSecretsConfig {
    /// Prefix prepended to every key before the environment lookup.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Override map consulted before the process environment.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct EnvSecrets;

impl Provider for EnvSecrets {
    fn id(&self) -> &'static str {
        ENV_ID
    }
}

#[async_trait]
impl SecretsProvider for EnvSecrets {
    async fn resolve(
        &self,
        _cancel: &CancellationToken,
        config: &ProviderPayload,
        key: &str,
    ) -> Result<String, ProviderError> {
        let parsed: EnvSecretsConfig = config.parse(ENV_ID)?;

        if let Some(value) = parsed.overrides.get(key) {
            return Ok(value.clone());
        }

        let variable = match &parsed.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        };

        std::env::var(&variable).map_err(|_| ProviderError::Failed {
            capability: "secrets".to_string(),
            id: ENV_ID.to_string(),
            message: format!("environment variable {} is not set", variable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(yaml: &str) -> ProviderPayload {
        ProviderPayload::new(serde_yaml::from_str(yaml).unwrap())
    }

    #[tokio::test]
    async fn test_overrides_take_precedence() {
        let secrets = EnvSecrets;
        let cancel = CancellationToken::new();
        let config = payload("overrides:\n  DB_PASSWORD: hunter2\n");

        let value = secrets
            .resolve(&cancel, &config, "DB_PASSWORD")
            .await
            .unwrap();
        assert_eq!(value, "hunter2");
    }

    #[tokio::test]
    async fn test_missing_key_names_the_variable() {
        let secrets = EnvSecrets;
        let cancel = CancellationToken::new();
        let config = payload("prefix: STAGECRAFT_TEST_SECRET_\n");

        let err = secrets
            .resolve(&cancel, &config, "NOT_SET_ANYWHERE")
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("STAGECRAFT_TEST_SECRET_NOT_SET_ANYWHERE"));
    }

    #[tokio::test]
    async fn test_reads_process_environment_with_prefix() {
        std::env::set_var("STAGECRAFT_TEST_SECRET_API_TOKEN", "tok-123");
        let secrets = EnvSecrets;
        let cancel = CancellationToken::new();
        let config = payload("prefix: STAGECRAFT_TEST_SECRET_\n");

        let value = secrets.resolve(&cancel, &config, "API_TOKEN").await.unwrap();
        std::env::remove_var("STAGECRAFT_TEST_SECRET_API_TOKEN");
        assert_eq!(value, "tok-123");
    }
}
