//! The `script` migration engine.
//!
//! Runs user-configured shell commands for the pre- and post-rollout
//! migration hooks. An unconfigured hook completes immediately.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::infrastructure::commander::{CommandSpec, Commander, LocalCommander};

use super::{MigrateOptions, MigrationEngine, MigrationHook, Provider};

const SCRIPT_ID: &str = "script";

/// Payload schema for the `script` engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptConfig {
    /// Command for the migrate_pre hook.
    #[serde(default)]
    pub pre: Option<String>,

    /// Command for the migrate_post hook.
    #[serde(default)]
    pub post: Option<String>,
}

#[derive(Debug)]
pub struct ScriptMigration;

impl Provider for ScriptMigration {
    fn id(&self) -> &'static str {
        SCRIPT_ID
    }
}

#[async_trait]
impl MigrationEngine for ScriptMigration {
    async fn migrate(
        &self,
        cancel: &CancellationToken,
        hook: MigrationHook,
        opts: MigrateOptions,
    ) -> Result<(), ProviderError> {
        let parsed: ScriptConfig = opts.config.parse(SCRIPT_ID)?;
        let command = match hook {
            MigrationHook::Pre => parsed.pre,
            MigrationHook::Post => parsed.post,
        };

        let Some(command) = command else {
            debug!("No {} migration command configured, skipping", hook.as_str());
            return Ok(());
        };

        info!("Running {} migrations: {}", hook.as_str(), command);

        let spec = CommandSpec::new("sh")
            .args(["-c", &command])
            .workdir(&opts.workdir)
            .env("STAGECRAFT_ENV", &opts.env_name)
            .env("STAGECRAFT_VERSION", &opts.version)
            .env("STAGECRAFT_MIGRATION_HOOK", hook.as_str());

        let output = LocalCommander.run(cancel, spec).await.map_err(|e| {
            ProviderError::Failed {
                capability: "migration-engine".to_string(),
                id: SCRIPT_ID.to_string(),
                message: e.to_string(),
            }
        })?;

        if !output.success() {
            return Err(ProviderError::Failed {
                capability: "migration-engine".to_string(),
                id: SCRIPT_ID.to_string(),
                message: format!(
                    "{} migration exited with status {}: {}",
                    hook.as_str(),
                    output.status,
                    output.stderr.trim()
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderPayload;

    fn opts(yaml: &str) -> MigrateOptions {
        MigrateOptions {
            config: ProviderPayload::new(serde_yaml::from_str(yaml).unwrap()),
            workdir: std::env::temp_dir(),
            env_name: "staging".to_string(),
            version: "v1.0.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_hook_is_a_noop() {
        let engine = ScriptMigration;
        let cancel = CancellationToken::new();
        engine
            .migrate(
                &cancel,
                MigrationHook::Pre,
                MigrateOptions {
                    config: ProviderPayload::empty(),
                    workdir: std::env::temp_dir(),
                    env_name: "staging".to_string(),
                    version: "v1".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pre_hook_runs_pre_command() {
        let engine = ScriptMigration;
        let cancel = CancellationToken::new();
        engine
            .migrate(&cancel, MigrationHook::Pre, opts("pre: 'true'\npost: 'exit 1'"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_migration_carries_provider_identity() {
        let engine = ScriptMigration;
        let cancel = CancellationToken::new();
        let err = engine
            .migrate(&cancel, MigrationHook::Post, opts("post: 'exit 4'"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Failed { ref capability, ref id, .. }
                if capability == "migration-engine" && id == "script"
        ));
    }
}
