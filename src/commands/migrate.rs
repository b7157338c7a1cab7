//! Run migration hooks directly, outside a release.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::cli::MigrateHookArg;
use crate::config::StagecraftConfig;
use crate::providers::{MigrateOptions, MigrationEngine, MigrationHook, ProviderRegistry};
use crate::ui;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    hook: MigrateHookArg,
    version: Option<String>,
    registry: Arc<ProviderRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let env_config = config
        .environments
        .get(&env)
        .with_context(|| format!("Unknown environment: {}", env))?;

    let Some(engine_id) = env_config.providers.migration.as_deref() else {
        bail!("No migration-engine provider selected for environment {}", env);
    };

    let engine = registry.migration.get(engine_id)?;
    let hooks: &[MigrationHook] = match hook {
        MigrateHookArg::Pre => &[MigrationHook::Pre],
        MigrateHookArg::Post => &[MigrationHook::Post],
        MigrateHookArg::Both => &[MigrationHook::Pre, MigrationHook::Post],
    };

    let opts = MigrateOptions {
        config: env_config.provider_payload(engine_id),
        workdir: std::env::current_dir().context("Failed to resolve working directory")?,
        env_name: env.clone(),
        version: version.unwrap_or_default(),
    };

    for hook in hooks {
        engine.migrate(&cancel, *hook, opts.clone()).await?;
        ui::print_success(&format!("{} migrations complete", hook.as_str()));
    }

    Ok(())
}
