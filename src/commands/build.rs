//! Standalone build command: run the build phase without creating a release.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::StagecraftConfig;
use crate::domain::PlanOptions;
use crate::engine::{DeployEffectors, EffectorContext};
use crate::infrastructure::commander::LocalCommander;
use crate::infrastructure::git;
use crate::planner;
use crate::providers::ProviderRegistry;
use crate::ui;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    services: Vec<String>,
    version: Option<String>,
    registry: Arc<ProviderRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    ui::print_header(&format!("Build {} ({})", config.name, env));

    let version = match version {
        Some(v) => v,
        None => git::get_short_sha().unwrap_or_else(|e| {
            warn!("Could not determine git SHA: {}", e);
            "dev".to_string()
        }),
    };

    let plan = planner::plan_deploy(
        &config,
        &env,
        &PlanOptions {
            services,
            version: Some(version.clone()),
            release_id: None,
            build_only: true,
        },
    )?;

    let effectors = DeployEffectors::new(EffectorContext {
        config,
        env_name: env,
        registry,
        commander: Arc::new(LocalCommander),
        project_root: std::env::current_dir().context("Failed to resolve working directory")?,
    });

    effectors.build_services(&cancel, &plan).await?;

    ui::print_success(&format!("Built {} service(s) at {}", plan.services.len(), version));
    Ok(())
}
