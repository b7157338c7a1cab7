//! Full release pipeline: build → push → migrate_pre → rollout →
//! migrate_post → finalize.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::StagecraftConfig;
use crate::domain::PlanOptions;
use crate::engine::{DeployEffectors, EffectorContext, PhaseRunner};
use crate::infrastructure::commander::LocalCommander;
use crate::infrastructure::git;
use crate::planner;
use crate::providers::ProviderRegistry;
use crate::state::ReleaseManager;
use crate::ui;

use super::releases;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    version: Option<String>,
    commit: Option<String>,
    services: Vec<String>,
    registry: Arc<ProviderRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    ui::print_header(&format!("Deploy {} → {}", config.name, env));

    // Validate env, services, and provider selections before any release
    // record exists.
    planner::plan_deploy(
        &config,
        &env,
        &PlanOptions {
            services: services.clone(),
            ..Default::default()
        },
    )?;

    let commit_sha = match commit {
        Some(sha) => sha,
        None => git::get_full_sha().unwrap_or_else(|e| {
            warn!("Could not determine git SHA: {}", e);
            String::new()
        }),
    };

    let manager = ReleaseManager::new_default()?;
    let release = manager.create_release(&env, version.as_deref().unwrap_or(""), &commit_sha)?;
    info!("Created release {} (version {})", release.id, release.version);

    let plan = planner::plan_deploy(
        &config,
        &env,
        &PlanOptions {
            services,
            version: Some(release.version.clone()),
            release_id: Some(release.id.clone()),
            build_only: false,
        },
    )?;

    let effectors = DeployEffectors::new(EffectorContext {
        config,
        env_name: env,
        registry,
        commander: Arc::new(LocalCommander),
        project_root: std::env::current_dir().context("Failed to resolve working directory")?,
    });

    let result = PhaseRunner::new(&manager)
        .run(&release.id, &plan, &effectors, &cancel)
        .await;

    // The record is truthful either way; show it.
    let final_state = manager.get_release(&release.id)?;
    releases::print_release(&final_state);

    match result {
        Ok(()) => {
            ui::print_success(&format!("Release {} deployed", release.id));
            Ok(())
        }
        Err(e) => {
            ui::print_error(&format!("Deploy failed: {:#}", e));
            Err(e)
        }
    }
}
