//! Rollback command.
//!
//! Creates a new release whose version and commit are copied from the
//! target, then runs the rollback effector table through the shared kernel.
//! The target release itself is never mutated.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::StagecraftConfig;
use crate::domain::PlanOptions;
use crate::engine::{EffectorContext, PhaseRunner, RollbackEffectors};
use crate::infrastructure::commander::LocalCommander;
use crate::planner;
use crate::providers::ProviderRegistry;
use crate::state::ReleaseManager;
use crate::ui;

use super::releases;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    to: Option<String>,
    registry: Arc<ProviderRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    ui::print_header(&format!("Rollback {} ({})", config.name, env));

    let manager = ReleaseManager::new_default()?;

    let target = match to {
        Some(id) => manager.get_release(&id)?,
        None => {
            let current = manager.get_current_release(&env)?;
            let previous = current
                .previous_id
                .clone()
                .with_context(|| format!("Release {} has no predecessor to roll back to", current.id))?;
            manager.get_release(&previous)?
        }
    };

    if target.env != env {
        bail!(
            "Release {} belongs to environment {}, not {}",
            target.id,
            target.env,
            env
        );
    }

    info!(
        "Rolling {} back to {} (version {}, commit {})",
        env, target.id, target.version, target.commit_sha
    );

    let plan = planner::plan_deploy(
        &config,
        &env,
        &PlanOptions {
            version: Some(target.version.clone()),
            ..Default::default()
        },
    )?;

    // A fresh release record carries the rollback; history is append-only.
    let release = manager.create_release(&env, &target.version, &target.commit_sha)?;
    info!("Created rollback release {}", release.id);

    let effectors = RollbackEffectors::new(EffectorContext {
        config,
        env_name: env,
        registry,
        commander: Arc::new(LocalCommander),
        project_root: std::env::current_dir().context("Failed to resolve working directory")?,
    });

    let result = PhaseRunner::new(&manager)
        .run(&release.id, &plan, &effectors, &cancel)
        .await;

    let final_state = manager.get_release(&release.id)?;
    releases::print_release(&final_state);

    match result {
        Ok(()) => {
            ui::print_success(&format!(
                "Rolled back to {} as release {}",
                target.version, release.id
            ));
            Ok(())
        }
        Err(e) => {
            ui::print_error(&format!("Rollback failed: {:#}", e));
            Err(e)
        }
    }
}
