//! Dry-run plan command.

use anyhow::Result;

use crate::config::StagecraftConfig;
use crate::domain::PlanOptions;
use crate::planner;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    services: Vec<String>,
    version: Option<String>,
    build_only: bool,
) -> Result<()> {
    let plan = planner::plan_deploy(
        &config,
        &env,
        &PlanOptions {
            services,
            version,
            release_id: None,
            build_only,
        },
    )?;

    print!("{}", plan.to_yaml());
    Ok(())
}
