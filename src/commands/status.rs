//! Current release status per environment.

use anyhow::Result;
use colored::Colorize;

use crate::config::StagecraftConfig;
use crate::state::ReleaseManager;

use super::releases;

pub async fn execute(config: StagecraftConfig, env: String) -> Result<()> {
    let manager = ReleaseManager::new_default()?;

    println!(
        "{} {} {}",
        ">>".bold(),
        config.name.cyan().bold(),
        format!("(env: {})", env).dimmed()
    );

    let current = manager.get_current_release(&env)?;
    let history = manager.list_releases(&env);

    releases::print_release(&current);
    println!(
        "{} release(s) recorded for {}",
        history.len(),
        env.cyan()
    );

    Ok(())
}
