//! Release history commands.

use anyhow::Result;
use colored::Colorize;

use crate::domain::{PhaseStatus, Release};
use crate::state::ReleaseManager;

/// List releases for an environment, newest first.
pub async fn list(env: String) -> Result<()> {
    let manager = ReleaseManager::new_default()?;
    let releases = manager.list_releases(&env);

    if releases.is_empty() {
        println!("No releases for environment {}", env.cyan());
        return Ok(());
    }

    println!(
        "{:<26} {:<20} {:<12} {:<22} {}",
        "ID".bold(),
        "VERSION".bold(),
        "COMMIT".bold(),
        "CREATED".bold(),
        "STATUS".bold()
    );
    for release in &releases {
        let commit = if release.commit_sha.len() > 10 {
            &release.commit_sha[..10]
        } else {
            &release.commit_sha
        };
        println!(
            "{:<26} {:<20} {:<12} {:<22} {}",
            release.id,
            release.version,
            commit,
            release.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            summary(release)
        );
    }

    Ok(())
}

/// Show one release with its full phase trace.
pub async fn show(id: String) -> Result<()> {
    let manager = ReleaseManager::new_default()?;
    let release = manager.get_release(&id)?;
    print_release(&release);
    Ok(())
}

/// Render the release header and phase table. Shared with deploy, rollback,
/// and status output.
pub fn print_release(release: &Release) {
    println!();
    println!("{} {}", "Release".bold(), release.id.cyan().bold());
    println!("  env:      {}", release.env);
    println!("  version:  {}", release.version);
    println!("  commit:   {}", release.commit_sha);
    println!(
        "  created:  {}",
        release.created_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    if let Some(previous) = &release.previous_id {
        println!("  previous: {}", previous);
    }
    println!();

    for (phase, state) in &release.phases {
        let status = colored_status(state.status);
        let ended = state
            .ended_at
            .map(|t| t.format("%H:%M:%S%.3f UTC").to_string())
            .unwrap_or_default();
        println!("  {:<14} {:<12} {}", phase.key(), status, ended.dimmed());
    }
    println!();
}

fn colored_status(status: PhaseStatus) -> String {
    match status {
        PhaseStatus::Pending => status.as_str().dimmed().to_string(),
        PhaseStatus::Running => status.as_str().yellow().to_string(),
        PhaseStatus::Completed => status.as_str().green().to_string(),
        PhaseStatus::Failed => status.as_str().red().bold().to_string(),
        PhaseStatus::Skipped => status.as_str().yellow().dimmed().to_string(),
    }
}

/// One-word rollup across phases.
fn summary(release: &Release) -> String {
    let statuses: Vec<PhaseStatus> = release.phases.values().map(|s| s.status).collect();
    if statuses.iter().any(|s| *s == PhaseStatus::Failed) {
        "failed".red().to_string()
    } else if statuses.iter().any(|s| *s == PhaseStatus::Running) {
        "running".yellow().to_string()
    } else if statuses.iter().all(|s| *s == PhaseStatus::Completed) {
        "completed".green().to_string()
    } else if statuses.iter().any(|s| *s == PhaseStatus::Skipped) {
        "skipped".yellow().dimmed().to_string()
    } else {
        "pending".dimmed().to_string()
    }
}
