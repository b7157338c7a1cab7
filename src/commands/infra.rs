//! Local infra stack management over the generated Compose file.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::commander::{CommandSpec, Commander};
use crate::topology::artifacts::{COMPOSE_FILE, DEV_DIR};
use crate::ui;

pub async fn up(commander: Arc<dyn Commander>, cancel: CancellationToken) -> Result<()> {
    run_compose(commander, cancel, &["up", "-d", "--remove-orphans"]).await?;
    ui::print_success("Dev stack is up");
    Ok(())
}

pub async fn down(commander: Arc<dyn Commander>, cancel: CancellationToken) -> Result<()> {
    run_compose(commander, cancel, &["down", "--remove-orphans"]).await?;
    ui::print_success("Dev stack is down");
    Ok(())
}

async fn run_compose(
    commander: Arc<dyn Commander>,
    cancel: CancellationToken,
    args: &[&str],
) -> Result<()> {
    which::which("docker").context("docker is required; install it and retry")?;

    let compose_file = format!("{}/{}", DEV_DIR, COMPOSE_FILE);
    if !std::path::Path::new(&compose_file).exists() {
        bail!(
            "No generated stack at {}. Run `stagecraft dev` first.",
            compose_file
        );
    }

    let spec = CommandSpec::new("docker")
        .args(["compose", "-f", compose_file.as_str()])
        .args(args.iter().copied());

    let output = commander
        .run(&cancel, spec)
        .await
        .context("Failed to run docker compose")?;

    if !output.success() {
        bail!(
            "docker compose exited with status {}: {}",
            output.status,
            output.stderr.trim()
        );
    }

    Ok(())
}
