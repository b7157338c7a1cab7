//! Tail logs from the generated dev stack.

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::topology::artifacts::{COMPOSE_FILE, DEV_DIR};

pub async fn execute(service: Option<String>, follow: bool) -> Result<()> {
    let compose_file = format!("{}/{}", DEV_DIR, COMPOSE_FILE);
    if !std::path::Path::new(&compose_file).exists() {
        bail!(
            "No generated stack at {}. Run `stagecraft dev` first.",
            compose_file
        );
    }

    let mut command = Command::new("docker");
    command.args(["compose", "-f", &compose_file, "logs"]);
    if follow {
        command.arg("--follow");
    }
    if let Some(service) = &service {
        command.arg(service);
    }

    // Stream straight to the terminal.
    let status = command
        .status()
        .await
        .context("Failed to run docker compose logs")?;

    if !status.success() {
        bail!(
            "docker compose logs exited with status {}",
            status.code().unwrap_or(-1)
        );
    }

    Ok(())
}
