//! Open a shell (or run a command) on an environment host.

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::config::StagecraftConfig;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    host: Option<String>,
    command: Vec<String>,
) -> Result<()> {
    let env_config = config
        .environments
        .get(&env)
        .with_context(|| format!("Unknown environment: {}", env))?;

    if env_config.hosts.is_empty() {
        bail!("Environment {} declares no hosts", env);
    }

    let target = match &host {
        Some(name) => env_config
            .hosts
            .iter()
            .find(|h| &h.name == name)
            .with_context(|| format!("No host named {} in environment {}", name, env))?,
        None => &env_config.hosts[0],
    };

    // Interactive passthrough: inherit the terminal.
    let status = Command::new("ssh")
        .arg(&target.address)
        .args(&command)
        .status()
        .await
        .context("Failed to execute ssh")?;

    if !status.success() {
        bail!("ssh exited with status {}", status.code().unwrap_or(-1));
    }

    Ok(())
}
