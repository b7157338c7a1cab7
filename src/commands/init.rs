//! Scaffold a new stagecraft project.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::providers::{CiProvider, ProviderPayload, ProviderRegistry};
use crate::ui;

const TEMPLATE: &str = r#"name: {name}
domain: localdev.test

services:
  api:
    role: backend
    workdir: .
    ready_pattern: "listening on"
  web:
    role: frontend
    workdir: .

environments:
  dev:
    providers:
      backend: generic
      frontend: generic
    provider_config:
      generic:
        dev_command: echo "configure dev_command in stagecraft.yaml"; sleep 3600
  staging:
    hosts: []
    providers:
      backend: generic
      frontend: generic
      migration: script
    provider_config:
      generic:
        build_command: echo "configure build_command in stagecraft.yaml"
      script:
        pre: echo "configure migration hooks in stagecraft.yaml"

dev:
  proxy: true
  frontend: true
  shutdown_timeout: 10s
"#;

pub async fn execute(
    name: String,
    force: bool,
    ci: bool,
    registry: Arc<ProviderRegistry>,
) -> Result<()> {
    let config_path = Path::new(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            DEFAULT_CONFIG_FILE
        );
    }

    std::fs::write(config_path, TEMPLATE.replace("{name}", &name))
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    std::fs::create_dir_all(".stagecraft/dev/certs")
        .context("Failed to create the .stagecraft directory")?;

    if ci {
        let provider = registry.ci.get("github-actions")?;
        let workflow = provider.render_pipeline(&ProviderPayload::empty())?;
        std::fs::create_dir_all(".github/workflows")
            .context("Failed to create .github/workflows")?;
        std::fs::write(".github/workflows/deploy.yaml", workflow)
            .context("Failed to write .github/workflows/deploy.yaml")?;
        ui::print_info("Scaffolded .github/workflows/deploy.yaml");
    }

    ui::print_success(&format!("Initialized {} for project {}", DEFAULT_CONFIG_FILE, name));
    ui::print_info("Edit stagecraft.yaml, then run `stagecraft dev`");
    Ok(())
}
