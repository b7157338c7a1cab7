//! Dev command: generate the dev topology, write artifacts, and supervise
//! the provider dev processes until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ServiceRole, StagecraftConfig};
use crate::providers::{
    BackendProvider, DevOptions, FrontendProvider, ProviderRegistry, ServiceDefinition,
    ShutdownPolicy,
};
use crate::topology::{self, artifacts, Domains, TopologyInputs};
use crate::ui;

pub async fn execute(
    config: StagecraftConfig,
    env: String,
    no_proxy: bool,
    no_frontend: bool,
    registry: Arc<ProviderRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    ui::print_header(&format!("Dev: {}", config.name));

    if which::which("docker").is_err() {
        ui::print_warning("docker not found on PATH; `stagecraft infra up` will not work");
    }

    let env_config = config
        .environments
        .get(&env)
        .cloned()
        .unwrap_or_default();
    let shutdown = config.dev.shutdown_policy()?;

    // Resolve the tier services and their provider-contributed definitions.
    let backend = tier_service(&config, ServiceRole::Backend);
    let frontend_enabled = config.dev.frontend && !no_frontend;
    let frontend = if frontend_enabled {
        tier_service(&config, ServiceRole::Frontend)
    } else {
        None
    };

    let backend_id = env_config.providers.backend.as_deref().unwrap_or("generic");
    let frontend_id = env_config
        .providers
        .frontend
        .as_deref()
        .unwrap_or("generic");

    let backend_def: Option<ServiceDefinition> = match &backend {
        Some(name) => {
            let provider = registry.backend.get(backend_id)?;
            Some(provider.service_definition(&env_config.provider_payload(backend_id), name)?)
        }
        None => None,
    };
    let frontend_def: Option<ServiceDefinition> = match &frontend {
        Some(name) => {
            let provider = registry.frontend.get(frontend_id)?;
            Some(provider.service_definition(&env_config.provider_payload(frontend_id), name)?)
        }
        None => None,
    };

    // Generate and write the topology.
    let domains = Domains {
        frontend: config.frontend_domain(),
        backend: config.backend_domain(),
    };
    let inputs = TopologyInputs {
        backend: backend_def,
        frontend: frontend_def,
        proxy_enabled: config.dev.proxy && !no_proxy,
    };
    let project_root = std::env::current_dir().context("Failed to resolve working directory")?;

    let dev_topology = topology::generate(&inputs, &domains)?;
    let written = artifacts::write_artifacts(&project_root, &dev_topology)?;
    for path in &written {
        info!("Wrote {}", path.display());
    }

    if !dev_topology.cert_request.hostnames.is_empty() {
        ui::print_info(&format!(
            "TLS certificates expected in {}/{} for: {}",
            artifacts::DEV_DIR,
            artifacts::CERTS_DIR,
            dev_topology.cert_request.hostnames.join(", ")
        ));
        for entry in &dev_topology.hosts_request {
            println!("  {} {}", entry.ip.dimmed(), entry.hostname);
        }
        println!();
    }

    // Supervise the dev processes.
    let mut set: JoinSet<Result<()>> = JoinSet::new();
    let mut ready_waits = Vec::new();

    if let Some(name) = &backend {
        let provider = registry.backend.get(backend_id)?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let opts = dev_options(
            &config,
            name,
            &env_config.provider_payload(backend_id),
            shutdown,
            &project_root,
            Some(ready_tx),
        );
        let token = cancel.child_token();
        set.spawn(async move { provider.dev(token, opts).await.map_err(Into::into) });
        ready_waits.push((name.clone(), ready_rx));
    }

    if let Some(name) = &frontend {
        let provider = registry.frontend.get(frontend_id)?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let opts = dev_options(
            &config,
            name,
            &env_config.provider_payload(frontend_id),
            shutdown,
            &project_root,
            Some(ready_tx),
        );
        let token = cancel.child_token();
        set.spawn(async move { provider.dev(token, opts).await.map_err(Into::into) });
        ready_waits.push((name.clone(), ready_rx));
    }

    if set.is_empty() {
        ui::print_warning("No dev processes to run; artifacts generated only");
        return Ok(());
    }

    for (name, ready_rx) in ready_waits {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("valid spinner template"),
        );
        spinner.set_message(format!("Waiting for {} to become ready...", name));
        spinner.enable_steady_tick(Duration::from_millis(120));

        if ready_rx.await.is_ok() {
            spinner.finish_with_message(format!("{} ready", name));
        } else {
            spinner.finish_with_message(format!("{} exited before reporting ready", name));
        }
    }

    println!();
    println!("  {} https://{}", "backend:".bold(), domains.backend);
    if frontend.is_some() {
        println!("  {} https://{}", "frontend:".bold(), domains.frontend);
    }
    println!();
    ui::print_info("Press Ctrl-C to stop");

    // Run until interrupted or a dev process dies.
    let mut failure: Option<anyhow::Error> = None;
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = set.join_next() => {
            cancel.cancel();
            match result {
                Some(Ok(Err(e))) => failure = Some(e),
                Some(Err(e)) => failure = Some(e.into()),
                _ => {}
            }
        }
    }

    cancel.cancel();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Dev process error during shutdown: {:#}", e),
            Err(e) => warn!("Dev task panicked: {}", e),
        }
    }

    match failure {
        Some(e) => Err(e.context("A dev process exited unexpectedly")),
        None => {
            ui::print_success("Dev environment stopped");
            Ok(())
        }
    }
}

/// First declared service of a tier, by name order.
fn tier_service(config: &StagecraftConfig, role: ServiceRole) -> Option<String> {
    config
        .services
        .iter()
        .find(|(_, s)| s.role == role)
        .map(|(name, _)| name.clone())
}

fn dev_options(
    config: &StagecraftConfig,
    service: &str,
    payload: &crate::providers::ProviderPayload,
    shutdown: ShutdownPolicy,
    project_root: &std::path::Path,
    ready: Option<oneshot::Sender<()>>,
) -> DevOptions {
    let service_config = config.services.get(service);
    let workdir = match service_config.and_then(|s| s.workdir.as_deref()) {
        Some(dir) => project_root.join(dir),
        None => project_root.to_path_buf(),
    };

    DevOptions {
        config: payload.clone(),
        workdir,
        env: service_config.map(|s| s.env.clone()).unwrap_or_default(),
        ready_pattern: service_config.and_then(|s| s.ready_pattern.clone()),
        shutdown,
        ready,
    }
}
