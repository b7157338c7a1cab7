use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod cli;
mod commands;
mod config;
mod domain;
mod engine;
mod error;
mod infrastructure;
mod planner;
mod providers;
mod state;
mod topology;
mod ui;

use cli::{Cli, Commands, InfraCommands, ReleasesCommands};
use config::StagecraftConfig;
use infrastructure::commander::LocalCommander;
use providers::ProviderRegistry;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    // One cancellation token per invocation; Ctrl-C propagates through every
    // long-running call.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // Registries are populated before any lookup can happen.
    let registry = Arc::new(ProviderRegistry::builtin());

    if let Err(e) = run(cli, registry, cancel).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(error::exit_code_for(&e));
    }
}

async fn run(cli: Cli, registry: Arc<ProviderRegistry>, cancel: CancellationToken) -> Result<()> {
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Init { name, force, ci } => {
            commands::init::execute(name, force, ci, registry).await
        }

        Commands::Dev {
            env,
            no_proxy,
            no_frontend,
        } => {
            let config = load_config(&config_path)?;
            commands::dev::execute(config, env, no_proxy, no_frontend, registry, cancel).await
        }

        Commands::Build {
            env,
            services,
            version,
        } => {
            let config = load_config(&config_path)?;
            commands::build::execute(config, env, services, version, registry, cancel).await
        }

        Commands::Plan {
            env,
            services,
            version,
            build_only,
        } => {
            let config = load_config(&config_path)?;
            commands::plan::execute(config, env, services, version, build_only).await
        }

        Commands::Deploy {
            env,
            version,
            commit,
            services,
        } => {
            let config = load_config(&config_path)?;
            commands::deploy::execute(config, env, version, commit, services, registry, cancel)
                .await
        }

        Commands::Rollback { env, to } => {
            let config = load_config(&config_path)?;
            commands::rollback::execute(config, env, to, registry, cancel).await
        }

        Commands::Releases { command } => match command {
            ReleasesCommands::List { env } => commands::releases::list(env).await,
            ReleasesCommands::Show { id } => commands::releases::show(id).await,
        },

        Commands::Migrate { env, hook, version } => {
            let config = load_config(&config_path)?;
            commands::migrate::execute(config, env, hook, version, registry, cancel).await
        }

        Commands::Status { env } => {
            let config = load_config(&config_path)?;
            commands::status::execute(config, env).await
        }

        Commands::Infra { command } => match command {
            InfraCommands::Up => commands::infra::up(Arc::new(LocalCommander), cancel).await,
            InfraCommands::Down => commands::infra::down(Arc::new(LocalCommander), cancel).await,
        },

        Commands::Ssh { env, host, command } => {
            let config = load_config(&config_path)?;
            commands::ssh::execute(config, env, host, command).await
        }

        Commands::Logs { service, follow } => commands::logs::execute(service, follow).await,
    }
}

fn load_config(path: &str) -> Result<StagecraftConfig> {
    Ok(StagecraftConfig::load(Path::new(path))?)
}
