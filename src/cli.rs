//! CLI definitions for stagecraft
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "stagecraft",
    version,
    about = "Local-first deployment orchestrator for Compose-defined stacks",
    long_about = "Orchestrates multi-service applications from local HTTPS development\nthrough build, deploy, and rollback against a canonical Compose stack."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the project config file
    #[arg(long, global = true, default_value = "stagecraft.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold stagecraft.yaml and the .stagecraft directory
    Init {
        /// Project name
        #[arg(long, default_value = "app")]
        name: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,

        /// Also scaffold a GitHub Actions deploy workflow
        #[arg(long)]
        ci: bool,
    },

    /// Generate the dev topology and run dev servers
    Dev {
        /// Environment whose provider selections drive dev
        #[arg(long, default_value = "dev")]
        env: String,

        /// Disable the reverse proxy
        #[arg(long)]
        no_proxy: bool,

        /// Disable the frontend dev server
        #[arg(long)]
        no_frontend: bool,
    },

    /// Build service artifacts without deploying
    Build {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Restrict to specific services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,

        /// Version/tag for the built artifacts
        #[arg(long)]
        version: Option<String>,
    },

    /// Show the deploy plan without executing it
    Plan {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Restrict to specific services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,

        /// Version/tag the plan should carry
        #[arg(long)]
        version: Option<String>,

        /// Plan the build phase only
        #[arg(long)]
        build_only: bool,
    },

    /// Run the full release pipeline
    Deploy {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Release version (defaults to the release ID)
        #[arg(long)]
        version: Option<String>,

        /// Commit SHA to record (defaults to git HEAD)
        #[arg(long)]
        commit: Option<String>,

        /// Restrict to specific services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
    },

    /// Roll back to a previous release
    Rollback {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Release ID to roll back to (defaults to the current release's
        /// predecessor)
        #[arg(long)]
        to: Option<String>,
    },

    /// Inspect release history
    Releases {
        #[command(subcommand)]
        command: ReleasesCommands,
    },

    /// Run migration hooks directly
    Migrate {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Which hook to run
        #[arg(long, value_enum, default_value = "pre")]
        hook: MigrateHookArg,

        /// Version handed to the migration engine
        #[arg(long)]
        version: Option<String>,
    },

    /// Show the current release for an environment
    Status {
        /// Target environment
        #[arg(long, required = true)]
        env: String,
    },

    /// Manage the local infra stack
    Infra {
        #[command(subcommand)]
        command: InfraCommands,
    },

    /// Open a shell on an environment host
    Ssh {
        /// Target environment
        #[arg(long, required = true)]
        env: String,

        /// Host name (defaults to the first declared host)
        #[arg(long)]
        host: Option<String>,

        /// Command to run instead of an interactive shell
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Tail logs from the local stack
    Logs {
        /// Restrict to one service
        #[arg(long)]
        service: Option<String>,

        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Subcommand)]
pub enum ReleasesCommands {
    /// List releases for an environment, newest first
    List {
        /// Target environment
        #[arg(long, required = true)]
        env: String,
    },

    /// Show one release with its full phase trace
    Show {
        /// Release ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum InfraCommands {
    /// Start the generated dev stack
    Up,
    /// Stop the generated dev stack
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MigrateHookArg {
    Pre,
    Post,
    Both,
}
