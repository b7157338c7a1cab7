//! Centralized error types for stagecraft
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.
//! The command shell translates these kinds into exit codes;
//! the core only ever returns typed errors.

use thiserror::Error;

/// Top-level error type for stagecraft operations
#[derive(Error, Debug)]
pub enum StagecraftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Release state error: {0}")]
    State(#[from] StateError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

impl StagecraftError {
    /// Exit code for the command shell.
    ///
    /// 0 success, 1 generic, 2 usage (owned by clap), 3 configuration,
    /// 4 provider failure, 5 state-store corruption.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 3,
            Self::Provider(_) | Self::Registry(_) => 4,
            Self::State(StateError::Corrupt { .. }) => 5,
            _ => 1,
        }
    }
}

/// Map an error chain to the command shell's exit code by finding the first
/// typed core error in it.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<StagecraftError>() {
            return e.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some()
            || cause.downcast_ref::<PlanError>().is_some()
        {
            return 3;
        }
        if cause.downcast_ref::<ProviderError>().is_some()
            || cause.downcast_ref::<RegistryError>().is_some()
        {
            return 4;
        }
        if let Some(e) = cause.downcast_ref::<StateError>() {
            return match e {
                StateError::Corrupt { .. } => 5,
                _ => 1,
            };
        }
    }
    1
}

/// Release state engine errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Invalid release request: {reason}")]
    Invalid { reason: String },

    #[error("Release not found: {id}")]
    NotFound { id: String },

    #[error("Unknown phase: {name}. Expected one of: build, push, migrate_pre, rollout, migrate_post, finalize")]
    InvalidPhase { name: String },

    #[error("Illegal transition for phase {phase}: {from} -> {to}")]
    IllegalTransition {
        phase: String,
        from: String,
        to: String,
    },

    #[error("Release store corrupted at {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Release store I/O failure: {message}")]
    Io { message: String },
}

/// Planner errors
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Unknown environment: {name}. Known environments: [{}]", .known.join(" "))]
    UnknownEnv { name: String, known: Vec<String> },

    #[error("Unknown service: {name}. Known services: [{}]", .known.join(" "))]
    UnknownService { name: String, known: Vec<String> },

    #[error("No {capability} provider selected for environment {env}")]
    NoProvider { capability: String, env: String },
}

/// Provider registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown {capability} provider: {id}. Known providers: [{}]", .known.join(" "))]
    UnknownProvider {
        capability: String,
        id: String,
        known: Vec<String>,
    },
}

/// Errors raised inside providers, annotated with provider identity
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {id} ({capability}) failed: {message}")]
    Failed {
        capability: String,
        id: String,
        message: String,
    },

    #[error("Provider {id} does not support this operating system: {os}")]
    UnsupportedOs { id: String, os: String },

    #[error("Provider {id} config invalid: {message}")]
    InvalidConfig { id: String, message: String },
}

/// Dev topology generator errors
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("A backend service definition is required to generate the dev topology")]
    BackendRequired,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}
