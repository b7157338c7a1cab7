//! Provider contracts and plugin surface.
//!
//! Every pluggable capability (backend, frontend, network, cloud, CI,
//! secrets, migration engine) is a trait here. The core treats provider
//! identifiers and configuration payloads as opaque: payloads are parsed and
//! validated inside the provider, never in core decision logic.

pub mod env_secrets;
pub mod generic;
pub mod github_ci;
pub mod registry;
pub mod script_migrate;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

pub use registry::{ProviderRegistry, Registry};

/// The closed set of pluggable capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Backend,
    Frontend,
    Network,
    Cloud,
    Ci,
    Secrets,
    MigrationEngine,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
            Self::Network => "network",
            Self::Cloud => "cloud",
            Self::Ci => "ci",
            Self::Secrets => "secrets",
            Self::MigrationEngine => "migration-engine",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base contract: a stable, lowercase kebab-case identifier.
pub trait Provider: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &'static str;
}

/// Opaque per-provider configuration payload.
///
/// The core carries the payload from config to provider untouched; parsing
/// happens behind [`ProviderPayload::parse`] inside the provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderPayload(serde_yaml::Value);

impl ProviderPayload {
    pub fn new(value: serde_yaml::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_yaml::Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, serde_yaml::Value::Null)
    }

    /// Parse the payload into the provider's own schema. An absent payload
    /// yields the schema's defaults.
    pub fn parse<T: DeserializeOwned + Default>(
        &self,
        provider_id: &str,
    ) -> Result<T, ProviderError> {
        if self.is_empty() {
            return Ok(T::default());
        }
        serde_yaml::from_value(self.0.clone()).map_err(|e| ProviderError::InvalidConfig {
            id: provider_id.to_string(),
            message: e.to_string(),
        })
    }
}

/// A host a provider operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A port published by a dev service. The generator renders every mapping
/// with its protocol suffix; the protocol defaults to tcp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: String,
    pub container: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl PortMapping {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            protocol: default_protocol(),
        }
    }
}

/// A dev-time service contributed to the topology generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Signal used to stop a dev process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownSignal {
    #[default]
    Sigint,
    Sigterm,
}

impl ShutdownSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sigint => "SIGINT",
            Self::Sigterm => "SIGTERM",
        }
    }
}

/// Shutdown sequence for dev processes: signal, wait, then SIGKILL.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownPolicy {
    pub signal: ShutdownSignal,
    pub timeout: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            signal: ShutdownSignal::Sigint,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Options for a long-lived dev process.
pub struct DevOptions {
    pub config: ProviderPayload,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Regex that must match a stdout/stderr line before readiness is
    /// reported to any waiter.
    pub ready_pattern: Option<String>,
    pub shutdown: ShutdownPolicy,
    /// Fired once the process is ready (ready pattern matched, or process
    /// started when no pattern is configured).
    pub ready: Option<oneshot::Sender<()>>,
}

/// Options for a build invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub config: ProviderPayload,
    pub workdir: PathBuf,
    pub service: String,
    pub version: String,
    pub env: BTreeMap<String, String>,
}

/// Backend capability: owns the primary application service.
#[async_trait]
pub trait BackendProvider: Provider {
    /// The dev-time service definition this provider contributes.
    fn service_definition(
        &self,
        config: &ProviderPayload,
        service: &str,
    ) -> Result<ServiceDefinition, ProviderError>;

    async fn build(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError>;

    /// Publish built artifacts. Providers with nowhere to push complete
    /// immediately.
    async fn push(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError>;

    /// Run the dev process until cancellation or process exit.
    async fn dev(&self, cancel: CancellationToken, opts: DevOptions) -> Result<(), ProviderError>;
}

/// Frontend capability: mirrors the backend contract for the web tier.
#[async_trait]
pub trait FrontendProvider: Provider {
    fn service_definition(
        &self,
        config: &ProviderPayload,
        service: &str,
    ) -> Result<ServiceDefinition, ProviderError>;

    async fn build(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError>;

    async fn push(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError>;

    async fn dev(&self, cancel: CancellationToken, opts: DevOptions) -> Result<(), ProviderError>;
}

/// Network capability: mesh/overlay membership for hosts.
#[async_trait]
pub trait NetworkProvider: Provider {
    /// Idempotent: verify or install the required software on the host.
    async fn ensure_installed(
        &self,
        cancel: &CancellationToken,
        host: &Host,
        config: &ProviderPayload,
    ) -> Result<(), ProviderError>;

    /// Idempotent: join the host to the overlay with the final tag set.
    /// The core computes the tag union; providers apply it verbatim.
    async fn ensure_joined(
        &self,
        cancel: &CancellationToken,
        host: &Host,
        config: &ProviderPayload,
        tags: &[String],
    ) -> Result<(), ProviderError>;

    /// Deterministic FQDN for the host on the overlay. Pure.
    fn node_fqdn(&self, host: &Host, config: &ProviderPayload) -> String;
}

/// Cloud capability: infrastructure provisioning.
#[async_trait]
pub trait CloudProvider: Provider {
    async fn provision(
        &self,
        cancel: &CancellationToken,
        config: &ProviderPayload,
    ) -> Result<(), ProviderError>;
}

/// CI capability: pipeline file generation.
pub trait CiProvider: Provider {
    fn render_pipeline(&self, config: &ProviderPayload) -> Result<String, ProviderError>;
}

/// Secrets capability: opaque key resolution.
#[async_trait]
pub trait SecretsProvider: Provider {
    async fn resolve(
        &self,
        cancel: &CancellationToken,
        config: &ProviderPayload,
        key: &str,
    ) -> Result<String, ProviderError>;
}

/// Which migration hook is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationHook {
    Pre,
    Post,
}

impl MigrationHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Options for a migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub config: ProviderPayload,
    pub workdir: PathBuf,
    pub env_name: String,
    pub version: String,
}

/// Migration-engine capability: schema migrations around the rollout.
#[async_trait]
pub trait MigrationEngine: Provider {
    async fn migrate(
        &self,
        cancel: &CancellationToken,
        hook: MigrationHook,
        opts: MigrateOptions,
    ) -> Result<(), ProviderError>;
}
