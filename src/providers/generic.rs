//! The `generic` backend and frontend providers.
//!
//! Both run user-configured shell commands: a `build_command` for the build
//! phase and a `dev_command` for the long-lived dev server. The service
//! definition contributed to the dev topology comes straight from the
//! provider payload.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::infrastructure::commander::{CommandSpec, Commander, LocalCommander};
use crate::infrastructure::process::{run_dev_process, DevProcessSpec};

use super::{
    BackendProvider, BuildOptions, Capability, DevOptions, FrontendProvider, Provider,
    ProviderPayload, ServiceDefinition,
};

/// Schema of the `generic` provider payload. Parsed here, opaque to the core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenericConfig {
    /// Long-lived dev server command, run via `sh -c`.
    #[serde(default)]
    pub dev_command: Option<String>,

    /// Build command, run via `sh -c`. Absent means the build phase has
    /// nothing to do for this service.
    #[serde(default)]
    pub build_command: Option<String>,

    /// Push command, run via `sh -c`. Absent means artifacts stay local.
    #[serde(default)]
    pub push_command: Option<String>,

    /// Dev-time Compose service contributed to the topology.
    #[serde(default)]
    pub service: Option<ServiceDefinition>,
}

/// Shared implementation behind the backend and frontend registrations.
struct GenericRuntime {
    capability: Capability,
}

const GENERIC_ID: &str = "generic";

impl GenericRuntime {
    fn service_definition(
        &self,
        config: &ProviderPayload,
        service: &str,
    ) -> Result<ServiceDefinition, ProviderError> {
        let parsed: GenericConfig = config.parse(GENERIC_ID)?;
        let mut definition = parsed.service.unwrap_or_default();
        if definition.name.is_empty() {
            definition.name = service.to_string();
        }
        Ok(definition)
    }

    async fn build(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        let parsed: GenericConfig = opts.config.parse(GENERIC_ID)?;
        let Some(build_command) = parsed.build_command else {
            debug!(
                "No build command configured for {}, nothing to build",
                opts.service
            );
            return Ok(());
        };

        info!("Building {}: {}", opts.service, build_command);
        self.run_shell(cancel, &build_command, "build", &opts).await
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        let parsed: GenericConfig = opts.config.parse(GENERIC_ID)?;
        let Some(push_command) = parsed.push_command else {
            debug!(
                "No push command configured for {}, artifacts stay local",
                opts.service
            );
            return Ok(());
        };

        info!("Pushing {}: {}", opts.service, push_command);
        self.run_shell(cancel, &push_command, "push", &opts).await
    }

    async fn run_shell(
        &self,
        cancel: &CancellationToken,
        command: &str,
        label: &str,
        opts: &BuildOptions,
    ) -> Result<(), ProviderError> {
        let mut spec = CommandSpec::new("sh")
            .args(["-c", command])
            .workdir(&opts.workdir)
            .env("STAGECRAFT_SERVICE", &opts.service)
            .env("STAGECRAFT_VERSION", &opts.version);
        for (key, value) in &opts.env {
            spec = spec.env(key, value);
        }

        let output = LocalCommander
            .run(cancel, spec)
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !output.success() {
            return Err(self.failed(format!(
                "{} command exited with status {}: {}",
                label,
                output.status,
                output.stderr.trim()
            )));
        }

        Ok(())
    }

    async fn dev(&self, cancel: CancellationToken, opts: DevOptions) -> Result<(), ProviderError> {
        let parsed: GenericConfig = opts.config.parse(GENERIC_ID)?;
        let Some(dev_command) = parsed.dev_command else {
            return Err(ProviderError::InvalidConfig {
                id: GENERIC_ID.to_string(),
                message: "dev_command is required to run a dev process".to_string(),
            });
        };

        let name = parsed
            .service
            .map(|s| s.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.capability.as_str().to_string());

        let spec = DevProcessSpec {
            name,
            command: dev_command,
            workdir: opts.workdir,
            env: opts.env,
            ready_pattern: opts.ready_pattern,
            shutdown: opts.shutdown,
        };

        run_dev_process(cancel, spec, opts.ready)
            .await
            .map_err(|e| self.failed(e.to_string()))
    }

    fn failed(&self, message: String) -> ProviderError {
        ProviderError::Failed {
            capability: self.capability.as_str().to_string(),
            id: GENERIC_ID.to_string(),
            message,
        }
    }
}

/// `generic` backend provider.
#[derive(Debug)]
pub struct GenericBackend;

impl Provider for GenericBackend {
    fn id(&self) -> &'static str {
        GENERIC_ID
    }
}

#[async_trait]
impl BackendProvider for GenericBackend {
    fn service_definition(
        &self,
        config: &ProviderPayload,
        service: &str,
    ) -> Result<ServiceDefinition, ProviderError> {
        GenericRuntime {
            capability: Capability::Backend,
        }
        .service_definition(config, service)
    }

    async fn build(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Backend,
        }
        .build(cancel, opts)
        .await
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Backend,
        }
        .push(cancel, opts)
        .await
    }

    async fn dev(&self, cancel: CancellationToken, opts: DevOptions) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Backend,
        }
        .dev(cancel, opts)
        .await
    }
}

/// `generic` frontend provider.
#[derive(Debug)]
pub struct GenericFrontend;

impl Provider for GenericFrontend {
    fn id(&self) -> &'static str {
        GENERIC_ID
    }
}

#[async_trait]
impl FrontendProvider for GenericFrontend {
    fn service_definition(
        &self,
        config: &ProviderPayload,
        service: &str,
    ) -> Result<ServiceDefinition, ProviderError> {
        GenericRuntime {
            capability: Capability::Frontend,
        }
        .service_definition(config, service)
    }

    async fn build(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Frontend,
        }
        .build(cancel, opts)
        .await
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        opts: BuildOptions,
    ) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Frontend,
        }
        .push(cancel, opts)
        .await
    }

    async fn dev(&self, cancel: CancellationToken, opts: DevOptions) -> Result<(), ProviderError> {
        GenericRuntime {
            capability: Capability::Frontend,
        }
        .dev(cancel, opts)
        .await
    }
}
