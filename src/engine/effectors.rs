//! Deploy and rollback effector tables.
//!
//! Both tables run through the same kernel. Deploy builds and pushes fresh
//! artifacts; rollback reuses the artifacts of the target version, so its
//! build and push entries complete immediately after recording the reuse.
//! Everything downstream of push is shared.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{EnvironmentConfig, ServiceRole, StagecraftConfig};
use crate::domain::{Phase, Plan, Release};
use crate::infrastructure::commander::{CommandSpec, Commander};
use crate::providers::{
    BackendProvider, BuildOptions, FrontendProvider, MigrateOptions, MigrationEngine,
    MigrationHook, ProviderRegistry,
};

use super::kernel::PhaseEffectors;

/// Everything the effector tables need to reach providers and hosts.
pub struct EffectorContext {
    pub config: StagecraftConfig,
    pub env_name: String,
    pub registry: Arc<ProviderRegistry>,
    pub commander: Arc<dyn Commander>,
    pub project_root: PathBuf,
}

impl EffectorContext {
    fn env(&self) -> Result<&EnvironmentConfig> {
        self.config
            .environments
            .get(&self.env_name)
            .with_context(|| format!("Environment {} missing from config", self.env_name))
    }

    fn service_workdir(&self, service: &str) -> PathBuf {
        match self
            .config
            .services
            .get(service)
            .and_then(|s| s.workdir.as_deref())
        {
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        }
    }
}

enum TierAction {
    Build,
    Push,
}

/// Effector table for deploys.
pub struct DeployEffectors {
    ctx: EffectorContext,
}

impl DeployEffectors {
    pub fn new(ctx: EffectorContext) -> Self {
        Self { ctx }
    }

    /// Build every service in the plan without driving a release. Used by
    /// the standalone build command.
    pub async fn build_services(&self, cancel: &CancellationToken, plan: &Plan) -> Result<()> {
        self.run_tier(cancel, plan, TierAction::Build).await
    }

    /// Run build or push across every backend/frontend service in the plan,
    /// through the provider pinned for its tier.
    async fn run_tier(
        &self,
        cancel: &CancellationToken,
        plan: &Plan,
        action: TierAction,
    ) -> Result<()> {
        let env = self.ctx.env()?;

        for name in &plan.services {
            let Some(service) = self.ctx.config.services.get(name) else {
                continue;
            };

            let opts = |provider_id: &str| BuildOptions {
                config: env.provider_payload(provider_id),
                workdir: self.ctx.service_workdir(name),
                service: name.clone(),
                version: plan.version.clone(),
                env: service.env.clone(),
            };

            match service.role {
                ServiceRole::Backend => {
                    let id = env.providers.backend.as_deref().with_context(|| {
                        format!("No backend provider selected for {}", self.ctx.env_name)
                    })?;
                    let provider = self.ctx.registry.backend.get(id)?;
                    match action {
                        TierAction::Build => provider.build(cancel, opts(id)).await?,
                        TierAction::Push => provider.push(cancel, opts(id)).await?,
                    }
                }
                ServiceRole::Frontend => {
                    let id = env.providers.frontend.as_deref().with_context(|| {
                        format!("No frontend provider selected for {}", self.ctx.env_name)
                    })?;
                    let provider = self.ctx.registry.frontend.get(id)?;
                    match action {
                        TierAction::Build => provider.build(cancel, opts(id)).await?,
                        TierAction::Push => provider.push(cancel, opts(id)).await?,
                    }
                }
                ServiceRole::Worker => {}
            }
        }

        Ok(())
    }

    async fn migrate(
        &self,
        cancel: &CancellationToken,
        plan: &Plan,
        phase: Phase,
        hook: MigrationHook,
    ) -> Result<()> {
        let env = self.ctx.env()?;

        for provider_id in plan.providers_for(phase) {
            let engine = self.ctx.registry.migration.get(provider_id)?;
            engine
                .migrate(
                    cancel,
                    hook,
                    MigrateOptions {
                        config: env.provider_payload(provider_id),
                        workdir: self.ctx.project_root.clone(),
                        env_name: self.ctx.env_name.clone(),
                        version: plan.version.clone(),
                    },
                )
                .await?;
        }

        Ok(())
    }

    async fn apply_stack(&self, cancel: &CancellationToken, plan: &Plan) -> Result<()> {
        let spec = CommandSpec::new("docker")
            .args(["compose", "up", "-d", "--remove-orphans"])
            .workdir(&self.ctx.project_root)
            .env("STAGECRAFT_VERSION", &plan.version)
            .env("STAGECRAFT_ENV", &plan.env);

        let output = self
            .ctx
            .commander
            .run(cancel, spec)
            .await
            .context("Failed to apply the compose stack")?;

        if !output.success() {
            anyhow::bail!(
                "Rollout failed with status {}: {}",
                output.status,
                output.stderr.trim()
            );
        }

        Ok(())
    }
}

#[async_trait]
impl PhaseEffectors for DeployEffectors {
    async fn build(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.run_tier(cancel, plan, TierAction::Build).await
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.run_tier(cancel, plan, TierAction::Push).await
    }

    async fn migrate_pre(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.migrate(cancel, plan, Phase::MigratePre, MigrationHook::Pre)
            .await
    }

    async fn rollout(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.apply_stack(cancel, plan).await
    }

    async fn migrate_post(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.migrate(cancel, plan, Phase::MigratePost, MigrationHook::Post)
            .await
    }

    async fn finalize(
        &self,
        _cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        info!(
            "Release {} ({}) finalized for {}",
            release.id, plan.version, plan.env
        );
        Ok(())
    }
}

/// Effector table for rollbacks: artifacts for the target version already
/// exist, so build and push are recorded no-ops; everything else follows the
/// deploy table with the version pinned to the rollback target.
pub struct RollbackEffectors {
    inner: DeployEffectors,
}

impl RollbackEffectors {
    pub fn new(ctx: EffectorContext) -> Self {
        Self {
            inner: DeployEffectors::new(ctx),
        }
    }
}

#[async_trait]
impl PhaseEffectors for RollbackEffectors {
    async fn build(
        &self,
        _cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        info!("Reusing existing build artifacts for {}", plan.version);
        Ok(())
    }

    async fn push(
        &self,
        _cancel: &CancellationToken,
        _release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        info!("Artifacts for {} already published", plan.version);
        Ok(())
    }

    async fn migrate_pre(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.inner.migrate_pre(cancel, release, plan).await
    }

    async fn rollout(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.inner.rollout(cancel, release, plan).await
    }

    async fn migrate_post(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.inner.migrate_post(cancel, release, plan).await
    }

    async fn finalize(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()> {
        self.inner.finalize(cancel, release, plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanPhase;
    use crate::infrastructure::commander::FakeCommander;
    use chrono::Utc;

    fn context(commander: Arc<dyn Commander>) -> EffectorContext {
        let config: StagecraftConfig = serde_yaml::from_str(
            r#"
name: shop
services:
  api:
    role: backend
environments:
  staging:
    providers:
      backend: generic
      migration: script
"#,
        )
        .unwrap();

        EffectorContext {
            config,
            env_name: "staging".to_string(),
            registry: Arc::new(ProviderRegistry::builtin()),
            commander,
            project_root: std::env::temp_dir(),
        }
    }

    fn plan() -> Plan {
        Plan {
            env: "staging".to_string(),
            version: "v1.0.0".to_string(),
            services: vec!["api".to_string()],
            phases: Phase::ALL
                .iter()
                .map(|p| PlanPhase {
                    phase: *p,
                    services: vec!["api".to_string()],
                    providers: match p {
                        Phase::MigratePre | Phase::MigratePost => vec!["script".to_string()],
                        Phase::Build | Phase::Push => vec!["generic".to_string()],
                        _ => Vec::new(),
                    },
                })
                .collect(),
        }
    }

    fn release() -> Release {
        Release::new(
            "rel-20250314-092653000",
            "staging",
            "v1.0.0",
            "abc123",
            Utc::now(),
            None,
        )
    }

    #[tokio::test]
    async fn test_rollout_applies_compose_stack() {
        let fake = Arc::new(FakeCommander::new());
        let effectors = DeployEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        effectors
            .rollout(&cancel, &release(), &plan())
            .await
            .unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "docker");
        assert_eq!(calls[0].args[..2], ["compose".to_string(), "up".to_string()]);
        assert_eq!(
            calls[0].env.get("STAGECRAFT_VERSION"),
            Some(&"v1.0.0".to_string())
        );
    }

    #[tokio::test]
    async fn test_rollout_surfaces_compose_failure() {
        let fake = Arc::new(FakeCommander::new());
        fake.push_output(125, "");
        let effectors = DeployEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        let err = effectors
            .rollout(&cancel, &release(), &plan())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("125"));
    }

    #[tokio::test]
    async fn test_build_without_configured_command_is_quiet() {
        let fake = Arc::new(FakeCommander::new());
        let effectors = DeployEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        effectors.build(&cancel, &release(), &plan()).await.unwrap();
        // Rollout commander untouched; the generic provider had nothing to run.
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_build_and_push_are_noops() {
        let fake = Arc::new(FakeCommander::new());
        let effectors = RollbackEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        effectors.build(&cancel, &release(), &plan()).await.unwrap();
        effectors.push(&cancel, &release(), &plan()).await.unwrap();
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_creates_new_release_and_leaves_target_unchanged() {
        use crate::engine::PhaseRunner;
        use crate::state::ReleaseManager;

        let td = tempfile::tempdir().unwrap();
        let mgr = ReleaseManager::new(td.path().join("releases.json")).unwrap();

        // A fully deployed release to roll back to.
        let target = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();
        for phase in Phase::ALL {
            mgr.update_phase(&target.id, phase, crate::domain::PhaseStatus::Running)
                .unwrap();
            mgr.update_phase(&target.id, phase, crate::domain::PhaseStatus::Completed)
                .unwrap();
        }
        let target_snapshot = mgr.get_release(&target.id).unwrap();

        // Rollback: a fresh release copying the target's version and commit.
        let rollback = mgr
            .create_release("staging", &target.version, &target.commit_sha)
            .unwrap();
        assert_ne!(rollback.id, target.id);
        assert_eq!(rollback.version, "v1.0.0");
        assert_eq!(rollback.commit_sha, "abc123");
        assert_eq!(rollback.previous_id.as_deref(), Some(target.id.as_str()));

        let fake = Arc::new(FakeCommander::new());
        let effectors = RollbackEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        let mut rollback_plan = plan();
        rollback_plan.version = target.version.clone();
        PhaseRunner::new(&mgr)
            .run(&rollback.id, &rollback_plan, &effectors, &cancel)
            .await
            .unwrap();

        // The rollback release completed; only the rollout touched the host.
        let done = mgr.get_release(&rollback.id).unwrap();
        for phase in Phase::ALL {
            assert_eq!(
                done.phases[&phase].status,
                crate::domain::PhaseStatus::Completed
            );
        }
        assert_eq!(fake.call_count(), 1);

        // The target release is byte-for-byte untouched.
        assert_eq!(mgr.get_release(&target.id).unwrap(), target_snapshot);
    }

    #[tokio::test]
    async fn test_migrations_run_through_selected_engine() {
        let fake = Arc::new(FakeCommander::new());
        let effectors = DeployEffectors::new(context(fake.clone()));
        let cancel = CancellationToken::new();

        // The script engine has no configured hooks, so this is a clean pass
        // through the provider without shelling out.
        effectors
            .migrate_pre(&cancel, &release(), &plan())
            .await
            .unwrap();
        effectors
            .migrate_post(&cancel, &release(), &plan())
            .await
            .unwrap();
    }
}
