//! Phase execution kernel.
//!
//! One dispatch loop drives every release, deploy and rollback alike. The
//! kernel owns the status bookkeeping: each phase is moved to Running, its
//! effector is invoked, and the outcome is recorded through the state
//! engine. Failure and cancellation propagate deterministically: a failed
//! phase skips everything downstream; cancellation between phases skips
//! everything remaining. The kernel never retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{Phase, PhaseStatus, Plan, Release};
use crate::state::ReleaseManager;

/// Effector table: one entry per phase, all sharing the signature
/// (cancellation, release, plan) → result.
#[async_trait]
pub trait PhaseEffectors: Send + Sync {
    async fn build(&self, cancel: &CancellationToken, release: &Release, plan: &Plan)
        -> Result<()>;
    async fn push(&self, cancel: &CancellationToken, release: &Release, plan: &Plan)
        -> Result<()>;
    async fn migrate_pre(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()>;
    async fn rollout(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()>;
    async fn migrate_post(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()>;
    async fn finalize(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        plan: &Plan,
    ) -> Result<()>;
}

async fn invoke(
    effectors: &dyn PhaseEffectors,
    phase: Phase,
    cancel: &CancellationToken,
    release: &Release,
    plan: &Plan,
) -> Result<()> {
    match phase {
        Phase::Build => effectors.build(cancel, release, plan).await,
        Phase::Push => effectors.push(cancel, release, plan).await,
        Phase::MigratePre => effectors.migrate_pre(cancel, release, plan).await,
        Phase::Rollout => effectors.rollout(cancel, release, plan).await,
        Phase::MigratePost => effectors.migrate_post(cancel, release, plan).await,
        Phase::Finalize => effectors.finalize(cancel, release, plan).await,
    }
}

/// Drives a release through its plan.
pub struct PhaseRunner<'a> {
    manager: &'a ReleaseManager,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(manager: &'a ReleaseManager) -> Self {
        Self { manager }
    }

    /// Execute every phase of the plan, in order, until the last phase
    /// terminates or a phase fails.
    pub async fn run(
        &self,
        release_id: &str,
        plan: &Plan,
        effectors: &dyn PhaseEffectors,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let order = plan.phase_order();

        for (index, phase) in order.iter().enumerate() {
            let phase = *phase;

            if cancel.is_cancelled() {
                self.skip_pending(release_id, &order[index..]);
                anyhow::bail!("Cancelled before phase {}", phase);
            }

            if let Err(e) = self
                .manager
                .update_phase(release_id, phase, PhaseStatus::Running)
            {
                self.abandon(release_id, &order[index..]);
                return Err(e).context(format!("Failed to start phase {}", phase));
            }

            info!("Phase {} running", phase);
            let release = self
                .manager
                .get_release(release_id)
                .context("Release disappeared mid-pipeline")?;

            match invoke(effectors, phase, cancel, &release, plan).await {
                Ok(()) => {
                    if let Err(e) =
                        self.manager
                            .update_phase(release_id, phase, PhaseStatus::Completed)
                    {
                        self.abandon(release_id, &order[index..]);
                        return Err(e).context(format!("Failed to complete phase {}", phase));
                    }
                    info!("Phase {} completed", phase);
                }
                Err(effector_err) => {
                    // State engine errors take precedence over effector errors.
                    if let Err(e) =
                        self.manager
                            .update_phase(release_id, phase, PhaseStatus::Failed)
                    {
                        self.abandon(release_id, &order[index..]);
                        return Err(e).context(format!("Failed to record phase {} failure", phase));
                    }
                    self.skip_pending(release_id, &order[index + 1..]);

                    let providers = plan.providers_for(phase).join(", ");
                    let annotation = if providers.is_empty() {
                        format!("Phase {} failed", phase)
                    } else {
                        format!("Phase {} failed (providers: {})", phase, providers)
                    };
                    return Err(effector_err.context(annotation));
                }
            }
        }

        Ok(())
    }

    /// Skip every phase in `phases` that has not run yet.
    fn skip_pending(&self, release_id: &str, phases: &[Phase]) {
        for phase in phases {
            match self.manager.get_release(release_id) {
                Ok(release) => {
                    if release.phases[phase].status == PhaseStatus::Pending {
                        if let Err(e) =
                            self.manager
                                .update_phase(release_id, *phase, PhaseStatus::Skipped)
                        {
                            warn!("Failed to skip phase {}: {}", phase, e);
                        }
                    }
                }
                Err(e) => warn!("Failed to load release while skipping phases: {}", e),
            }
        }
    }

    /// Best-effort cleanup after a state engine failure: fail the running
    /// phase, skip the pending ones, ignore secondary errors.
    fn abandon(&self, release_id: &str, phases: &[Phase]) {
        let Ok(release) = self.manager.get_release(release_id) else {
            return;
        };
        for phase in phases {
            let target = match release.phases[phase].status {
                PhaseStatus::Running => PhaseStatus::Failed,
                PhaseStatus::Pending => PhaseStatus::Skipped,
                _ => continue,
            };
            if let Err(e) = self.manager.update_phase(release_id, *phase, target) {
                warn!("Failed to abandon phase {}: {}", phase, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlanPhase, Release};
    use crate::state::ReleaseManager;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Effectors that record invocation order and optionally fail or cancel
    /// at a given phase.
    struct ScriptedEffectors {
        calls: Mutex<Vec<Phase>>,
        fail_on: Option<Phase>,
        cancel_on: Option<(Phase, CancellationToken)>,
    }

    impl ScriptedEffectors {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                cancel_on: None,
            }
        }

        fn failing_at(phase: Phase) -> Self {
            Self {
                fail_on: Some(phase),
                ..Self::ok()
            }
        }

        fn cancelling_at(phase: Phase, token: CancellationToken) -> Self {
            Self {
                cancel_on: Some((phase, token)),
                ..Self::ok()
            }
        }

        fn record(&self, phase: Phase) -> Result<()> {
            self.calls.lock().unwrap().push(phase);
            if let Some((at, token)) = &self.cancel_on {
                if *at == phase {
                    token.cancel();
                }
            }
            if self.fail_on == Some(phase) {
                anyhow::bail!("effector exploded in {}", phase)
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PhaseEffectors for ScriptedEffectors {
        async fn build(&self, _c: &CancellationToken, _r: &Release, _p: &Plan) -> Result<()> {
            self.record(Phase::Build)
        }
        async fn push(&self, _c: &CancellationToken, _r: &Release, _p: &Plan) -> Result<()> {
            self.record(Phase::Push)
        }
        async fn migrate_pre(&self, _c: &CancellationToken, _r: &Release, _p: &Plan) -> Result<()> {
            self.record(Phase::MigratePre)
        }
        async fn rollout(&self, _c: &CancellationToken, _r: &Release, _p: &Plan) -> Result<()> {
            self.record(Phase::Rollout)
        }
        async fn migrate_post(
            &self,
            _c: &CancellationToken,
            _r: &Release,
            _p: &Plan,
        ) -> Result<()> {
            self.record(Phase::MigratePost)
        }
        async fn finalize(&self, _c: &CancellationToken, _r: &Release, _p: &Plan) -> Result<()> {
            self.record(Phase::Finalize)
        }
    }

    fn full_plan() -> Plan {
        Plan {
            env: "staging".to_string(),
            version: "v1.0.0".to_string(),
            services: vec!["api".to_string()],
            phases: Phase::ALL
                .iter()
                .map(|p| PlanPhase {
                    phase: *p,
                    services: vec!["api".to_string()],
                    providers: vec!["generic".to_string()],
                })
                .collect(),
        }
    }

    fn manager(dir: &std::path::Path) -> ReleaseManager {
        ReleaseManager::new(dir.join("releases.json")).unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_completes_every_phase_in_order() {
        let td = tempdir().unwrap();
        let mgr = manager(td.path());
        let release = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();

        let effectors = ScriptedEffectors::ok();
        let cancel = CancellationToken::new();
        PhaseRunner::new(&mgr)
            .run(&release.id, &full_plan(), &effectors, &cancel)
            .await
            .unwrap();

        assert_eq!(*effectors.calls.lock().unwrap(), Phase::ALL.to_vec());

        let final_state = mgr.get_release(&release.id).unwrap();
        for phase in Phase::ALL {
            let state = &final_state.phases[&phase];
            assert_eq!(state.status, PhaseStatus::Completed, "{}", phase);
            assert!(state.ended_at.is_some(), "{} should have ended_at", phase);
        }
    }

    #[tokio::test]
    async fn test_failure_skips_downstream_phases() {
        let td = tempdir().unwrap();
        let mgr = manager(td.path());
        let release = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();

        let effectors = ScriptedEffectors::failing_at(Phase::MigratePre);
        let cancel = CancellationToken::new();
        let err = PhaseRunner::new(&mgr)
            .run(&release.id, &full_plan(), &effectors, &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("migrate_pre"));

        let final_state = mgr.get_release(&release.id).unwrap();
        assert_eq!(
            final_state.phases[&Phase::Build].status,
            PhaseStatus::Completed
        );
        assert_eq!(
            final_state.phases[&Phase::Push].status,
            PhaseStatus::Completed
        );
        assert_eq!(
            final_state.phases[&Phase::MigratePre].status,
            PhaseStatus::Failed
        );
        for phase in [Phase::Rollout, Phase::MigratePost, Phase::Finalize] {
            let state = &final_state.phases[&phase];
            assert_eq!(state.status, PhaseStatus::Skipped, "{}", phase);
            assert!(state.ended_at.is_some(), "{} should have ended_at", phase);
        }

        // Downstream effectors never ran.
        assert_eq!(
            *effectors.calls.lock().unwrap(),
            vec![Phase::Build, Phase::Push, Phase::MigratePre]
        );
    }

    #[tokio::test]
    async fn test_cancellation_before_start_skips_everything() {
        let td = tempdir().unwrap();
        let mgr = manager(td.path());
        let release = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();

        let effectors = ScriptedEffectors::ok();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = PhaseRunner::new(&mgr)
            .run(&release.id, &full_plan(), &effectors, &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cancelled"));
        assert!(effectors.calls.lock().unwrap().is_empty());

        let final_state = mgr.get_release(&release.id).unwrap();
        for phase in Phase::ALL {
            assert_eq!(final_state.phases[&phase].status, PhaseStatus::Skipped);
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_pipeline_skips_remaining() {
        let td = tempdir().unwrap();
        let mgr = manager(td.path());
        let release = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();

        let cancel = CancellationToken::new();
        let effectors = ScriptedEffectors::cancelling_at(Phase::Push, cancel.clone());

        let err = PhaseRunner::new(&mgr)
            .run(&release.id, &full_plan(), &effectors, &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("migrate_pre"));

        let final_state = mgr.get_release(&release.id).unwrap();
        assert_eq!(
            final_state.phases[&Phase::Push].status,
            PhaseStatus::Completed
        );
        for phase in [
            Phase::MigratePre,
            Phase::Rollout,
            Phase::MigratePost,
            Phase::Finalize,
        ] {
            assert_eq!(final_state.phases[&phase].status, PhaseStatus::Skipped);
        }
    }

    #[tokio::test]
    async fn test_at_most_one_phase_running_throughout() {
        let td = tempdir().unwrap();
        let mgr = manager(td.path());
        let release = mgr.create_release("staging", "v1.0.0", "abc123").unwrap();

        // Effectors observe the release while their phase runs; assert the
        // running set is exactly the current phase.
        struct WatchingEffectors;

        #[async_trait]
        impl PhaseEffectors for WatchingEffectors {
            async fn build(&self, _c: &CancellationToken, r: &Release, _p: &Plan) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::Build));
                Ok(())
            }
            async fn push(&self, _c: &CancellationToken, r: &Release, _p: &Plan) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::Push));
                Ok(())
            }
            async fn migrate_pre(
                &self,
                _c: &CancellationToken,
                r: &Release,
                _p: &Plan,
            ) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::MigratePre));
                Ok(())
            }
            async fn rollout(&self, _c: &CancellationToken, r: &Release, _p: &Plan) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::Rollout));
                Ok(())
            }
            async fn migrate_post(
                &self,
                _c: &CancellationToken,
                r: &Release,
                _p: &Plan,
            ) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::MigratePost));
                Ok(())
            }
            async fn finalize(&self, _c: &CancellationToken, r: &Release, _p: &Plan) -> Result<()> {
                assert_eq!(r.running_phase(), Some(Phase::Finalize));
                Ok(())
            }
        }

        let cancel = CancellationToken::new();
        PhaseRunner::new(&mgr)
            .run(&release.id, &full_plan(), &WatchingEffectors, &cancel)
            .await
            .unwrap();
    }
}
