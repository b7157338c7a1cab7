//! Deploy planner.
//!
//! Pure translation of configuration + environment + options into an ordered
//! plan. No I/O, no provider calls, no clock: identical inputs always yield
//! byte-identical plans.

use std::collections::BTreeSet;

use crate::config::{ServiceRole, StagecraftConfig};
use crate::domain::{Phase, Plan, PlanOptions, PlanPhase, VERSION_PLACEHOLDER};
use crate::error::PlanError;
use crate::providers::Capability;

/// Build a deploy plan for an environment.
///
/// The version resolves from, in order: `opts.version`, `opts.release_id`,
/// the release-ID-shaped placeholder. The service filter intersects with the
/// declared set (empty filter means all services). `build_only` restricts
/// the plan to the build phase; included phases are never reordered.
pub fn plan_deploy(
    config: &StagecraftConfig,
    env: &str,
    opts: &PlanOptions,
) -> Result<Plan, PlanError> {
    let env_config = config
        .environments
        .get(env)
        .ok_or_else(|| PlanError::UnknownEnv {
            name: env.to_string(),
            known: config.known_environments(),
        })?;

    // Resolve the service set: declared ∩ filter, sorted, deduplicated.
    let declared: BTreeSet<&str> = config.services.keys().map(String::as_str).collect();
    let services: Vec<String> = if opts.services.is_empty() {
        declared.iter().map(|s| s.to_string()).collect()
    } else {
        let mut selected = BTreeSet::new();
        for name in &opts.services {
            if !declared.contains(name.as_str()) {
                return Err(PlanError::UnknownService {
                    name: name.clone(),
                    known: config.known_services(),
                });
            }
            selected.insert(name.clone());
        }
        selected.into_iter().collect()
    };

    // Every selected service's tier must have a provider pinned in config.
    let mut tier_providers = BTreeSet::new();
    for name in &services {
        let service = &config.services[name];
        let capability = match service.role {
            ServiceRole::Backend => Capability::Backend,
            ServiceRole::Frontend => Capability::Frontend,
            ServiceRole::Worker => continue,
        };
        let provider = env_config
            .providers
            .for_capability(capability)
            .ok_or_else(|| PlanError::NoProvider {
                capability: capability.as_str().to_string(),
                env: env.to_string(),
            })?;
        tier_providers.insert(provider.to_string());
    }
    let tier_providers: Vec<String> = tier_providers.into_iter().collect();

    let migration_providers: Vec<String> = env_config
        .providers
        .for_capability(Capability::MigrationEngine)
        .map(|p| vec![p.to_string()])
        .unwrap_or_default();

    let version = opts
        .version
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| opts.release_id.clone())
        .unwrap_or_else(|| VERSION_PLACEHOLDER.to_string());

    let mut phases = Vec::with_capacity(Phase::ALL.len());
    for phase in Phase::ALL {
        if opts.build_only && phase != Phase::Build {
            continue;
        }
        let providers = match phase {
            Phase::Build | Phase::Push => tier_providers.clone(),
            Phase::MigratePre | Phase::MigratePost => migration_providers.clone(),
            // Rollout and finalize are driven by the orchestrator itself.
            Phase::Rollout | Phase::Finalize => Vec::new(),
        };
        phases.push(PlanPhase {
            phase,
            services: services.clone(),
            providers,
        });
    }

    Ok(Plan {
        env: env.to_string(),
        version,
        services,
        phases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfig, ProviderSelection, ServiceConfig};

    fn sample_config() -> StagecraftConfig {
        let mut config: StagecraftConfig = serde_yaml::from_str(
            r#"
name: shop
services:
  api:
    role: backend
  web:
    role: frontend
  jobs:
    role: worker
environments:
  staging: {}
"#,
        )
        .unwrap();
        config.environments.insert(
            "staging".to_string(),
            EnvironmentConfig {
                providers: ProviderSelection {
                    backend: Some("generic".to_string()),
                    frontend: Some("generic".to_string()),
                    migration: Some("script".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_plan_is_byte_deterministic() {
        let config = sample_config();
        let opts = PlanOptions {
            version: Some("v1.0.0".to_string()),
            ..Default::default()
        };

        let first = plan_deploy(&config, "staging", &opts).unwrap();
        let second = plan_deploy(&config, "staging", &opts).unwrap();
        assert_eq!(first.to_yaml(), second.to_yaml());
    }

    #[test]
    fn test_phases_in_canonical_order_with_sorted_services() {
        let config = sample_config();
        let plan = plan_deploy(&config, "staging", &PlanOptions::default()).unwrap();

        assert_eq!(plan.phase_order(), Phase::ALL.to_vec());
        assert_eq!(plan.services, vec!["api", "jobs", "web"]);
        for phase in &plan.phases {
            assert_eq!(phase.services, plan.services);
        }
    }

    #[test]
    fn test_unknown_env_lists_known_sorted() {
        let config = sample_config();
        let err = plan_deploy(&config, "prod", &PlanOptions::default()).unwrap_err();
        match err {
            PlanError::UnknownEnv { name, known } => {
                assert_eq!(name, "prod");
                assert_eq!(known, vec!["staging"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_service_in_filter() {
        let config = sample_config();
        let opts = PlanOptions {
            services: vec!["api".to_string(), "billing".to_string()],
            ..Default::default()
        };
        let err = plan_deploy(&config, "staging", &opts).unwrap_err();
        match err {
            PlanError::UnknownService { name, known } => {
                assert_eq!(name, "billing");
                assert_eq!(known, vec!["api", "jobs", "web"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_filter_means_all_services() {
        let config = sample_config();
        let all = plan_deploy(&config, "staging", &PlanOptions::default()).unwrap();
        assert_eq!(all.services, vec!["api", "jobs", "web"]);

        let filtered = plan_deploy(
            &config,
            "staging",
            &PlanOptions {
                services: vec!["web".to_string(), "api".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(filtered.services, vec!["api", "web"]);
        assert_eq!(filtered.phase_order(), Phase::ALL.to_vec());
    }

    #[test]
    fn test_missing_backend_provider() {
        let mut config = sample_config();
        config
            .environments
            .get_mut("staging")
            .unwrap()
            .providers
            .backend = None;

        let err = plan_deploy(&config, "staging", &PlanOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::NoProvider { ref capability, .. } if capability == "backend"
        ));
    }

    #[test]
    fn test_worker_services_need_no_provider() {
        let mut config = sample_config();
        config
            .environments
            .get_mut("staging")
            .unwrap()
            .providers
            .frontend = None;

        let opts = PlanOptions {
            services: vec!["jobs".to_string()],
            ..Default::default()
        };
        let plan = plan_deploy(&config, "staging", &opts).unwrap();
        assert!(plan.providers_for(Phase::Build).is_empty());
    }

    #[test]
    fn test_build_only_restricts_to_build_phase() {
        let config = sample_config();
        let opts = PlanOptions {
            build_only: true,
            ..Default::default()
        };
        let plan = plan_deploy(&config, "staging", &opts).unwrap();
        assert_eq!(plan.phase_order(), vec![Phase::Build]);
    }

    #[test]
    fn test_version_resolution_order() {
        let config = sample_config();

        let explicit = plan_deploy(
            &config,
            "staging",
            &PlanOptions {
                version: Some("v2.0.0".to_string()),
                release_id: Some("rel-20250314-092653000".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(explicit.version, "v2.0.0");

        let from_release = plan_deploy(
            &config,
            "staging",
            &PlanOptions {
                release_id: Some("rel-20250314-092653000".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(from_release.version, "rel-20250314-092653000");

        let placeholder = plan_deploy(&config, "staging", &PlanOptions::default()).unwrap();
        assert_eq!(placeholder.version, VERSION_PLACEHOLDER);
    }

    #[test]
    fn test_migration_providers_attached_to_migrate_phases() {
        let config = sample_config();
        let plan = plan_deploy(&config, "staging", &PlanOptions::default()).unwrap();
        assert_eq!(plan.providers_for(Phase::MigratePre), ["script".to_string()]);
        assert_eq!(
            plan.providers_for(Phase::MigratePost),
            ["script".to_string()]
        );
        assert_eq!(plan.providers_for(Phase::Build), ["generic".to_string()]);
    }
}
