//! Environment declarations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::providers::{Capability, Host, ProviderPayload};

/// Provider selection per capability. Selections are pinned here by the
/// user; the core never picks a provider on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSelection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub frontend: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub cloud: Option<String>,
    #[serde(default)]
    pub ci: Option<String>,
    #[serde(default)]
    pub secrets: Option<String>,
    #[serde(default)]
    pub migration: Option<String>,
}

impl ProviderSelection {
    pub fn for_capability(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Backend => self.backend.as_deref(),
            Capability::Frontend => self.frontend.as_deref(),
            Capability::Network => self.network.as_deref(),
            Capability::Cloud => self.cloud.as_deref(),
            Capability::Ci => self.ci.as_deref(),
            Capability::Secrets => self.secrets.as_deref(),
            Capability::MigrationEngine => self.migration.as_deref(),
        }
    }
}

/// One named deployment target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Hosts this environment deploys to.
    #[serde(default)]
    pub hosts: Vec<Host>,

    /// Provider selection per capability.
    #[serde(default)]
    pub providers: ProviderSelection,

    /// Opaque per-provider payloads, keyed by provider identifier. The core
    /// carries these to providers untouched.
    #[serde(default)]
    pub provider_config: BTreeMap<String, serde_yaml::Value>,

    /// Environment-level overlay tags. The core unions these with host
    /// roles before handing the final set to the network provider.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EnvironmentConfig {
    /// The opaque payload for a provider, or an empty payload when none is
    /// configured.
    pub fn provider_payload(&self, provider_id: &str) -> ProviderPayload {
        self.provider_config
            .get(provider_id)
            .cloned()
            .map(ProviderPayload::new)
            .unwrap_or_else(ProviderPayload::empty)
    }

    /// Final overlay tag set for a host: environment tags ∪ host roles,
    /// sorted and deduplicated.
    pub fn overlay_tags(&self, host: &Host) -> Vec<String> {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .chain(host.roles.iter())
            .cloned()
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_tags_union_is_sorted_and_deduplicated() {
        let env = EnvironmentConfig {
            tags: vec!["prod".to_string(), "app".to_string()],
            ..Default::default()
        };
        let host = Host {
            name: "droplet-1".to_string(),
            address: "203.0.113.10".to_string(),
            roles: vec!["app".to_string(), "db".to_string()],
        };

        assert_eq!(env.overlay_tags(&host), vec!["app", "db", "prod"]);
    }

    #[test]
    fn test_missing_provider_payload_is_empty() {
        let env = EnvironmentConfig::default();
        assert!(env.provider_payload("generic").is_empty());
    }
}
