//! Typed provider registries.
//!
//! One registry per capability, bundled into [`ProviderRegistry`]. Insertion
//! happens at init time, before any lookup; registering a duplicate
//! identifier within a capability is a programmer error and aborts the
//! process. Lookups and enumeration are deterministic: identifiers come back
//! lexicographically sorted.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;

use super::{
    env_secrets::EnvSecrets,
    generic::{GenericBackend, GenericFrontend},
    github_ci::GithubActions,
    script_migrate::ScriptMigration,
    BackendProvider, Capability, CiProvider, CloudProvider, FrontendProvider, MigrationEngine,
    NetworkProvider, Provider, SecretsProvider,
};

/// Registry for one capability.
pub struct Registry<P: Provider + ?Sized> {
    capability: Capability,
    entries: RwLock<BTreeMap<String, Arc<P>>>,
}

impl<P: Provider + ?Sized> Registry<P> {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Register a provider under its own identifier.
    ///
    /// # Panics
    ///
    /// Panics when the identifier is already registered for this capability.
    /// Registration happens during process init, before any lookup.
    pub fn register(&self, provider: Arc<P>) {
        let id = provider.id().to_string();
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.contains_key(&id) {
            panic!(
                "duplicate {} provider registration: {}",
                self.capability, id
            );
        }
        entries.insert(id, provider);
    }

    /// Look up a provider by identifier.
    pub fn get(&self, id: &str) -> Result<Arc<P>, RegistryError> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownProvider {
                capability: self.capability.as_str().to_string(),
                id: id.to_string(),
                known: entries.keys().cloned().collect(),
            })
    }

    /// All registered identifiers, lexicographically sorted.
    pub fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.keys().cloned().collect()
    }
}

/// The full set of capability registries.
pub struct ProviderRegistry {
    pub backend: Registry<dyn BackendProvider>,
    pub frontend: Registry<dyn FrontendProvider>,
    pub network: Registry<dyn NetworkProvider>,
    pub cloud: Registry<dyn CloudProvider>,
    pub ci: Registry<dyn CiProvider>,
    pub secrets: Registry<dyn SecretsProvider>,
    pub migration: Registry<dyn MigrationEngine>,
}

impl ProviderRegistry {
    /// Empty registries for every capability. Tests register fakes here.
    pub fn empty() -> Self {
        Self {
            backend: Registry::new(Capability::Backend),
            frontend: Registry::new(Capability::Frontend),
            network: Registry::new(Capability::Network),
            cloud: Registry::new(Capability::Cloud),
            ci: Registry::new(Capability::Ci),
            secrets: Registry::new(Capability::Secrets),
            migration: Registry::new(Capability::MigrationEngine),
        }
    }

    /// Registries pre-populated with the built-in providers. Called once by
    /// the command entry point before any lookup.
    pub fn builtin() -> Self {
        let registry = Self::empty();
        registry.backend.register(Arc::new(GenericBackend));
        registry.frontend.register(Arc::new(GenericFrontend));
        registry.migration.register(Arc::new(ScriptMigration));
        registry.ci.register(Arc::new(GithubActions));
        registry.secrets.register(Arc::new(EnvSecrets));
        registry
    }
}
