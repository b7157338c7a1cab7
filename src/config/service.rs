//! Service declarations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What tier a declared service belongs to. Backend and frontend services
/// are driven by their capability providers; worker services ride along in
/// the rollout only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    #[default]
    Backend,
    Frontend,
    Worker,
}

/// One declared service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Tier of this service.
    #[serde(default)]
    pub role: ServiceRole,

    /// Working directory for provider commands, relative to the project
    /// root. Defaults to the project root itself.
    #[serde(default)]
    pub workdir: Option<String>,

    /// Extra environment for provider commands.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Regex that marks the dev process ready once matched on its output.
    #[serde(default)]
    pub ready_pattern: Option<String>,
}
