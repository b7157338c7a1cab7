//! Deploy plan types
//!
//! A plan is the pure, ordered description of what a deploy or rollback will
//! do: which phases run, over which services, with which providers. Plans are
//! immutable once built and serialize byte-identically for identical inputs.

use serde::{Deserialize, Serialize};

use super::release::Phase;

/// Placeholder version used by dry-run plans when no release has been
/// allocated yet. Shaped like a release ID so rendered plans read correctly.
pub const VERSION_PLACEHOLDER: &str = "rel-<yyyymmdd-hhmmssmmm>";

/// Options narrowing a plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Service filter; empty means all declared services.
    pub services: Vec<String>,

    /// Explicit version/tag. When empty the version falls back to
    /// `release_id`, then to [`VERSION_PLACEHOLDER`].
    pub version: Option<String>,

    /// ID of the release this plan will drive, when one has been allocated.
    pub release_id: Option<String>,

    /// Restrict the plan to the build phase.
    pub build_only: bool,
}

/// One phase of a plan: the phase identifier, the sorted service set it
/// operates on, and the sorted provider identifiers responsible for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub phase: Phase,
    pub services: Vec<String>,
    pub providers: Vec<String>,
}

/// An ordered, immutable deploy plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub env: String,
    pub version: String,
    pub services: Vec<String>,
    pub phases: Vec<PlanPhase>,
}

impl Plan {
    /// Phase identifiers in execution order.
    pub fn phase_order(&self) -> Vec<Phase> {
        self.phases.iter().map(|p| p.phase).collect()
    }

    /// Providers responsible for a phase, if the phase is in the plan.
    pub fn providers_for(&self, phase: Phase) -> &[String] {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.providers.as_slice())
            .unwrap_or(&[])
    }

    /// Deterministic YAML rendering used by `stagecraft plan` and tests.
    pub fn to_yaml(&self) -> String {
        // Plans contain only strings and enums; serialization cannot fail.
        serde_yaml::to_string(self).expect("plan serialization is infallible")
    }
}
