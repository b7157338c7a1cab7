//! Domain types shared across the orchestrator.

pub mod plan;
pub mod release;

pub use plan::{Plan, PlanOptions, PlanPhase, VERSION_PLACEHOLDER};
pub use release::{Phase, PhaseState, PhaseStatus, Release};
