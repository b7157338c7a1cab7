//! Phase execution: the shared kernel and the effector tables it drives.

pub mod effectors;
pub mod kernel;

pub use effectors::{DeployEffectors, EffectorContext, RollbackEffectors};
pub use kernel::{PhaseEffectors, PhaseRunner};
