//! Process execution, remote command abstraction, and git helpers.

pub mod commander;
pub mod git;
pub mod process;

pub use commander::{CommandOutput, CommandSpec, Commander, LocalCommander};
pub use process::{run_dev_process, DevProcessSpec};
