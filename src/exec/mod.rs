// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`script`] renders a node's commands into an executable script file
//!   under the per-run temp directory.
//! - [`execution`] spawns that script as a child process (in its own process
//!   group), streams its merged output as events, and reports completion.

pub mod execution;
pub mod script;

pub use execution::{Execution, ExecutionWait};
pub use script::materialize;
