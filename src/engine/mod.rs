// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`messages`] defines the typed events flowing into the orchestrator's
//!   inbox from executions, watchers, timers, the heartbeat, and the signal
//!   handler.
//! - [`orchestrator`] is the single-threaded event loop that owns the flow
//!   state and drives every subprocess lifecycle.

pub mod messages;
pub mod orchestrator;

pub use messages::{ChangeKind, Message, NodeId, PathChange};
pub use orchestrator::Orchestrator;
