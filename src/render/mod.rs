// src/render/mod.rs

//! Terminal rendering.
//!
//! The engine talks to a [`Renderer`] trait so the display can be swapped
//! out (tests use a recording implementation); [`console`] is the line
//! oriented implementation used by the CLI.

pub mod console;

pub use console::ConsoleRenderer;

use crate::engine::messages::Message;
use crate::flow::FlowState;

/// Display collaborator consumed by the orchestrator.
///
/// `handle_message` is called after every dispatched event; the shutdown
/// hooks bracket teardown; `start`/`stop` bracket the whole run and `stop` is
/// guaranteed to be called on every exit path.
pub trait Renderer: Send {
    fn start(&mut self) {}

    fn handle_message(&mut self, message: &Message, state: &FlowState);

    fn handle_shutdown_start(&mut self) {}

    fn handle_shutdown_end(&mut self) {}

    /// Console columns reserved for per-line prefixes.
    fn prefix_width(&self) -> usize;

    /// Total console columns available.
    fn console_width(&self) -> usize;

    /// Final status table printed by the CLI after the loop exits.
    fn state_summary(&self, state: &FlowState) -> String;

    fn stop(&mut self) {}
}
