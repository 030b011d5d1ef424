// src/watch/mod.rs

//! Filesystem watching.
//!
//! One watcher task per node carrying a Watch trigger. The watcher knows
//! nothing about the dependency graph; it only turns filesystem change
//! batches into `WatchPathChanged` events for its node.

pub mod watcher;

pub use watcher::spawn_watcher;
