// src/config/mod.rs

//! Configuration: raw YAML model, loading, validation, and resolution into
//! the immutable flow model the engine runs.
//!
//! - [`model`] mirrors the YAML document (`flows`, `targets`, `triggers`).
//! - [`loader`] reads a file and discovers `synth.yaml` up the directory tree.
//! - [`validate`] checks ids, references, and trigger shapes.
//! - [`resolve`] inlines target/trigger references and produces
//!   [`resolve::ResolvedFlow`]s.

pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use loader::{find_config_file, load_from_path};
pub use model::{
    dedent, random_color, After, Args, Config, Envs, Flow, Node, Once, Restart, Target, Trigger,
    Watch,
};
pub use resolve::{ResolvedFlow, ResolvedNode};
pub use validate::validate_config;
