// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("cyclic flow detected: {}", cycle_path(.0))]
    CyclicFlow(Vec<String>),

    #[error("no flow named '{name}'; available flows: {}", .available.join(", "))]
    NoSuchFlow { name: String, available: Vec<String> },

    #[error("failed to find executable '{0}' on PATH")]
    ExecutableNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// `a -> b -> c -> a` for a cycle stored as `[a, b, c]`.
pub fn cycle_path(cycle: &[String]) -> String {
    let mut ids: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        ids.push(first);
    }
    ids.join(" -> ")
}

pub type Result<T> = std::result::Result<T, SynthError>;
