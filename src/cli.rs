// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `synth`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "synth",
    version,
    about = "Run flows of interdependent shell commands, concurrently.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYNTH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Execute a flow.
    Run {
        /// The flow to execute.
        #[arg(default_value = "default")]
        flow: String,

        /// Path to the configuration file (YAML).
        ///
        /// When absent, walk up from the current directory looking for
        /// `synth.yaml`, stopping at a `.git` directory.
        #[arg(long, value_name = "PATH", env = "SYNTHFILE")]
        config: Option<PathBuf>,

        /// Replace any trigger that could cause a node to run more than once
        /// with a `once` trigger.
        #[arg(long)]
        once: bool,

        /// Parse and validate the configuration, print a summary, but don't
        /// run the flow.
        #[arg(long)]
        dry: bool,

        /// Output a description of the flow as a Mermaid diagram instead of
        /// running it.
        #[arg(long)]
        mermaid: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
