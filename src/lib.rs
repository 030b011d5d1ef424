// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod flow;
pub mod logging;
pub mod render;
pub mod watch;

use std::time::Instant;

use tracing::info;

use crate::cli::{CliArgs, Command};
use crate::config::loader::{find_config_file, load_from_path};
use crate::config::validate::validate_config;
use crate::config::{ResolvedFlow, Trigger};
use crate::engine::Orchestrator;
use crate::errors::{Result, SynthError};
use crate::render::ConsoleRenderer;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading, validation, and resolution
/// - flow selection and `--once` coercion
/// - `--mermaid` / `--dry` short-circuits
/// - the orchestrator and console renderer
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let Command::Run {
        flow,
        config,
        once,
        dry,
        mermaid,
    } = args.command;

    let start_time = Instant::now();

    let config_path = match config {
        Some(path) => path,
        None => find_config_file()?,
    };
    info!(path = %config_path.display(), "using config file");

    let parsed = load_from_path(&config_path)?;
    validate_config(&parsed)?;
    let resolved = parsed.resolve()?;

    let selected = resolved.get(&flow).ok_or_else(|| SynthError::NoSuchFlow {
        name: flow.clone(),
        available: resolved.keys().cloned().collect(),
    })?;

    let selected = if once { selected.once() } else { selected.clone() };

    if mermaid {
        println!("{}", selected.mermaid());
        return Ok(0);
    }

    if dry {
        print_dry_run(&flow, &selected);
        return Ok(0);
    }

    let renderer = ConsoleRenderer::new(&selected);
    let mut orchestrator = Orchestrator::new(selected, renderer)?;

    let result = orchestrator.run().await;

    println!(
        "Finished in {:.3} seconds. Final state:",
        start_time.elapsed().as_secs_f64()
    );
    println!("{}", orchestrator.state_summary());

    result
}

/// Simple dry-run output: print nodes, triggers, and commands.
fn print_dry_run(name: &str, flow: &ResolvedFlow) {
    println!("synth dry-run of flow '{name}'");
    println!();

    println!("nodes ({}):", flow.nodes.len());
    for (id, node) in flow.nodes.iter() {
        println!("  - {id}");
        println!("      executable: {}", node.target.executable);
        for line in node.target.commands.lines() {
            println!("      | {line}");
        }
        for trigger in node.triggers.iter() {
            match trigger {
                Trigger::Once(_) => println!("      trigger: once"),
                Trigger::After(after) => {
                    println!("      trigger: after {:?}", after.after)
                }
                Trigger::Restart(restart) => {
                    println!("      trigger: restart after {}s", restart.delay)
                }
                Trigger::Watch(watch) => println!("      trigger: watch {:?}", watch.watch),
            }
        }
    }
}
