// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{Args, Config, Flow, Trigger, TriggerRef, TargetRef};
use crate::errors::{Result, SynthError};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("id pattern is valid"));

static ARG_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("arg key pattern is valid"));

/// Run semantic validation against a loaded configuration.
///
/// Checks:
/// - flow / node / target / trigger ids match `\w+`
/// - template argument keys match `[a-zA-Z]+`
/// - node `target` / `triggers` references resolve
/// - `after` lists are non-empty and refer to nodes in the same flow
/// - `watch` lists are non-empty
/// - restart delays are non-negative
///
/// Cycle detection is **not** done here; the flow graph reports cycles with
/// their full path at construction time.
pub fn validate_config(config: &Config) -> Result<()> {
    for id in config.targets.keys() {
        validate_id(id, "target")?;
    }
    for (id, trigger) in config.triggers.iter() {
        validate_id(id, "trigger")?;
        validate_trigger(trigger, &format!("trigger '{id}'"))?;
    }
    for (id, flow) in config.flows.iter() {
        validate_id(id, "flow")?;
        validate_flow(id, flow, config)?;
    }
    Ok(())
}

fn validate_flow(flow_id: &str, flow: &Flow, config: &Config) -> Result<()> {
    validate_args(&flow.args, &format!("flow '{flow_id}'"))?;

    for (node_id, node) in flow.nodes.iter() {
        validate_id(node_id, "node")?;

        let where_ = format!("node '{node_id}' in flow '{flow_id}'");

        validate_args(&node.args, &where_)?;

        match &node.target {
            TargetRef::Id(target_id) => {
                if !config.targets.contains_key(target_id) {
                    return Err(SynthError::Config(format!(
                        "{where_} references unknown target '{target_id}'"
                    )));
                }
            }
            TargetRef::Inline(target) => {
                validate_args(&target.args, &where_)?;
            }
        }

        if node.triggers.is_empty() {
            return Err(SynthError::Config(format!(
                "{where_} must have at least one trigger"
            )));
        }

        for trigger_ref in node.triggers.iter() {
            let trigger = match trigger_ref {
                TriggerRef::Id(trigger_id) => {
                    config.triggers.get(trigger_id).ok_or_else(|| {
                        SynthError::Config(format!(
                            "{where_} references unknown trigger '{trigger_id}'"
                        ))
                    })?
                }
                TriggerRef::Inline(trigger) => trigger,
            };

            validate_trigger(trigger, &where_)?;

            if let Trigger::After(after) = trigger {
                for predecessor in after.after.iter() {
                    if !flow.nodes.contains_key(predecessor) {
                        return Err(SynthError::Config(format!(
                            "{where_} waits for unknown node '{predecessor}'"
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn validate_trigger(trigger: &Trigger, where_: &str) -> Result<()> {
    match trigger {
        Trigger::Once(_) => {}
        Trigger::After(after) => {
            if after.after.is_empty() {
                return Err(SynthError::Config(format!(
                    "{where_}: `after` must name at least one node"
                )));
            }
        }
        Trigger::Restart(restart) => {
            if restart.delay < 0.0 || !restart.delay.is_finite() {
                return Err(SynthError::Config(format!(
                    "{where_}: restart delay must be a non-negative number (got {})",
                    restart.delay
                )));
            }
        }
        Trigger::Watch(watch) => {
            if watch.watch.is_empty() {
                return Err(SynthError::Config(format!(
                    "{where_}: `watch` must name at least one path"
                )));
            }
        }
    }
    Ok(())
}

fn validate_args(args: &Args, where_: &str) -> Result<()> {
    for key in args.keys() {
        if !ARG_KEY_PATTERN.is_match(key) {
            return Err(SynthError::Config(format!(
                "{where_}: invalid template argument key '{key}' (must match [a-zA-Z]+)"
            )));
        }
    }
    Ok(())
}

fn validate_id(id: &str, kind: &str) -> Result<()> {
    if !ID_PATTERN.is_match(id) {
        return Err(SynthError::Config(format!(
            "invalid {kind} id '{id}' (must match \\w+)"
        )));
    }
    Ok(())
}
