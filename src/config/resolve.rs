// src/config/resolve.rs

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::model::{
    dedent, random_color, Args, Config, Envs, Node, Once, Target, Trigger, TriggerRef, TargetRef,
    Watch,
};
use crate::errors::{Result, SynthError};

/// One node with every reference inlined. Immutable for the life of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    pub id: String,
    pub target: Target,
    pub args: Args,
    pub envs: Envs,
    pub triggers: Vec<Trigger>,
    /// Display hint only; excluded from [`ResolvedNode::uid`].
    #[serde(skip)]
    pub color: String,
}

impl ResolvedNode {
    /// Stable fingerprint of the behavior-bearing fields. Used to name the
    /// materialized script file, so re-runs of an unchanged node reuse the
    /// same path.
    pub fn uid(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let dump = serde_yaml::to_string(self).unwrap_or_default();
        hasher.update(dump.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Repeating triggers (Restart / Watch) keep the flow alive indefinitely.
    pub fn has_repeating_trigger(&self) -> bool {
        self.triggers.iter().any(Trigger::is_repeating)
    }

    /// Delay of the first Restart trigger, if any.
    pub fn restart_delay(&self) -> Option<f64> {
        self.triggers.iter().find_map(|t| match t {
            Trigger::Restart(restart) => Some(restart.delay),
            _ => None,
        })
    }

    /// All Watch triggers of this node.
    pub fn watches(&self) -> impl Iterator<Item = &Watch> {
        self.triggers.iter().filter_map(|t| match t {
            Trigger::Watch(watch) => Some(watch),
            _ => None,
        })
    }

    /// Direct After-predecessors of this node.
    pub fn predecessors(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().flat_map(|t| {
            let ids: &[String] = match t {
                Trigger::After(after) => &after.after,
                _ => &[],
            };
            ids.iter().map(String::as_str)
        })
    }

    /// Non-repeating variant: keep Once and After triggers, defaulting to a
    /// single Once trigger when none remain. Idempotent.
    pub fn once(&self) -> ResolvedNode {
        let mut triggers: Vec<Trigger> = self
            .triggers
            .iter()
            .filter(|t| matches!(t, Trigger::Once(_) | Trigger::After(_)))
            .cloned()
            .collect();

        if triggers.is_empty() {
            triggers.push(Trigger::Once(Once {}));
        }

        ResolvedNode {
            id: self.id.clone(),
            target: self.target.clone(),
            args: self.args.clone(),
            envs: self.envs.clone(),
            triggers,
            color: self.color.clone(),
        }
    }
}

/// A flow with every node resolved, ready to hand to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFlow {
    pub nodes: IndexMap<String, ResolvedNode>,
    pub args: Args,
    pub envs: Envs,
}

impl ResolvedFlow {
    /// Apply [`ResolvedNode::once`] to every node. Idempotent.
    pub fn once(&self) -> ResolvedFlow {
        ResolvedFlow {
            nodes: self
                .nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.once()))
                .collect(),
            args: self.args.clone(),
            envs: self.envs.clone(),
        }
    }

    /// Mermaid `flowchart TD` description of the flow: After edges, restart
    /// self-loops, and watch-path nodes (deduplicated by content).
    pub fn mermaid(&self) -> String {
        let mut lines = vec!["flowchart TD".to_string()];
        let mut seen_watches = Vec::new();

        for (id, node) in self.nodes.iter() {
            lines.push(format!("{id}({id})"));

            for trigger in node.triggers.iter() {
                match trigger {
                    Trigger::Once(_) => {}
                    Trigger::After(after) => {
                        for predecessor in after.after.iter() {
                            lines.push(format!("{predecessor} --> {id}"));
                        }
                    }
                    Trigger::Restart(restart) => {
                        lines.push(format!("{id} -->|\u{221e} {}s| {id}", restart.delay));
                    }
                    Trigger::Watch(watch) => {
                        let paths: Vec<String> = watch
                            .watch
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect();
                        let text = paths.join("\n");
                        let h = blake3::hash(text.as_bytes()).to_hex().to_string();
                        let short = &h[..12];
                        if !seen_watches.contains(&h) {
                            seen_watches.push(h.clone());
                            lines.push(format!("w_{short}[(\"{text}\")]"));
                        }
                        lines.push(format!("w_{short} -->|\u{1f441}| {id}"));
                    }
                }
            }
        }

        lines.join("\n  ").trim().to_string()
    }
}

impl Config {
    /// Resolve every flow: inline target/trigger references, dedent commands,
    /// and assign colors to nodes that don't declare one.
    ///
    /// Reference errors are reported even when [`crate::config::validate`]
    /// was skipped.
    pub fn resolve(&self) -> Result<IndexMap<String, ResolvedFlow>> {
        self.flows
            .iter()
            .map(|(id, flow)| {
                let nodes = flow
                    .nodes
                    .iter()
                    .map(|(node_id, node)| {
                        resolve_node(node_id, node, self).map(|n| (node_id.clone(), n))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?;

                Ok((
                    id.clone(),
                    ResolvedFlow {
                        nodes,
                        args: flow.args.clone(),
                        envs: flow.envs.clone(),
                    },
                ))
            })
            .collect()
    }
}

fn resolve_node(id: &str, node: &Node, config: &Config) -> Result<ResolvedNode> {
    let mut target = match &node.target {
        TargetRef::Id(target_id) => config
            .targets
            .get(target_id)
            .ok_or_else(|| {
                SynthError::Config(format!("node '{id}' references unknown target '{target_id}'"))
            })?
            .clone(),
        TargetRef::Inline(target) => target.clone(),
    };
    target.commands = dedent(&target.commands);

    let triggers = node
        .triggers
        .iter()
        .map(|trigger_ref| match trigger_ref {
            TriggerRef::Id(trigger_id) => config
                .triggers
                .get(trigger_id)
                .cloned()
                .ok_or_else(|| {
                    SynthError::Config(format!(
                        "node '{id}' references unknown trigger '{trigger_id}'"
                    ))
                }),
            TriggerRef::Inline(trigger) => Ok(trigger.clone()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedNode {
        id: id.to_string(),
        target,
        args: node.args.clone(),
        envs: node.envs.clone(),
        triggers,
        color: node.color.clone().unwrap_or_else(random_color),
    })
}
