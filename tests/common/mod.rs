// tests/common/mod.rs

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Instant;

use synthesize::config::{After, Once, Restart, Target, Trigger, Watch};
use synthesize::config::{ResolvedFlow, ResolvedNode};
use synthesize::engine::Message;
use synthesize::flow::FlowState;
use synthesize::render::Renderer;

/// Build a node with a single `once` trigger.
pub fn node(id: &str, commands: &str) -> ResolvedNode {
    node_with_triggers(id, commands, vec![once()])
}

pub fn node_with_triggers(id: &str, commands: &str, triggers: Vec<Trigger>) -> ResolvedNode {
    ResolvedNode {
        id: id.to_string(),
        target: Target {
            commands: commands.to_string(),
            ..Target::default()
        },
        args: Default::default(),
        envs: Default::default(),
        triggers,
        color: "#80c47e".to_string(),
    }
}

pub fn flow(nodes: Vec<ResolvedNode>) -> ResolvedFlow {
    ResolvedFlow {
        nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        args: Default::default(),
        envs: Default::default(),
    }
}

pub fn once() -> Trigger {
    Trigger::Once(Once {})
}

pub fn after(ids: &[&str]) -> Trigger {
    Trigger::After(After {
        after: ids.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn restart(delay: f64) -> Trigger {
    Trigger::Restart(Restart { delay })
}

pub fn watch(paths: &[&str]) -> Trigger {
    Trigger::Watch(Watch {
        watch: paths.iter().map(std::path::PathBuf::from).collect(),
    })
}

/// Renderer that records every dispatched message (with its observation
/// time) instead of printing.
pub struct RecordingRenderer {
    messages: Arc<Mutex<Vec<(Instant, Message)>>>,
}

impl RecordingRenderer {
    pub fn new(messages: Arc<Mutex<Vec<(Instant, Message)>>>) -> Self {
        Self { messages }
    }
}

impl Renderer for RecordingRenderer {
    fn handle_message(&mut self, message: &Message, _state: &FlowState) {
        self.messages
            .lock()
            .unwrap()
            .push((Instant::now(), message.clone()));
    }

    fn prefix_width(&self) -> usize {
        0
    }

    fn console_width(&self) -> usize {
        80
    }

    fn state_summary(&self, state: &FlowState) -> String {
        state
            .statuses()
            .map(|(id, status)| format!("{id}: {}", status.display()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Texts of all `ExecutionOutput` messages, in order.
pub fn output_texts(messages: &[(Instant, Message)]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|(_, m)| match m {
            Message::ExecutionOutput { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Observation times of `ExecutionCompleted` messages for one node.
pub fn completions_of(messages: &[(Instant, Message)], node: &str) -> Vec<Instant> {
    messages
        .iter()
        .filter_map(|(at, m)| match m {
            Message::ExecutionCompleted { id, .. } if id == node => Some(*at),
            _ => None,
        })
        .collect()
}
