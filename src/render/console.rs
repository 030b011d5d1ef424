// src/render/console.rs

use std::collections::HashMap;

use chrono::Local;
use crossterm::style::{Color, Stylize};

use crate::config::ResolvedFlow;
use crate::engine::messages::{ChangeKind, Message, NodeId};
use crate::flow::{FlowState, Status};
use crate::render::Renderer;

/// `HH:MM:SS ` plus trailing separator spaces around the node id.
const TIMESTAMP_WIDTH: usize = 9;
const SEPARATOR_WIDTH: usize = 2;

const FALLBACK_WIDTH: usize = 80;

/// Line-oriented console renderer: command output with colored per-node
/// prefixes, dim lifecycle lines, and a final status table.
pub struct ConsoleRenderer {
    colors: HashMap<NodeId, Color>,
    prefix_width: usize,
}

impl ConsoleRenderer {
    pub fn new(flow: &ResolvedFlow) -> Self {
        let colors = flow
            .nodes
            .values()
            .map(|node| (node.id.clone(), parse_color(&node.color)))
            .collect();

        let longest_id = flow.nodes.keys().map(String::len).max().unwrap_or(0);

        Self {
            colors,
            prefix_width: TIMESTAMP_WIDTH + longest_id + SEPARATOR_WIDTH,
        }
    }

    fn prefix(&self, id: &str) -> String {
        let timestamp = Local::now().format("%H:%M:%S");
        format!("{:<width$}", format!("{timestamp} {id}"), width = self.prefix_width)
    }

    fn color(&self, id: &str) -> Color {
        self.colors.get(id).copied().unwrap_or(Color::White)
    }

    fn print_line(&self, id: &str, body: String) {
        let prefix = self.prefix(id).with(self.color(id));
        println!("{prefix}{body}");
    }
}

impl Renderer for ConsoleRenderer {
    fn handle_message(&mut self, message: &Message, _state: &FlowState) {
        match message {
            Message::ExecutionOutput { id, text } => {
                self.print_line(id, text.clone());
            }
            Message::ExecutionStarted { id, pid } => {
                self.print_line(id, format!("Node {id} started (pid {pid})").dim().to_string());
            }
            Message::ExecutionCompleted {
                id,
                pid,
                exit_code,
                duration,
            } => {
                let code = if *exit_code == 0 {
                    exit_code.to_string().with(Color::Green)
                } else {
                    exit_code.to_string().with(Color::Red)
                };
                let body = format!(
                    "Node {id} (pid {pid}) exited with code {code} after {:.3}s",
                    duration.as_secs_f64()
                );
                self.print_line(id, body.dim().to_string());
            }
            Message::WatchPathChanged { id, changes } => {
                let changed = changes
                    .iter()
                    .map(|change| {
                        let color = match change.kind {
                            ChangeKind::Added => Color::Green,
                            ChangeKind::Modified => Color::Yellow,
                            ChangeKind::Deleted => Color::Red,
                        };
                        change.path.display().to_string().with(color).to_string()
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let body = format!("Running node {id} due to detected changes: {changed}");
                self.print_line(id, body.dim().to_string());
            }
            Message::Debug { id, text } => match id {
                Some(id) => self.print_line(id, text.clone().dim().to_string()),
                None => println!("{}", text.clone().dim()),
            },
            Message::RestartElapsed { .. } | Message::Heartbeat | Message::Quit => {}
        }
    }

    fn handle_shutdown_start(&mut self) {
        println!("{}", "Shutting down...".dim());
    }

    fn handle_shutdown_end(&mut self) {}

    fn prefix_width(&self) -> usize {
        self.prefix_width
    }

    fn console_width(&self) -> usize {
        crossterm::terminal::size()
            .map(|(columns, _rows)| columns as usize)
            .unwrap_or(FALLBACK_WIDTH)
    }

    fn state_summary(&self, state: &FlowState) -> String {
        let mut lines = Vec::new();
        for (id, status) in state.statuses() {
            let status = match status {
                Status::Succeeded => status.display().with(Color::Green),
                Status::Failed => status.display().with(Color::Red),
                _ => status.display().with(Color::Yellow),
            };
            lines.push(format!(
                "  {}  {status}",
                format!("{:<width$}", id, width = self.prefix_width - TIMESTAMP_WIDTH)
                    .with(self.color(id))
            ));
        }
        lines.join("\n")
    }
}

/// `"#rrggbb"` to a crossterm color; anything unparsable falls back to white.
fn parse_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return Color::White;
    }

    match (
        u8::from_str_radix(&hex[0..2], 16),
        u8::from_str_radix(&hex[2..4], 16),
        u8::from_str_radix(&hex[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb { r, g, b },
        _ => Color::White,
    }
}
