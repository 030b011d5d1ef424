// src/flow/state.rs

use indexmap::IndexMap;
use tracing::debug;

use crate::config::{ResolvedFlow, ResolvedNode};
use crate::errors::Result;
use crate::flow::graph::FlowGraph;

/// Lifecycle status of one node.
///
/// Succeeded/Failed are terminal for nodes without repeating triggers; nodes
/// with a Restart or Watch trigger cycle back to Pending through Waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not yet scheduled (or invalidated and due to run again).
    Pending,
    /// Between a Restart-node's exit and its re-queue into Pending.
    Waiting,
    /// Handed to the executor; the child has not reported in yet.
    Starting,
    /// The child process is running.
    Running,
    Succeeded,
    Failed,
}

impl Status {
    pub fn display(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Waiting => "Waiting",
            Status::Starting => "Starting",
            Status::Running => "Running",
            Status::Succeeded => "Succeeded",
            Status::Failed => "Failed",
        }
    }
}

/// Per-node status table plus the dependency graph.
///
/// Only the orchestrator mutates statuses; everything here is synchronous and
/// single-writer, so no locking is involved.
#[derive(Debug, Clone)]
pub struct FlowState {
    flow: ResolvedFlow,
    graph: FlowGraph,
    statuses: IndexMap<String, Status>,
}

impl FlowState {
    /// Build the graph and the initial (all-Pending) status table.
    ///
    /// Fails with [`crate::errors::SynthError::CyclicFlow`] when the flow's
    /// After-edges contain a cycle; no state is created in that case.
    pub fn from_flow(flow: &ResolvedFlow) -> Result<FlowState> {
        let graph = FlowGraph::from_flow(flow)?;

        Ok(FlowState {
            flow: flow.clone(),
            graph,
            statuses: flow
                .nodes
                .keys()
                .map(|id| (id.clone(), Status::Pending))
                .collect(),
        })
    }

    pub fn flow(&self) -> &ResolvedFlow {
        &self.flow
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn node(&self, id: &str) -> Option<&ResolvedNode> {
        self.flow.nodes.get(id)
    }

    pub fn status(&self, id: &str) -> Status {
        self.statuses.get(id).copied().unwrap_or(Status::Pending)
    }

    /// Statuses in flow order.
    pub fn statuses(&self) -> impl Iterator<Item = (&str, Status)> {
        self.statuses.iter().map(|(id, &status)| (id.as_str(), status))
    }

    /// Pending nodes whose every ancestor is Succeeded or Waiting.
    ///
    /// Waiting counts as "good enough" so that descendants of a restarting
    /// node can still progress; restart loops are not blocking dependencies.
    pub fn ready_nodes(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|(id, status)| {
                **status == Status::Pending
                    && self.graph.ancestors(id).iter().all(|ancestor| {
                        matches!(
                            self.status(ancestor),
                            Status::Succeeded | Status::Waiting
                        )
                    })
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn mark(&mut self, ids: &[String], status: Status) {
        for id in ids {
            self.mark_one(id, status);
        }
    }

    pub fn mark_one(&mut self, id: &str, status: Status) {
        if let Some(entry) = self.statuses.get_mut(id) {
            debug!(node = %id, from = entry.display(), to = status.display(), "status change");
            *entry = status;
        }
    }

    pub fn mark_success(&mut self, id: &str) {
        self.mark_one(id, Status::Succeeded);
    }

    pub fn mark_failure(&mut self, id: &str) {
        self.mark_one(id, Status::Failed);
    }

    pub fn mark_pending(&mut self, id: &str) {
        self.mark_one(id, Status::Pending);
    }

    pub fn mark_running(&mut self, id: &str) {
        self.mark_one(id, Status::Running);
    }

    pub fn mark_starting(&mut self, id: &str) {
        self.mark_one(id, Status::Starting);
    }

    pub fn mark_waiting(&mut self, id: &str) {
        self.mark_one(id, Status::Waiting);
    }

    /// Direct successors of `id` in the dependency graph.
    pub fn children(&self, id: &str) -> Vec<String> {
        self.graph.successors(id)
    }

    /// All transitive successors of `id`.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        self.graph.descendants(id)
    }

    pub fn all_succeeded(&self) -> bool {
        self.statuses.values().all(|&s| s == Status::Succeeded)
    }

    /// The single termination predicate: no node carries a repeating trigger,
    /// nothing is ready, and nothing is live.
    pub fn no_more_work_possible(&self) -> bool {
        if self.flow.nodes.values().any(ResolvedNode::has_repeating_trigger) {
            return false;
        }

        let any_live = self
            .statuses
            .values()
            .any(|&s| matches!(s, Status::Running | Status::Starting));

        !any_live && self.ready_nodes().is_empty()
    }
}
