// src/flow/graph.rs

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;

use crate::config::ResolvedFlow;
use crate::errors::{Result, SynthError};

/// Directed graph over node ids with an edge `p -> n` iff some trigger of `n`
/// is `After(..p..)`.
///
/// Construction runs cycle detection once and fails with
/// [`SynthError::CyclicFlow`] when the flow contains one, so a constructed
/// graph is always acyclic.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    /// Build the dependency graph for a resolved flow.
    pub fn from_flow(flow: &ResolvedFlow) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for id in flow.nodes.keys() {
            let index = graph.add_node(id.clone());
            indices.insert(id.clone(), index);
        }

        for (id, node) in flow.nodes.iter() {
            for predecessor in node.predecessors() {
                if let (Some(&from), Some(&to)) = (indices.get(predecessor), indices.get(id)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let built = Self { graph, indices };

        if let Some(cycle) = built.has_cycle() {
            return Err(SynthError::CyclicFlow(cycle));
        }

        Ok(built)
    }

    /// All node ids, in flow order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|i| self.graph[i].as_str())
    }

    /// Direct predecessors (the nodes `id` waits for).
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct successors (the nodes waiting for `id`).
    pub fn successors(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.indices.get(id) else {
            return Vec::new();
        };

        self.graph
            .neighbors_directed(index, direction)
            .map(|neighbor| self.graph[neighbor].clone())
            .collect()
    }

    /// All transitive predecessors of `id`, excluding `id` itself.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let Some(&start) = self.indices.get(id) else {
            return Vec::new();
        };

        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut found = Vec::new();
        while let Some(index) = bfs.next(reversed) {
            if index != start {
                found.push(self.graph[index].clone());
            }
        }
        found
    }

    /// All transitive successors of `id`, excluding `id` itself.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let Some(&start) = self.indices.get(id) else {
            return Vec::new();
        };

        let mut bfs = Bfs::new(&self.graph, start);
        let mut found = Vec::new();
        while let Some(index) = bfs.next(&self.graph) {
            if index != start {
                found.push(self.graph[index].clone());
            }
        }
        found
    }

    /// Search for a cycle; returns the ids along the loop (without repeating
    /// the first id at the end).
    ///
    /// Always `None` for a graph returned by [`FlowGraph::from_flow`].
    pub fn has_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        let mut marks = vec![Mark::White; self.graph.node_count()];

        for root in self.graph.node_indices() {
            if marks[root.index()] != Mark::White {
                continue;
            }

            // Iterative DFS keeping the gray path on an explicit stack so the
            // cycle can be read back out of it.
            let mut path: Vec<NodeIndex> = Vec::new();
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = Vec::new();

            let successors = |index: NodeIndex| {
                self.graph
                    .neighbors_directed(index, Direction::Outgoing)
                    .collect::<Vec<_>>()
            };

            marks[root.index()] = Mark::Gray;
            path.push(root);
            stack.push((root, successors(root)));

            while let Some((_, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => match marks[next.index()] {
                        Mark::Gray => {
                            let loop_start = path
                                .iter()
                                .position(|&n| n == next)
                                .unwrap_or(0);
                            return Some(
                                path[loop_start..]
                                    .iter()
                                    .map(|&n| self.graph[n].clone())
                                    .collect(),
                            );
                        }
                        Mark::White => {
                            marks[next.index()] = Mark::Gray;
                            path.push(next);
                            stack.push((next, successors(next)));
                        }
                        Mark::Black => {}
                    },
                    None => {
                        let (done, _) = stack.pop().unwrap_or((root, Vec::new()));
                        marks[done.index()] = Mark::Black;
                        path.pop();
                    }
                }
            }
        }

        None
    }
}
