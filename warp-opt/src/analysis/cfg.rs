//! A petgraph-based view of a method's control-flow graph.
use petgraph::{
    graph::{DiGraph, NodeIndex},
    Direction::{Incoming, Outgoing},
};
use std::collections::HashMap;
use warp_ir::{BlockId, Scope};

/// A directed graph with one node per reachable block and one edge per
/// branch-target edge. Parallel edges are kept: a conditional branch with
/// both arms on the same destination contributes two edges.
pub struct ControlFlowGraph {
    graph: DiGraph<BlockId, ()>,
    nodes: HashMap<BlockId, NodeIndex>,
    entry: NodeIndex,
}

impl ControlFlowGraph {
    pub fn new(scope: &Scope) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for block in scope.blocks() {
            nodes.insert(block, graph.add_node(block));
        }
        let body = scope.method().body();
        for block in scope.blocks() {
            for successor in body.successors(block) {
                graph.add_edge(nodes[&block], nodes[&successor], ());
            }
        }
        let entry = nodes[&scope.entry()];
        Self {
            graph,
            nodes,
            entry,
        }
    }

    pub(crate) fn graph(&self) -> &DiGraph<BlockId, ()> {
        &self.graph
    }

    pub(crate) fn node(&self, block: BlockId) -> NodeIndex {
        self.nodes[&block]
    }

    pub(crate) fn entry_index(&self) -> NodeIndex {
        self.entry
    }

    pub fn entry(&self) -> BlockId {
        self.graph[self.entry]
    }

    /// Predecessor blocks, one entry per incoming edge.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors_directed(self.node(block), Incoming)
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Successor blocks, one entry per outgoing edge.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors_directed(self.node(block), Outgoing)
            .map(|idx| self.graph[idx])
            .collect()
    }

    pub fn num_predecessors(&self, block: BlockId) -> usize {
        self.graph
            .neighbors_directed(self.node(block), Incoming)
            .count()
    }

    pub fn num_successors(&self, block: BlockId) -> usize {
        self.graph
            .neighbors_directed(self.node(block), Outgoing)
            .count()
    }
}
