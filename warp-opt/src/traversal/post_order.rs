//! Orders methods for traversal over the call graph.
use petgraph::{algo, graph::DiGraph, graph::NodeIndex};
use std::collections::HashMap;
use warp_ir::{Context, Id, ValueKind};

/// The iteration order in which methods are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Declaration order.
    #[default]
    No,
    /// Callees before callers. Falls back to declaration order when the
    /// call graph is cyclic.
    Post,
}

/// A method traversal over a program in a chosen [`Order`].
pub struct MethodTraversal {
    order: Vec<Id>,
}

impl MethodTraversal {
    pub fn new(ctx: &Context, order: Order) -> Self {
        let names = ctx.method_names();
        match order {
            Order::No => Self { order: names },
            Order::Post => {
                let mut graph: DiGraph<Id, ()> = DiGraph::new();
                let mut nodes: HashMap<Id, NodeIndex> = HashMap::new();
                for name in &names {
                    nodes.insert(*name, graph.add_node(*name));
                }
                for name in &names {
                    let method = ctx
                        .find_method(*name)
                        .unwrap_or_else(|| unreachable!());
                    for (_, data) in method.body().iter_values() {
                        if let ValueKind::Call { callee } = data.kind() {
                            if let Some(callee_idx) = nodes.get(callee) {
                                graph.add_edge(
                                    nodes[name],
                                    *callee_idx,
                                    (),
                                );
                            }
                        }
                    }
                }
                match algo::toposort(&graph, None) {
                    Ok(sorted) => Self {
                        // edges point caller -> callee, so reversing the
                        // topological order visits callees first
                        order: sorted
                            .into_iter()
                            .rev()
                            .map(|idx| graph[idx])
                            .collect(),
                    },
                    Err(_) => {
                        log::warn!(
                            "call graph is cyclic; traversing methods in declaration order"
                        );
                        Self { order: names }
                    }
                }
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = Id> + '_ {
        self.order.iter().copied()
    }
}
