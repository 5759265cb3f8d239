//! The dominator tree of a control-flow graph.
use super::ControlFlowGraph;
use petgraph::algo::dominators;
use std::collections::{HashMap, HashSet};
use warp_ir::BlockId;

/// Immediate-dominator relation over the blocks of a
/// [`ControlFlowGraph`]. Every block dominates itself; the entry block
/// has no immediate dominator.
pub struct Dominators {
    idom: HashMap<BlockId, BlockId>,
    entry: BlockId,
}

impl Dominators {
    pub fn new(cfg: &ControlFlowGraph) -> Self {
        let tree = dominators::simple_fast(cfg.graph(), cfg.entry_index());
        let mut idom = HashMap::new();
        for idx in cfg.graph().node_indices() {
            if let Some(dominator) = tree.immediate_dominator(idx) {
                idom.insert(cfg.graph()[idx], cfg.graph()[dominator]);
            }
        }
        Self {
            idom,
            entry: cfg.entry(),
        }
    }

    /// The immediate dominator of `block`, or `None` for the entry.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    /// True iff `dominator` dominates `block`. Reflexive.
    pub fn dominates(&self, dominator: BlockId, block: BlockId) -> bool {
        let mut current = block;
        loop {
            if current == dominator {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// The closest block that dominates both `a` and `b`. A block counts
    /// as its own dominator, so `common_dominator(h, h)` is `h`.
    pub fn common_dominator(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        let mut ancestors = HashSet::new();
        let mut current = a;
        loop {
            ancestors.insert(current);
            match self.immediate_dominator(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        let mut current = b;
        loop {
            if ancestors.contains(&current) {
                return Some(current);
            }
            current = self.immediate_dominator(current)?;
        }
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }
}
