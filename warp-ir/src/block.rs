//! Basic blocks: an ordered body of non-terminator values, a parameter
//! list, and exactly one terminator.
use crate::common::{BlockId, ValueId, ValueRef};
use crate::parameter::ParameterCollection;
use std::cell::Cell;
use warp_utils::{GPosIdx, GetName, Id};

#[derive(Debug, Clone)]
pub struct BlockData {
    name: Id,
    pub(crate) params: ParameterCollection,
    /// The non-terminator values of the block, in program order.
    pub(crate) body: Vec<ValueRef>,
    /// Always set; freshly created blocks carry a
    /// [`BuilderTerminator`](crate::ValueKind::BuilderTerminator).
    pub(crate) terminator: ValueId,
    /// Source location this block lowers, when known.
    seq_point: GPosIdx,
    /// Visit bit used by analyses; compared against a marker from the
    /// environment's allocator.
    pub(crate) marker: Cell<u64>,
    /// Set once the block has been merged away.
    pub(crate) removed: bool,
}

impl BlockData {
    pub(crate) fn new(
        name: Id,
        block: BlockId,
        terminator: ValueId,
    ) -> Self {
        Self {
            name,
            params: ParameterCollection::for_block(block),
            body: Vec::new(),
            terminator,
            seq_point: GPosIdx::UNKNOWN,
            marker: Cell::new(0),
            removed: false,
        }
    }

    pub fn params(&self) -> &ParameterCollection {
        &self.params
    }

    pub fn body(&self) -> &[ValueRef] {
        &self.body
    }

    pub fn terminator(&self) -> ValueId {
        self.terminator
    }

    pub fn seq_point(&self) -> GPosIdx {
        self.seq_point
    }

    pub fn set_seq_point(&mut self, pos: GPosIdx) {
        self.seq_point = pos;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl GetName for BlockData {
    fn name(&self) -> Id {
        self.name
    }
}
