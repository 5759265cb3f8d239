//! Views over terminator values and their branch targets.
//!
//! Terminators carry two logical operand groups: the argument tuple that
//! feeds the terminator's semantics, followed by the branch-target tuple.
//! Each kind knows its own split.
use crate::common::{BlockId, ValueId, ValueRef};
use crate::method::MethodBody;
use crate::value::{ValueData, ValueKind};
use smallvec::SmallVec;
use warp_utils::{Error, WarpResult};

impl ValueData {
    /// How many leading operands are semantic arguments rather than
    /// branch targets. Only meaningful for terminators.
    fn argument_split(&self) -> usize {
        match self.kind() {
            ValueKind::Return => 1,
            ValueKind::UnconditionalBranch => 0,
            ValueKind::ConditionalBranch => 1,
            ValueKind::SwitchBranch => 1,
            ValueKind::BuilderTerminator => 0,
            _ => 0,
        }
    }

    /// The terminator's semantic arguments (condition, selector, return
    /// value).
    pub fn argument_refs(&self) -> &[ValueRef] {
        if !self.kind().is_terminator() {
            return &[];
        }
        &self.operands()[..self.argument_split()]
    }

    /// The terminator's branch-target operands.
    pub fn target_refs(&self) -> &[ValueRef] {
        if !self.kind().is_terminator() {
            return &[];
        }
        &self.operands()[self.argument_split()..]
    }

    /// The destination of a branch-target value.
    pub fn destination(&self) -> Option<BlockId> {
        match self.kind() {
            ValueKind::BranchTarget { dest } => Some(*dest),
            _ => None,
        }
    }
}

impl MethodBody {
    /// The branch-target values of a block's terminator.
    pub fn terminator_targets(
        &self,
        block: BlockId,
    ) -> SmallVec<[ValueId; 2]> {
        let terminator = self.block(block).terminator;
        self.value(terminator)
            .target_refs()
            .iter()
            .map(|target| target.resolve(self))
            .collect()
    }

    /// The successor blocks of a block, in target order. Empty for
    /// returns and for blocks still carrying a builder terminator.
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 2]> {
        self.terminator_targets(block)
            .into_iter()
            .filter_map(|target| self.value(target).destination())
            .collect()
    }

    /// The branch target of `block`'s terminator that reaches `dest`, if
    /// any.
    pub fn target_to(&self, block: BlockId, dest: BlockId) -> Option<ValueId> {
        self.terminator_targets(block)
            .into_iter()
            .find(|target| self.value(*target).destination() == Some(dest))
    }

    /// The true-edge target of a conditional branch.
    pub fn true_target(&self, branch: ValueId) -> WarpResult<ValueId> {
        self.conditional_target(branch, 0)
    }

    /// The false-edge target of a conditional branch.
    pub fn false_target(&self, branch: ValueId) -> WarpResult<ValueId> {
        self.conditional_target(branch, 1)
    }

    fn conditional_target(
        &self,
        branch: ValueId,
        index: usize,
    ) -> WarpResult<ValueId> {
        let value = self.value(branch);
        match value.kind() {
            ValueKind::ConditionalBranch => {
                Ok(value.target_refs()[index].resolve(self))
            }
            _ => Err(Error::invalid_argument(format!(
                "value {} is not a conditional branch",
                value.id()
            ))),
        }
    }

    /// The return value fed to a return terminator, resolved. `None` when
    /// the method returns void.
    pub fn return_value(&self, terminator: ValueId) -> Option<ValueId> {
        let value = self.value(terminator);
        match value.kind() {
            ValueKind::Return => {
                let ret = value.argument_refs()[0].resolve(self);
                match self.value(ret).kind() {
                    ValueKind::Null => None,
                    _ => Some(ret),
                }
            }
            _ => None,
        }
    }
}
