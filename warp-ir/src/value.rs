//! Values: the nodes of the IR graph.
use crate::common::{BlockId, NodeId, ValueRef};
use crate::types::TypeHandle;
use smallvec::SmallVec;
use warp_utils::{Error, Id, WarpResult};

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Comparison operators. Comparisons always produce an `i1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        };
        write!(f, "{name}")
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
        };
        write!(f, "{name}")
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        };
        write!(f, "{name}")
    }
}

/// The discriminant of a value. Dispatch over kinds is always an
/// exhaustive `match` so that adding a kind is a compile error everywhere
/// it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A function or block parameter. `index` is the position in the
    /// owner's parameter list; the id is an opaque debug name.
    Parameter { index: usize, name: Id },
    /// A primitive constant. The raw bits are interpreted through the
    /// value's type.
    Primitive { raw: u64 },
    /// The null value of its type; stands in for "no value" on void
    /// returns.
    Null,
    Unary { op: UnaryOp },
    Binary { op: BinaryOp },
    Compare { op: CompareOp },
    /// `select(condition, true_value, false_value)`.
    Predicate,
    /// Memory read through an integer address.
    Load,
    /// Memory write through an integer address.
    Store,
    /// Call of another method by name.
    Call { callee: Id },
    Return,
    UnconditionalBranch,
    ConditionalBranch,
    SwitchBranch,
    /// Transient terminator installed on every block at creation; must be
    /// replaced by a real terminator before any analysis runs.
    BuilderTerminator,
    /// An edge object between a terminator and a destination block. Its
    /// operands are the block-argument tuple for the destination's
    /// parameters. Never shared between two terminators.
    BranchTarget { dest: BlockId },
}

impl ValueKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            ValueKind::Return
                | ValueKind::UnconditionalBranch
                | ValueKind::ConditionalBranch
                | ValueKind::SwitchBranch
                | ValueKind::BuilderTerminator
        )
    }

    pub fn has_side_effects(&self) -> bool {
        matches!(self, ValueKind::Store | ValueKind::Call { .. })
    }

    /// Short textual prefix for the debug surface.
    pub fn prefix(&self) -> &'static str {
        match self {
            ValueKind::Parameter { .. } => "param",
            ValueKind::Primitive { .. } => "const",
            ValueKind::Null => "null",
            ValueKind::Unary { .. } => "unary",
            ValueKind::Binary { .. } => "binary",
            ValueKind::Compare { .. } => "cmp",
            ValueKind::Predicate => "pred",
            ValueKind::Load => "ld",
            ValueKind::Store => "st",
            ValueKind::Call { .. } => "call",
            ValueKind::Return => "ret",
            ValueKind::UnconditionalBranch => "branch",
            ValueKind::ConditionalBranch => "branch",
            ValueKind::SwitchBranch => "switch",
            ValueKind::BuilderTerminator => "builder",
            ValueKind::BranchTarget { .. } => "target",
        }
    }
}

/// A node in the value graph. Owned by its method's arena; all edges out
/// of it are [`ValueRef`]s.
#[derive(Debug, Clone)]
pub struct ValueData {
    id: NodeId,
    kind: ValueKind,
    ty: TypeHandle,
    block: Option<BlockId>,
    operands: SmallVec<[ValueRef; 2]>,
    sealed: bool,
    replacement: Option<crate::common::ValueId>,
}

impl ValueData {
    /// An under-construction value whose operands are appended later.
    /// Only parameters and branch targets use this path.
    pub(crate) fn new_unsealed(
        id: NodeId,
        kind: ValueKind,
        ty: TypeHandle,
        block: Option<BlockId>,
    ) -> Self {
        Self {
            id,
            kind,
            ty,
            block,
            operands: SmallVec::new(),
            sealed: false,
            replacement: None,
        }
    }

    /// A value sealed at construction with all of its operands.
    pub(crate) fn new_sealed(
        id: NodeId,
        kind: ValueKind,
        ty: TypeHandle,
        block: Option<BlockId>,
        operands: impl IntoIterator<Item = ValueRef>,
    ) -> Self {
        Self {
            id,
            kind,
            ty,
            block,
            operands: operands.into_iter().collect(),
            sealed: true,
            replacement: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ValueKind {
        &mut self.kind
    }

    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    /// The owning basic block. `None` for function parameters, shared
    /// constants, and branch targets.
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub(crate) fn set_block(&mut self, block: Option<BlockId>) {
        self.block = block;
    }

    pub fn operands(&self) -> &[ValueRef] {
        &self.operands
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn is_replaced(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn replacement(&self) -> Option<crate::common::ValueId> {
        self.replacement
    }

    pub(crate) fn set_replacement(&mut self, target: crate::common::ValueId) {
        self.replacement = Some(target);
    }

    /// Append an operand to an under-construction value.
    pub(crate) fn add_operand(&mut self, operand: ValueRef) -> WarpResult<()> {
        if self.sealed {
            return Err(Error::invalid_state(format!(
                "cannot add an operand to sealed value {}",
                self.id
            )));
        }
        self.operands.push(operand);
        Ok(())
    }

    /// Freeze the operand list. Idempotent.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn remove_operand(&mut self, index: usize) {
        self.operands.remove(index);
    }

    /// The parameter index, for parameter values.
    pub fn parameter_index(&self) -> Option<usize> {
        match &self.kind {
            ValueKind::Parameter { index, .. } => Some(*index),
            _ => None,
        }
    }
}
