use crate::method::MethodBody;
use warp_idx::impl_index;

/// Context-global node identity, assigned monotonically by the
/// [`IrEnv`](crate::IrEnv). Two values from different methods never share a
/// node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Arena key for a value inside one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);
impl_index!(ValueId);

/// Arena key for a basic block inside one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
impl_index!(BlockId);

/// A handle to a value that dereferences through replacement chains.
///
/// Operand lists store these instead of raw [`ValueId`]s so that an
/// in-place [`replace`](crate::method::MethodBody::replace_value)
/// propagates to every use site without rewalking the graph. Call sites
/// that need the unresolved target use [`ValueRef::direct`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef(ValueId);

impl ValueRef {
    pub fn new(value: ValueId) -> Self {
        Self(value)
    }

    /// The target as written, ignoring any replacement.
    pub fn direct(&self) -> ValueId {
        self.0
    }

    /// The target after following the replacement chain.
    pub fn resolve(&self, body: &MethodBody) -> ValueId {
        body.resolve(self.0)
    }
}

impl From<ValueId> for ValueRef {
    fn from(value: ValueId) -> Self {
        Self(value)
    }
}
