//! Intermediate representation for the Warp kernel JIT.
//!
//! The IR is an SSA-form control-flow graph that uses block parameters
//! instead of phi nodes: every branch edge owns a
//! [`BranchTarget`](ValueKind::BranchTarget) carrying the argument tuple
//! for the destination's parameters. Methods are mutated exclusively
//! through a [`MethodBuilder`]; analyses run over frozen [`Scope`]
//! snapshots.

// Modules defining the graph.
mod block;
mod builder;
mod common;
mod context;
mod method;
mod parameter;
mod printer;
mod scope;
mod terminator;
mod types;
mod value;

// Re-export types at the module level.
pub use block::BlockData;
pub use builder::{
    ArgumentMapper, BlockBuilder, DefaultArgumentMapper, MethodBuilder,
};
pub use common::{BlockId, NodeId, ValueId, ValueRef};
pub use context::{Context, IrEnv, MethodId};
pub use method::{Method, MethodBody};
pub use parameter::ParameterCollection;
pub use printer::Printer;
pub use scope::Scope;
pub use types::{BasicValueType, TypeHandle, TypeKind, TypeStore};
pub use value::{BinaryOp, CompareOp, UnaryOp, ValueData, ValueKind};

// Re-export the shared utility types used throughout the API.
pub use warp_utils::{GetName, Id};
