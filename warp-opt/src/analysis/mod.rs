//! Analyses computed over frozen [`Scope`](warp_ir::Scope) snapshots.
//! Mutating the underlying method invalidates them; consumers rebuild.
mod cfg;
mod dominators;
mod if_infos;

pub use cfg::ControlFlowGraph;
pub use dominators::Dominators;
pub use if_infos::{IfInfo, IfInfos, Variable};
