//! Typed index handles and dense arena maps.
//!
//! The IR wires every edge as a typed index into an arena instead of a
//! pointer so that cyclic structures (a block parameter fed by a
//! predecessor's branch argument) never form ownership cycles.
mod index_trait;
mod indexed_map;
mod macros;

pub use index_trait::{IndexRange, IndexRangeIterator, IndexRef};
pub use indexed_map::IndexedMap;
