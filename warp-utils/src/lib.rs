//! Shared utilities for the Warp kernel JIT.
mod errors;
mod id;
mod namegenerator;
mod position;

pub use errors::{Error, MultiError, WarpResult};
pub use id::{GetName, Id};
pub use namegenerator::NameGenerator;
pub use position::{FileIdx, GPosIdx, GlobalPositionTable, PosIdx};
