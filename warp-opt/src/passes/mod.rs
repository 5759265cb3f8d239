//! Transformation passes.
mod dead_code;
mod if_conversion;

pub use dead_code::DeadCodeElimination;
pub use if_conversion::IfConversion;
