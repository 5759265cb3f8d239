//! Helpers for traversing the methods of a program.
mod action;
mod construct;
mod post_order;
mod visitor;

pub use action::{Action, VisResult};
pub use construct::{ConstructVisitor, Named, OptValue, PassOpt, ResolvedOpts};
pub use post_order::{MethodTraversal, Order};
pub use visitor::Visitor;
