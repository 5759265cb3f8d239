//! Scopes: frozen snapshots of a method's reachable graph.
use crate::common::BlockId;
use crate::context::IrEnv;
use crate::method::Method;
use crate::value::ValueKind;
use warp_utils::{Error, GetName, WarpResult};

/// A deterministically ordered snapshot of a method's reachable blocks in
/// reverse post order. Read-only and cheap to discard; mutating the
/// method invalidates it.
#[derive(Debug)]
pub struct Scope<'m> {
    method: &'m Method,
    rpo: Vec<BlockId>,
}

impl<'m> Scope<'m> {
    /// Walk the reachable blocks from the entry. Fails when a reachable
    /// block still carries a builder terminator, so no analysis ever
    /// observes a transient terminator.
    pub fn new(method: &'m Method, env: &IrEnv) -> WarpResult<Self> {
        let marker = env.new_marker();
        let body = method.body();
        let entry = method.entry_block();

        let mut post = Vec::new();
        let mut stack: Vec<(BlockId, usize)> = Vec::new();
        body.block(entry).marker.set(marker);
        Self::check_terminator(method, entry)?;
        stack.push((entry, 0));

        while let Some((block, next)) = stack.pop() {
            let successors = body.successors(block);
            if next < successors.len() {
                stack.push((block, next + 1));
                let successor = successors[next];
                let data = body.block(successor);
                if data.marker.get() != marker {
                    data.marker.set(marker);
                    Self::check_terminator(method, successor)?;
                    stack.push((successor, 0));
                }
            } else {
                post.push(block);
            }
        }

        post.reverse();
        Ok(Self { method, rpo: post })
    }

    fn check_terminator(method: &Method, block: BlockId) -> WarpResult<()> {
        let body = method.body();
        let terminator = body.block(block).terminator();
        match body.value(body.resolve(terminator)).kind() {
            ValueKind::BuilderTerminator => {
                Err(Error::invalid_state(format!(
                    "block `{}' still carries a builder terminator",
                    body.block(block).name()
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn method(&self) -> &'m Method {
        self.method
    }

    /// The reachable blocks in reverse post order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.rpo.iter().copied()
    }

    pub fn entry(&self) -> BlockId {
        self.rpo[0]
    }

    pub fn len(&self) -> usize {
        self.rpo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rpo.is_empty()
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.rpo.contains(&block)
    }
}
