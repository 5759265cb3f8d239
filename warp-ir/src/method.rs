//! Methods: the top-level containers of the IR.
use crate::block::BlockData;
use crate::common::{BlockId, ValueId};
use crate::context::IrEnv;
use crate::parameter::ParameterCollection;
use crate::types::TypeHandle;
use crate::value::{ValueData, ValueKind};
use warp_idx::IndexedMap;
use warp_utils::{Error, GetName, Id, NameGenerator, WarpResult};

/// The value and block arenas of one method. All graph edges are typed
/// indices into these maps; nothing in the body owns anything else.
#[derive(Debug, Default)]
pub struct MethodBody {
    pub(crate) values: IndexedMap<ValueId, ValueData>,
    pub(crate) blocks: IndexedMap<BlockId, BlockData>,
}

impl MethodBody {
    pub fn value(&self, value: ValueId) -> &ValueData {
        &self.values[value]
    }

    pub fn block(&self, block: BlockId) -> &BlockData {
        &self.blocks[block]
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BlockData)> {
        self.blocks.iter()
    }

    pub fn iter_values(&self) -> impl Iterator<Item = (ValueId, &ValueData)> {
        self.values.iter()
    }

    /// Follow the replacement chain of `value` to its resolved target.
    pub fn resolve(&self, value: ValueId) -> ValueId {
        let mut current = value;
        while let Some(next) = self.values[current].replacement() {
            current = next;
        }
        current
    }

    /// Install a replacement: every subsequent resolution of `value`
    /// lands on `with`. Monotone; re-replacing with the same target is a
    /// no-op and anything else is an error.
    pub fn replace_value(
        &mut self,
        value: ValueId,
        with: ValueId,
    ) -> WarpResult<()> {
        if value == with || self.resolve(with) == value {
            return Err(Error::invalid_state(format!(
                "replacing {} with {} would form a cycle",
                self.values[value].id(),
                self.values[with].id()
            )));
        }
        match self.values[value].replacement() {
            Some(existing) if existing == with => Ok(()),
            Some(_) => Err(Error::invalid_state(format!(
                "value {} is already replaced",
                self.values[value].id()
            ))),
            None => {
                self.values[value].set_replacement(with);
                Ok(())
            }
        }
    }

    /// True iff any body value of the block is side-effecting.
    pub fn block_has_side_effects(&self, block: BlockId) -> bool {
        self.blocks[block].body.iter().any(|value| {
            self.values[value.resolve(self)].kind().has_side_effects()
        })
    }
}

/// A method: ordered function parameters, a return type, an entry block,
/// and the arenas holding its graph.
#[derive(Debug)]
pub struct Method {
    name: Id,
    return_type: TypeHandle,
    pub(crate) params: ParameterCollection,
    entry: BlockId,
    pub(crate) body: MethodBody,
    pub(crate) namegen: NameGenerator,
}

impl Method {
    /// Create a method with an empty entry block. Used by
    /// [`Context::declare`](crate::Context::declare).
    pub(crate) fn new(name: Id, return_type: TypeHandle, env: &IrEnv) -> Self {
        let mut body = MethodBody::default();
        let mut namegen = NameGenerator::default();
        let entry_name = namegen.gen_name("entry");
        let entry = body.blocks.peek_next_key();
        let terminator = body.values.push(ValueData::new_sealed(
            env.new_node_id(),
            ValueKind::BuilderTerminator,
            env.types().void(),
            Some(entry),
            [],
        ));
        body.blocks.push(BlockData::new(entry_name, entry, terminator));
        Self {
            name,
            return_type,
            params: ParameterCollection::for_method(),
            entry,
            body,
            namegen,
        }
    }

    pub fn return_type(&self) -> TypeHandle {
        self.return_type
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    pub fn params(&self) -> &ParameterCollection {
        &self.params
    }

    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Number of blocks that have not been merged away.
    pub fn num_live_blocks(&self) -> usize {
        self.body
            .blocks
            .values()
            .filter(|block| !block.removed)
            .count()
    }
}

impl GetName for Method {
    fn name(&self) -> Id {
        self.name
    }
}
