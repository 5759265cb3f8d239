//! Builders: the only mutation surface over a method's graph.
//!
//! A [`MethodBuilder`] holds the `&mut` window over one method; at most
//! one can be live at a time. Per-block mutation goes through
//! [`BlockBuilder`] proxies handed out by the method builder. Dropping
//! the method builder abandons the commit protocol; [`MethodBuilder::finish`]
//! runs it: seal open branch targets, drop branch arguments whose
//! destination parameter was replaced, sweep replaced parameters, and
//! compact the block bodies.
use crate::block::BlockData;
use crate::common::{BlockId, ValueId, ValueRef};
use crate::context::IrEnv;
use crate::method::{Method, MethodBody};
use crate::scope::Scope;
use crate::types::{BasicValueType, TypeHandle};
use crate::value::{BinaryOp, CompareOp, UnaryOp, ValueData, ValueKind};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use warp_utils::{Error, GPosIdx, GetName, Id, WarpResult};

/// Decides, per argument index, whether a branch-target argument is kept
/// when the builder commits. The default keeps an argument iff the
/// destination parameter at that position has not been replaced, so that
/// arguments and parameters are dropped in lock-step.
pub trait ArgumentMapper {
    fn can_map_block_argument(
        &self,
        body: &MethodBody,
        target: ValueId,
        index: usize,
    ) -> bool;
}

/// The lock-step mapper used by [`MethodBuilder::finish`].
pub struct DefaultArgumentMapper;

impl ArgumentMapper for DefaultArgumentMapper {
    fn can_map_block_argument(
        &self,
        body: &MethodBody,
        target: ValueId,
        index: usize,
    ) -> bool {
        let Some(dest) = body.value(target).destination() else {
            return true;
        };
        match body.block(dest).params().get(index) {
            Some(param) => !body.value(param).is_replaced(),
            None => true,
        }
    }
}

/// Per-block builder state: the insertion cursor, scheduled removals, and
/// the open branch-target builders of the block's current terminator,
/// keyed by destination.
#[derive(Debug, Default)]
struct BlockState {
    /// `None` means end-of-block.
    cursor: Option<usize>,
    pending_removals: HashSet<ValueId>,
    targets: HashMap<BlockId, ValueId>,
}

/// The single mutation window over one method.
pub struct MethodBuilder<'a> {
    method: &'a mut Method,
    env: &'a IrEnv,
    states: HashMap<BlockId, BlockState>,
}

impl<'a> MethodBuilder<'a> {
    pub fn new(method: &'a mut Method, env: &'a IrEnv) -> Self {
        Self {
            method,
            env,
            states: HashMap::new(),
        }
    }

    pub fn env(&self) -> &IrEnv {
        self.env
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn entry_block(&self) -> BlockId {
        self.method.entry_block()
    }

    /// Create an empty block carrying a builder terminator.
    pub fn create_block(&mut self, prefix: &str) -> BlockId {
        let name = self.method.namegen.gen_name(prefix);
        let body = &mut self.method.body;
        let block = body.blocks.peek_next_key();
        let terminator = body.values.push(ValueData::new_sealed(
            self.env.new_node_id(),
            ValueKind::BuilderTerminator,
            self.env.types().void(),
            Some(block),
            [],
        ));
        body.blocks.push(BlockData::new(name, block, terminator));
        block
    }

    /// Append a function parameter to the method.
    pub fn create_function_parameter(
        &mut self,
        ty: TypeHandle,
        name: Id,
    ) -> ValueId {
        let mut params = std::mem::take(&mut self.method.params);
        let param =
            params.create_parameter(&mut self.method.body, self.env, ty, name);
        self.method.params = params;
        param
    }

    /// Append a block parameter to `block`.
    pub fn create_block_parameter(
        &mut self,
        block: BlockId,
        ty: TypeHandle,
        name: Id,
    ) -> ValueId {
        let mut params =
            std::mem::take(&mut self.method.body.blocks[block].params);
        let param =
            params.create_parameter(&mut self.method.body, self.env, ty, name);
        self.method.body.blocks[block].params = params;
        param
    }

    /// Insert a block parameter at the front of `block`'s list,
    /// renumbering the rest.
    pub fn create_block_parameter_at_front(
        &mut self,
        block: BlockId,
        ty: TypeHandle,
        name: Id,
    ) -> ValueId {
        let mut params =
            std::mem::take(&mut self.method.body.blocks[block].params);
        let param = params.create_parameter_at_front(
            &mut self.method.body,
            self.env,
            ty,
            name,
        );
        self.method.body.blocks[block].params = params;
        param
    }

    /// Attach a source location to a block as its sequence point.
    pub fn set_seq_point(&mut self, block: BlockId, pos: GPosIdx) {
        self.method.body.blocks[block].set_seq_point(pos);
    }

    /// Remove a block parameter directly, renumbering the rest. Prefer
    /// replacement plus the commit sweep when branch arguments still feed
    /// the slot.
    pub fn remove_block_parameter(
        &mut self,
        block: BlockId,
        param: ValueId,
    ) -> WarpResult<()> {
        let mut params =
            std::mem::take(&mut self.method.body.blocks[block].params);
        let removed = params.remove(&mut self.method.body, param);
        self.method.body.blocks[block].params = params;
        if removed {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "value {} is not a parameter of block `{}'",
                self.method.body.value(param).id(),
                self.method.body.block(block).name()
            )))
        }
    }

    /// Remove the block parameter at `index`, renumbering the rest.
    pub fn remove_block_parameter_at(
        &mut self,
        block: BlockId,
        index: usize,
    ) -> WarpResult<()> {
        if index >= self.method.body.blocks[block].params.len() {
            return Err(Error::invalid_argument(format!(
                "block `{}' has no parameter {index}",
                self.method.body.block(block).name()
            )));
        }
        let mut params =
            std::mem::take(&mut self.method.body.blocks[block].params);
        params.remove_at(&mut self.method.body, index);
        self.method.body.blocks[block].params = params;
        Ok(())
    }

    /// A primitive constant. Constants are shared values without a parent
    /// block; they do not appear in any block body.
    pub fn create_primitive(
        &mut self,
        bvt: BasicValueType,
        raw: u64,
    ) -> ValueId {
        let ty = self.env.types().primitive(bvt);
        self.method.body.values.push(ValueData::new_sealed(
            self.env.new_node_id(),
            ValueKind::Primitive { raw },
            ty,
            None,
            [],
        ))
    }

    /// The null value of a type. Block-less, like primitive constants.
    pub fn create_null(&mut self, ty: TypeHandle) -> ValueId {
        self.method.body.values.push(ValueData::new_sealed(
            self.env.new_node_id(),
            ValueKind::Null,
            ty,
            None,
            [],
        ))
    }

    /// Install a replacement; see
    /// [`MethodBody::replace_value`](crate::method::MethodBody::replace_value).
    pub fn replace(&mut self, value: ValueId, with: ValueId) -> WarpResult<()> {
        self.method.body.replace_value(value, with)
    }

    /// Obtain the builder proxy for one block.
    pub fn block(&mut self, block: BlockId) -> WarpResult<BlockBuilder<'_, 'a>> {
        if self.method.body.blocks[block].removed {
            return Err(Error::invalid_state(format!(
                "block `{}' has been merged away",
                self.method.body.blocks[block].name()
            )));
        }
        Ok(BlockBuilder {
            builder: self,
            block,
        })
    }

    /// Mark a block as removed. The block must already be unreachable
    /// from the entry; passes use this after computing reachability over
    /// a scope.
    pub fn discard_block(&mut self, block: BlockId) -> WarpResult<()> {
        if block == self.method.entry_block() {
            return Err(Error::invalid_argument(
                "cannot discard the entry block",
            ));
        }
        self.method.body.blocks[block].removed = true;
        self.states.remove(&block);
        Ok(())
    }

    /// Rebuild `source`'s reachable graph into this method, which must be
    /// freshly declared with an identical signature. Source function
    /// parameters map to this method's function parameters positionally.
    pub fn rebuild_method(&mut self, source: &Method) -> WarpResult<()> {
        if source.params().len() != self.method.params().len() {
            return Err(Error::incompatible(
                "parameter mapping does not cover the source method",
            ));
        }
        for (mine, theirs) in
            self.method.params.iter().zip(source.params().iter())
        {
            if self.method.body.value(mine).ty()
                != source.body().value(theirs).ty()
            {
                return Err(Error::incompatible(
                    "parameter types differ from the source method",
                ));
            }
        }
        if source.return_type() != self.method.return_type() {
            return Err(Error::incompatible(
                "return type differs from the source method",
            ));
        }
        let scope = Scope::new(source, self.env)?;
        let mut rebuilder = Rebuilder::new(source);
        for (mine, theirs) in
            self.method.params.iter().zip(source.params().iter())
        {
            rebuilder.value_map.insert(theirs, mine);
        }
        rebuilder.block_map.insert(source.entry_block(), self.entry_block());
        rebuilder.create_blocks(self, &scope)?;
        rebuilder.rebuild_bodies(self, &scope, ExitStrategy::KeepReturns)?;
        Ok(())
    }

    /// Run the commit protocol with the default argument mapper.
    pub fn finish(self) -> WarpResult<()> {
        self.finish_with(&DefaultArgumentMapper)
    }

    /// Run the commit protocol: seal open branch targets, strip branch
    /// arguments the mapper refuses, sweep replaced parameters, and
    /// compact block bodies.
    pub fn finish_with(mut self, mapper: &dyn ArgumentMapper) -> WarpResult<()> {
        let body = &mut self.method.body;

        for state in self.states.values() {
            for target in state.targets.values() {
                body.values[*target].seal();
            }
        }

        let block_ids: Vec<BlockId> = body.blocks.keys().collect();

        // Strip refused arguments while the destination parameter lists
        // still carry their replaced entries.
        for block in &block_ids {
            if body.blocks[*block].removed {
                continue;
            }
            let targets = body.terminator_targets(*block);
            for target in targets {
                let arity = body.value(target).operands().len();
                for index in (0..arity).rev() {
                    if !mapper.can_map_block_argument(body, target, index) {
                        body.values[target].remove_operand(index);
                    }
                }
            }
        }

        for block in &block_ids {
            let mut params = std::mem::take(&mut body.blocks[*block].params);
            params.perform_removal(body);
            body.blocks[*block].params = params;
        }
        let mut params = std::mem::take(&mut self.method.params);
        params.perform_removal(body);
        self.method.params = params;

        for block in &block_ids {
            let pending = self
                .states
                .get(block)
                .map(|state| state.pending_removals.clone())
                .unwrap_or_default();
            let mut kept = Vec::new();
            for value in std::mem::take(&mut body.blocks[*block].body) {
                let direct = value.direct();
                if pending.contains(&direct)
                    || body.values[direct].is_replaced()
                {
                    continue;
                }
                kept.push(value);
            }
            body.blocks[*block].body = kept;
        }
        self.states.clear();
        Ok(())
    }

    fn state_mut(&mut self, block: BlockId) -> &mut BlockState {
        self.states.entry(block).or_default()
    }
}

/// Mutation proxy for one block. The proxy holds the insertion cursor;
/// every `create_*` inserts at the cursor and advances it.
pub struct BlockBuilder<'b, 'a> {
    builder: &'b mut MethodBuilder<'a>,
    block: BlockId,
}

impl<'b, 'a> BlockBuilder<'b, 'a> {
    pub fn id(&self) -> BlockId {
        self.block
    }

    fn body(&self) -> &MethodBody {
        &self.builder.method.body
    }

    /// Position the cursor immediately after `value`.
    pub fn setup_insert_position(&mut self, value: ValueId) -> WarpResult<()> {
        let position = self.position_of(value)?;
        self.builder.state_mut(self.block).cursor = Some(position + 1);
        Ok(())
    }

    /// Position the cursor before the first body value.
    pub fn move_to_start(&mut self) {
        self.builder.state_mut(self.block).cursor = Some(0);
    }

    /// Position the cursor at the end of the block.
    pub fn move_to_end(&mut self) {
        self.builder.state_mut(self.block).cursor = None;
    }

    fn position_of(&self, value: ValueId) -> WarpResult<usize> {
        let body = self.body();
        body.block(self.block)
            .body
            .iter()
            .position(|v| v.direct() == value || v.resolve(body) == value)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "value {} is not in block `{}'",
                    body.value(value).id(),
                    body.block(self.block).name()
                ))
            })
    }

    fn insert_data(&mut self, data: ValueData) -> ValueId {
        let MethodBuilder { method, states, .. } = &mut *self.builder;
        let id = method.body.values.push(data);
        let block_body = &mut method.body.blocks[self.block].body;
        let state = states.entry(self.block).or_default();
        match state.cursor {
            Some(position) => {
                let position = position.min(block_body.len());
                block_body.insert(position, ValueRef::new(id));
                state.cursor = Some(position + 1);
            }
            None => block_body.push(ValueRef::new(id)),
        }
        id
    }

    pub(crate) fn insert_cloned(
        &mut self,
        kind: ValueKind,
        ty: TypeHandle,
        operands: SmallVec<[ValueRef; 2]>,
    ) -> ValueId {
        let data = ValueData::new_sealed(
            self.builder.env.new_node_id(),
            kind,
            ty,
            Some(self.block),
            operands,
        );
        self.insert_data(data)
    }

    fn primitive_ty(&self, value: ValueId) -> WarpResult<BasicValueType> {
        let body = self.body();
        let ty = body.value(body.resolve(value)).ty();
        self.builder.env.types().basic_value_type(ty).ok_or_else(|| {
            Error::invalid_argument(format!(
                "value {} is not primitive",
                body.value(body.resolve(value)).id()
            ))
        })
    }

    pub fn create_unary(
        &mut self,
        op: UnaryOp,
        value: ValueId,
    ) -> WarpResult<ValueId> {
        self.primitive_ty(value)?;
        let ty = self.body().value(self.body().resolve(value)).ty();
        Ok(self.insert_cloned(
            ValueKind::Unary { op },
            ty,
            [ValueRef::new(value)].into_iter().collect(),
        ))
    }

    pub fn create_binary(
        &mut self,
        op: BinaryOp,
        left: ValueId,
        right: ValueId,
    ) -> WarpResult<ValueId> {
        let left_ty = self.primitive_ty(left)?;
        let right_ty = self.primitive_ty(right)?;
        if left_ty != right_ty {
            return Err(Error::invalid_argument(format!(
                "operand types {left_ty} and {right_ty} do not match"
            )));
        }
        let ty = self.body().value(self.body().resolve(left)).ty();
        Ok(self.insert_cloned(
            ValueKind::Binary { op },
            ty,
            [ValueRef::new(left), ValueRef::new(right)]
                .into_iter()
                .collect(),
        ))
    }

    pub fn create_compare(
        &mut self,
        op: CompareOp,
        left: ValueId,
        right: ValueId,
    ) -> WarpResult<ValueId> {
        let left_ty = self.primitive_ty(left)?;
        let right_ty = self.primitive_ty(right)?;
        if left_ty != right_ty {
            return Err(Error::invalid_argument(format!(
                "operand types {left_ty} and {right_ty} do not match"
            )));
        }
        let ty = self.builder.env.types().primitive(BasicValueType::Int1);
        Ok(self.insert_cloned(
            ValueKind::Compare { op },
            ty,
            [ValueRef::new(left), ValueRef::new(right)]
                .into_iter()
                .collect(),
        ))
    }

    /// `select(condition, true_value, false_value)`. The condition must
    /// be an `i1` and both arms must have the same type.
    pub fn create_predicate(
        &mut self,
        condition: ValueId,
        true_value: ValueId,
        false_value: ValueId,
    ) -> WarpResult<ValueId> {
        self.require_bool(condition)?;
        let body = self.body();
        let true_ty = body.value(body.resolve(true_value)).ty();
        let false_ty = body.value(body.resolve(false_value)).ty();
        if true_ty != false_ty {
            return Err(Error::invalid_argument(
                "predicate arms have different types",
            ));
        }
        Ok(self.insert_cloned(
            ValueKind::Predicate,
            true_ty,
            [
                ValueRef::new(condition),
                ValueRef::new(true_value),
                ValueRef::new(false_value),
            ]
            .into_iter()
            .collect(),
        ))
    }

    /// Memory read through an integer address.
    pub fn create_load(
        &mut self,
        address: ValueId,
        ty: TypeHandle,
    ) -> WarpResult<ValueId> {
        self.require_integer(address)?;
        Ok(self.insert_cloned(
            ValueKind::Load,
            ty,
            [ValueRef::new(address)].into_iter().collect(),
        ))
    }

    /// Memory write through an integer address. Side-effecting.
    pub fn create_store(
        &mut self,
        address: ValueId,
        value: ValueId,
    ) -> WarpResult<ValueId> {
        self.require_integer(address)?;
        let void = self.builder.env.types().void();
        Ok(self.insert_cloned(
            ValueKind::Store,
            void,
            [ValueRef::new(address), ValueRef::new(value)]
                .into_iter()
                .collect(),
        ))
    }

    /// Call of another method by name. Side-effecting; argument types are
    /// checked when the call is specialised.
    pub fn create_call(
        &mut self,
        callee: Id,
        return_type: TypeHandle,
        args: &[ValueId],
    ) -> ValueId {
        self.insert_cloned(
            ValueKind::Call { callee },
            return_type,
            args.iter().map(|arg| ValueRef::new(*arg)).collect(),
        )
    }

    fn require_bool(&self, value: ValueId) -> WarpResult<()> {
        match self.primitive_ty(value)? {
            BasicValueType::Int1 => Ok(()),
            other => Err(Error::invalid_argument(format!(
                "expected an i1 condition, got {other}"
            ))),
        }
    }

    fn require_integer(&self, value: ValueId) -> WarpResult<()> {
        let bvt = self.primitive_ty(value)?;
        if bvt.is_int() {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "expected an integer, got {bvt}"
            )))
        }
    }

    /* ====================== terminator management ===================== */

    /// Allocate an open branch target bound to `dest`. Arguments are
    /// appended through [`BlockBuilder::add_branch_argument`]; the commit
    /// protocol seals it.
    fn create_branch_target(&mut self, dest: BlockId) -> ValueId {
        let void = self.builder.env.types().void();
        self.builder.method.body.values.push(ValueData::new_unsealed(
            self.builder.env.new_node_id(),
            ValueKind::BranchTarget { dest },
            void,
            None,
        ))
    }

    /// Install `terminator` on the block, replacing the previous one and
    /// re-registering the open target builders.
    fn install_terminator(&mut self, terminator: ValueId) -> WarpResult<()> {
        let MethodBuilder { method, states, .. } = &mut *self.builder;
        let body = &mut method.body;
        let old = body.blocks[self.block].terminator;
        if old != terminator {
            body.replace_value(old, terminator)?;
        }
        body.blocks[self.block].terminator = terminator;
        body.values[terminator].set_block(Some(self.block));
        let state = states.entry(self.block).or_default();
        state.targets.clear();
        let targets: Vec<ValueId> = body.values[terminator]
            .target_refs()
            .iter()
            .map(|target| target.direct())
            .collect();
        for target in targets {
            if let Some(dest) = body.values[target].destination() {
                state.targets.insert(dest, target);
            }
        }
        Ok(())
    }

    fn make_terminator(
        &mut self,
        kind: ValueKind,
        operands: SmallVec<[ValueRef; 2]>,
    ) -> ValueId {
        let void = self.builder.env.types().void();
        self.builder.method.body.values.push(ValueData::new_sealed(
            self.builder.env.new_node_id(),
            kind,
            void,
            Some(self.block),
            operands,
        ))
    }

    /// Terminate the block with a return. `None` returns void.
    pub fn create_return(
        &mut self,
        value: Option<ValueId>,
    ) -> WarpResult<ValueId> {
        let return_type = self.builder.method.return_type();
        let types = self.builder.env.types();
        let argument = match value {
            Some(value) => {
                let body = self.body();
                let actual = body.value(body.resolve(value)).ty();
                if actual != return_type {
                    return Err(Error::invalid_argument(format!(
                        "return value type {} does not match {}",
                        types.format(actual),
                        types.format(return_type)
                    )));
                }
                value
            }
            None => {
                if !types.is_void(return_type) {
                    return Err(Error::invalid_argument(
                        "method does not return void",
                    ));
                }
                let void = types.void();
                self.builder.create_null(void)
            }
        };
        let terminator = self.make_terminator(
            ValueKind::Return,
            [ValueRef::new(argument)].into_iter().collect(),
        );
        self.install_terminator(terminator)?;
        Ok(terminator)
    }

    /// Terminate the block with an unconditional branch.
    pub fn create_branch(&mut self, dest: BlockId) -> WarpResult<ValueId> {
        let target = self.create_branch_target(dest);
        let terminator = self.make_terminator(
            ValueKind::UnconditionalBranch,
            [ValueRef::new(target)].into_iter().collect(),
        );
        self.install_terminator(terminator)?;
        Ok(terminator)
    }

    /// Terminate the block with a conditional branch on an `i1`.
    pub fn create_conditional_branch(
        &mut self,
        condition: ValueId,
        true_dest: BlockId,
        false_dest: BlockId,
    ) -> WarpResult<ValueId> {
        self.require_bool(condition)?;
        let true_target = self.create_branch_target(true_dest);
        let false_target = self.create_branch_target(false_dest);
        let terminator = self.make_terminator(
            ValueKind::ConditionalBranch,
            [
                ValueRef::new(condition),
                ValueRef::new(true_target),
                ValueRef::new(false_target),
            ]
            .into_iter()
            .collect(),
        );
        self.install_terminator(terminator)?;
        Ok(terminator)
    }

    /// Terminate the block with a switch over an integer selector. With
    /// exactly two targets this canonicalises into a conditional branch
    /// on `selector == 0`.
    pub fn create_switch_branch(
        &mut self,
        selector: ValueId,
        dests: &[BlockId],
    ) -> WarpResult<ValueId> {
        self.require_integer(selector)?;
        if dests.is_empty() {
            return Err(Error::invalid_argument(
                "a switch needs at least one target",
            ));
        }
        if dests.len() == 2 {
            let bvt = self.primitive_ty(selector)?;
            let zero = self.builder.create_primitive(bvt, 0);
            let condition =
                self.create_compare(CompareOp::Eq, selector, zero)?;
            return self.create_conditional_branch(
                condition, dests[0], dests[1],
            );
        }
        let mut operands: SmallVec<[ValueRef; 2]> =
            SmallVec::with_capacity(dests.len() + 1);
        operands.push(ValueRef::new(selector));
        for dest in dests {
            let target = self.create_branch_target(*dest);
            operands.push(ValueRef::new(target));
        }
        let terminator =
            self.make_terminator(ValueKind::SwitchBranch, operands);
        self.install_terminator(terminator)?;
        Ok(terminator)
    }

    /// Append a block argument to the open branch target reaching `dest`.
    pub fn add_branch_argument(
        &mut self,
        dest: BlockId,
        value: ValueId,
    ) -> WarpResult<()> {
        let target = self
            .builder
            .states
            .get(&self.block)
            .and_then(|state| state.targets.get(&dest))
            .copied()
            .ok_or_else(|| {
                Error::invalid_state(format!(
                    "no open branch target to `{}' from `{}'",
                    self.body().block(dest).name(),
                    self.body().block(self.block).name()
                ))
            })?;
        self.builder.method.body.values[target]
            .add_operand(ValueRef::new(value))
    }

    /* ========================= body management ======================== */

    /// Schedule a body value for removal; the commit protocol compacts.
    pub fn remove(&mut self, value: ValueId) -> WarpResult<()> {
        self.position_of(value)?;
        self.builder
            .state_mut(self.block)
            .pending_removals
            .insert(value);
        Ok(())
    }

    /// Drop every non-terminator value of the block.
    pub fn clear(&mut self) {
        self.builder.method.body.blocks[self.block].body.clear();
        let state = self.builder.state_mut(self.block);
        state.cursor = None;
        state.pending_removals.clear();
    }

    /// Split the block at `value`: move every body value after it (also
    /// `value` itself when `keep_value` is false) into a fresh block,
    /// migrate the terminator, and branch to the fresh block.
    pub fn split_block(
        &mut self,
        value: ValueId,
        keep_value: bool,
    ) -> WarpResult<BlockId> {
        let env = self.builder.env;
        let position = self.position_of(value)?;
        let split_at = if keep_value { position + 1 } else { position };
        let new_block = self.builder.create_block("block");

        {
            let body = &mut self.builder.method.body;
            let moved = body.blocks[self.block].body.split_off(split_at);
            for value in &moved {
                body.values[value.direct()].set_block(Some(new_block));
            }

            // migrate the terminator; the fresh block's placeholder
            // forwards to it
            let terminator = body.blocks[self.block].terminator;
            let placeholder = body.blocks[new_block].terminator;
            body.replace_value(placeholder, terminator)?;
            body.values[terminator].set_block(Some(new_block));
            body.blocks[new_block].terminator = terminator;
            body.blocks[new_block].body = moved;

            // the old block needs a fresh placeholder before the branch
            // below replaces it, so the migrated terminator stays intact
            let interim = body.values.push(ValueData::new_sealed(
                env.new_node_id(),
                ValueKind::BuilderTerminator,
                env.types().void(),
                Some(self.block),
                [],
            ));
            body.blocks[self.block].terminator = interim;
        }

        // move builder state: open targets follow the terminator, and
        // scheduled removals follow their values
        let old_state = self.builder.states.entry(self.block).or_default();
        let targets = std::mem::take(&mut old_state.targets);
        let pending = std::mem::take(&mut old_state.pending_removals);
        if let Some(cursor) = old_state.cursor {
            old_state.cursor = Some(cursor.min(split_at));
        }
        let (moved_removals, kept_removals): (HashSet<_>, HashSet<_>) = {
            let body = &self.builder.method.body;
            pending.into_iter().partition(|value| {
                body.value(*value).block() == Some(new_block)
            })
        };
        self.builder.state_mut(self.block).pending_removals = kept_removals;
        let new_state = self.builder.state_mut(new_block);
        new_state.targets = targets;
        new_state.pending_removals = moved_removals;

        self.create_branch(new_block)?;
        Ok(new_block)
    }

    /// Merge `other` into this block: append its compacted body, re-parent
    /// the values, optionally concatenate the parameter lists, and take
    /// over its terminator. `other` must have no predecessor besides this
    /// block and, unless `merge_parameters` is set, no live parameters.
    pub fn merge_block(
        &mut self,
        other: BlockId,
        merge_parameters: bool,
    ) -> WarpResult<()> {
        if other == self.block {
            return Err(Error::invalid_argument(
                "cannot merge a block into itself",
            ));
        }
        let body = &self.builder.method.body;
        if body.block(other).removed {
            return Err(Error::invalid_state(
                "cannot merge a removed block",
            ));
        }
        for (block, data) in body.blocks() {
            if block == self.block || data.removed {
                continue;
            }
            if body.successors(block).contains(&other) {
                return Err(Error::invalid_state(format!(
                    "block `{}' still has a predecessor besides `{}'",
                    body.block(other).name(),
                    body.block(self.block).name()
                )));
            }
        }

        if merge_parameters {
            let MethodBuilder { method, .. } = &mut *self.builder;
            let donor = std::mem::take(&mut method.body.blocks[other].params);
            let mut mine =
                std::mem::take(&mut method.body.blocks[self.block].params);
            mine.add_range(&mut method.body, &donor);
            method.body.blocks[self.block].params = mine;
        } else {
            for param in body.block(other).params().iter() {
                if !body.value(param).is_replaced() {
                    return Err(Error::invalid_state(format!(
                        "block `{}' still has a live parameter",
                        body.block(other).name()
                    )));
                }
            }
        }

        let pending = self
            .builder
            .states
            .get(&other)
            .map(|state| state.pending_removals.clone())
            .unwrap_or_default();

        let MethodBuilder { method, states, .. } = &mut *self.builder;
        let body = &mut method.body;
        let donor_body = std::mem::take(&mut body.blocks[other].body);
        for value in donor_body {
            let direct = value.direct();
            if pending.contains(&direct) || body.values[direct].is_replaced()
            {
                continue;
            }
            body.values[direct].set_block(Some(self.block));
            body.blocks[self.block].body.push(value);
        }

        let my_terminator = body.blocks[self.block].terminator;
        let other_terminator = body.blocks[other].terminator;
        body.replace_value(my_terminator, other_terminator)?;
        body.values[other_terminator].set_block(Some(self.block));
        body.blocks[self.block].terminator = other_terminator;
        body.blocks[other].removed = true;

        let donor_targets = states
            .get_mut(&other)
            .map(|state| std::mem::take(&mut state.targets))
            .unwrap_or_default();
        states.remove(&other);
        let state = states.entry(self.block).or_default();
        state.targets = donor_targets;
        state.cursor = None;
        Ok(())
    }

    /// Inline `callee` at `call`: split at the call, rebuild the callee's
    /// reachable blocks with its parameters bound to the call arguments,
    /// wire the entry and every exit, and replace the call value with the
    /// single exit's return value or a fresh block parameter fed by all
    /// exits.
    pub fn specialize_call(
        &mut self,
        call: ValueId,
        callee: &Method,
    ) -> WarpResult<()> {
        let body = &self.builder.method.body;
        let call_data = body.value(call);
        let callee_name = match call_data.kind() {
            ValueKind::Call { callee } => *callee,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "value {} is not a call",
                    call_data.id()
                )))
            }
        };
        if callee_name != callee.name() {
            return Err(Error::incompatible(format!(
                "call names `{callee_name}' but `{}' was supplied",
                callee.name()
            )));
        }
        if call_data.block() != Some(self.block) {
            return Err(Error::invalid_argument(
                "call does not belong to this block",
            ));
        }
        if call_data.operands().len() != callee.params().len() {
            return Err(Error::incompatible(format!(
                "call passes {} arguments but `{}' takes {}",
                call_data.operands().len(),
                callee.name(),
                callee.params().len()
            )));
        }
        if call_data.ty() != callee.return_type() {
            return Err(Error::incompatible(
                "call type does not match the callee's return type",
            ));
        }
        let args: Vec<ValueId> = call_data
            .operands()
            .iter()
            .map(|arg| arg.resolve(body))
            .collect();
        let return_type = call_data.ty();
        let is_void = self.builder.env.types().is_void(return_type);

        let scope = Scope::new(callee, self.builder.env)?;
        let post = self.split_block(call, true)?;

        let mut rebuilder = Rebuilder::new(callee);
        for (param, arg) in callee.params().iter().zip(args) {
            rebuilder.value_map.insert(param, arg);
        }
        rebuilder.create_blocks(self.builder, &scope)?;
        let exits = rebuilder.rebuild_bodies(
            self.builder,
            &scope,
            ExitStrategy::BranchTo(post),
        )?;

        let entry_copy = rebuilder.block_map[&callee.entry_block()];
        self.create_branch(entry_copy)?;

        let result = if is_void || exits.is_empty() {
            self.builder.create_null(return_type)
        } else if exits.len() == 1 {
            exits[0].1
        } else {
            let param = self.builder.create_block_parameter(
                post,
                return_type,
                Id::new("ret"),
            );
            for (exit_block, exit_value) in &exits {
                self.builder
                    .block(*exit_block)?
                    .add_branch_argument(post, *exit_value)?;
            }
            param
        };
        self.builder.method.body.replace_value(call, result)?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum ExitStrategy {
    /// Rebuild returns as returns (method cloning).
    KeepReturns,
    /// Rewrite every return into a branch to the given block, recording
    /// the mapped return value per exit (call specialisation).
    BranchTo(BlockId),
}

/// Clones a source method's reachable graph into the method under
/// construction, remapping every operand.
struct Rebuilder<'s> {
    source: &'s Method,
    value_map: HashMap<ValueId, ValueId>,
    block_map: HashMap<BlockId, BlockId>,
}

impl<'s> Rebuilder<'s> {
    fn new(source: &'s Method) -> Self {
        Self {
            source,
            value_map: HashMap::new(),
            block_map: HashMap::new(),
        }
    }

    /// Pass 1: allocate a fresh block (with cloned parameters) for every
    /// reachable source block not already mapped.
    fn create_blocks(
        &mut self,
        builder: &mut MethodBuilder,
        scope: &Scope,
    ) -> WarpResult<()> {
        let prefix = self.source.name().to_string();
        for block in scope.blocks() {
            let mapped = match self.block_map.get(&block) {
                Some(mapped) => *mapped,
                None => {
                    let fresh = builder.create_block(&prefix);
                    self.block_map.insert(block, fresh);
                    fresh
                }
            };
            let params: Vec<ValueId> =
                self.source.body().block(block).params().iter().collect();
            for param in params {
                let data = self.source.body().value(param);
                let name = match data.kind() {
                    ValueKind::Parameter { name, .. } => *name,
                    _ => Id::default(),
                };
                let fresh = builder.create_block_parameter(
                    mapped,
                    data.ty(),
                    name,
                );
                self.value_map.insert(param, fresh);
            }
        }
        Ok(())
    }

    /// Map a resolved source value into the target method. Block-less
    /// constants are cloned lazily; anything else must already be mapped.
    fn map_value(
        &mut self,
        builder: &mut MethodBuilder,
        source_value: ValueId,
    ) -> WarpResult<ValueId> {
        if let Some(mapped) = self.value_map.get(&source_value) {
            return Ok(*mapped);
        }
        let data = self.source.body().value(source_value);
        let mapped = match data.kind() {
            ValueKind::Primitive { raw } => {
                let bvt = builder
                    .env
                    .types()
                    .basic_value_type(data.ty())
                    .ok_or_else(|| {
                        Error::internal("primitive constant without a type")
                    })?;
                builder.create_primitive(bvt, *raw)
            }
            ValueKind::Null => builder.create_null(data.ty()),
            ValueKind::BuilderTerminator => {
                return Err(Error::invalid_state(
                    "cannot rebuild a builder terminator",
                ))
            }
            _ => {
                return Err(Error::incompatible(format!(
                    "rebuild mapping does not cover value {}",
                    data.id()
                )))
            }
        };
        self.value_map.insert(source_value, mapped);
        Ok(mapped)
    }

    fn map_operands(
        &mut self,
        builder: &mut MethodBuilder,
        source_value: ValueId,
    ) -> WarpResult<SmallVec<[ValueRef; 2]>> {
        let operands: Vec<ValueId> = self
            .source
            .body()
            .value(source_value)
            .operands()
            .iter()
            .map(|operand| operand.resolve(self.source.body()))
            .collect();
        let mut mapped = SmallVec::with_capacity(operands.len());
        for operand in operands {
            mapped.push(ValueRef::new(self.map_value(builder, operand)?));
        }
        Ok(mapped)
    }

    /// Pass 2: clone bodies and terminators in reverse post order.
    /// Returns the exit list `(rebuilt block, mapped return argument)`
    /// when rewriting returns into branches.
    fn rebuild_bodies(
        &mut self,
        builder: &mut MethodBuilder,
        scope: &Scope,
        exit: ExitStrategy,
    ) -> WarpResult<Vec<(BlockId, ValueId)>> {
        let mut exits = Vec::new();
        for block in scope.blocks() {
            let mapped_block = self.block_map[&block];
            let body_values: Vec<ValueId> = self
                .source
                .body()
                .block(block)
                .body()
                .iter()
                .map(|value| value.resolve(self.source.body()))
                .collect();
            for value in body_values {
                let kind = self.source.body().value(value).kind().clone();
                if matches!(kind, ValueKind::BuilderTerminator) {
                    return Err(Error::invalid_state(
                        "cannot rebuild a builder terminator",
                    ));
                }
                let ty = self.source.body().value(value).ty();
                let operands = self.map_operands(builder, value)?;
                let fresh = builder
                    .block(mapped_block)?
                    .insert_cloned(kind, ty, operands);
                self.value_map.insert(value, fresh);
            }

            let terminator = self.source.body().block(block).terminator();
            let kind = self.source.body().value(terminator).kind().clone();
            match kind {
                ValueKind::Return => {
                    let argument = self.source.body().value(terminator)
                        .argument_refs()[0]
                        .resolve(self.source.body());
                    let mapped_argument =
                        self.map_value(builder, argument)?;
                    match exit {
                        ExitStrategy::KeepReturns => {
                            let is_null = matches!(
                                builder.method.body.value(mapped_argument)
                                    .kind(),
                                ValueKind::Null
                            );
                            let value = if is_null {
                                None
                            } else {
                                Some(mapped_argument)
                            };
                            builder
                                .block(mapped_block)?
                                .create_return(value)?;
                        }
                        ExitStrategy::BranchTo(post) => {
                            builder
                                .block(mapped_block)?
                                .create_branch(post)?;
                            exits.push((mapped_block, mapped_argument));
                        }
                    }
                }
                ValueKind::UnconditionalBranch
                | ValueKind::ConditionalBranch
                | ValueKind::SwitchBranch => {
                    self.rebuild_branch(builder, block, mapped_block)?;
                }
                ValueKind::BuilderTerminator => {
                    return Err(Error::invalid_state(
                        "cannot rebuild a builder terminator",
                    ))
                }
                _ => {
                    return Err(Error::internal(format!(
                        "block `{}' ends in a non-terminator",
                        self.source.body().block(block).name()
                    )))
                }
            }
        }
        Ok(exits)
    }

    fn rebuild_branch(
        &mut self,
        builder: &mut MethodBuilder,
        source_block: BlockId,
        mapped_block: BlockId,
    ) -> WarpResult<()> {
        let source_body = self.source.body();
        let terminator = source_body.block(source_block).terminator();
        let kind = source_body.value(terminator).kind().clone();

        let arguments: Vec<ValueId> = source_body
            .value(terminator)
            .argument_refs()
            .iter()
            .map(|argument| argument.resolve(source_body))
            .collect();
        let mut mapped_arguments = Vec::with_capacity(arguments.len());
        for argument in arguments {
            mapped_arguments.push(self.map_value(builder, argument)?);
        }

        // (destination, block arguments) per target, in target order
        let targets: Vec<ValueId> = source_body
            .value(terminator)
            .target_refs()
            .iter()
            .map(|target| target.resolve(source_body))
            .collect();
        let mut mapped_targets = Vec::with_capacity(targets.len());
        for target in targets {
            let dest = source_body
                .value(target)
                .destination()
                .ok_or_else(|| Error::internal("branch without a target"))?;
            let mapped_dest =
                self.block_map.get(&dest).copied().ok_or_else(|| {
                    Error::incompatible(format!(
                        "rebuild mapping does not cover block `{}'",
                        source_body.block(dest).name()
                    ))
                })?;
            let argument_ids: Vec<ValueId> = source_body
                .value(target)
                .operands()
                .iter()
                .map(|argument| argument.resolve(source_body))
                .collect();
            let mut mapped_args = Vec::with_capacity(argument_ids.len());
            for argument in argument_ids {
                mapped_args.push(self.map_value(builder, argument)?);
            }
            mapped_targets.push((mapped_dest, mapped_args));
        }

        let mut bb = builder.block(mapped_block)?;
        match kind {
            ValueKind::UnconditionalBranch => {
                let (dest, args) = &mapped_targets[0];
                bb.create_branch(*dest)?;
                for arg in args {
                    bb.add_branch_argument(*dest, *arg)?;
                }
            }
            ValueKind::ConditionalBranch => {
                let condition = mapped_arguments[0];
                let (true_dest, true_args) = &mapped_targets[0];
                let (false_dest, false_args) = &mapped_targets[1];
                bb.create_conditional_branch(
                    condition, *true_dest, *false_dest,
                )?;
                for arg in true_args {
                    bb.add_branch_argument(*true_dest, *arg)?;
                }
                for arg in false_args {
                    bb.add_branch_argument(*false_dest, *arg)?;
                }
            }
            ValueKind::SwitchBranch => {
                let selector = mapped_arguments[0];
                let dests: Vec<BlockId> =
                    mapped_targets.iter().map(|(dest, _)| *dest).collect();
                bb.create_switch_branch(selector, &dests)?;
                for (dest, args) in &mapped_targets {
                    for arg in args {
                        bb.add_branch_argument(*dest, *arg)?;
                    }
                }
            }
            _ => unreachable!("checked by the caller"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::printer::Printer;
    use crate::scope::Scope;

    fn int32(ctx: &Context) -> TypeHandle {
        ctx.env().types().primitive(BasicValueType::Int32)
    }

    fn bool_ty(ctx: &Context) -> TypeHandle {
        ctx.env().types().primitive(BasicValueType::Int1)
    }

    #[test]
    fn trivial_return() {
        let mut ctx = Context::new();
        let i32_ty = int32(&ctx);
        ctx.declare("main", i32_ty, &[]).unwrap();

        let (env, method) = ctx.method_with_env("main").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let forty_two = mb.create_primitive(BasicValueType::Int32, 42);
        let entry = mb.entry_block();
        mb.block(entry)
            .unwrap()
            .create_return(Some(forty_two))
            .unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("main").unwrap();
        let body = method.body();
        let entry = method.entry_block();
        assert_eq!(method.num_live_blocks(), 1);
        assert!(body.block(entry).body().is_empty());
        let terminator = body.block(entry).terminator();
        assert!(matches!(body.value(terminator).kind(), ValueKind::Return));
        let returned = body.return_value(terminator).unwrap();
        assert!(matches!(
            body.value(returned).kind(),
            ValueKind::Primitive { raw: 42 }
        ));

        let printed = Printer::method_to_string(method, ctx.env());
        assert!(printed.contains("method @main() -> i32 {"));
        assert!(printed.contains("ret 42"));
    }

    #[test]
    fn conditional_branch_targets() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i1 = bool_ty(&ctx);
        ctx.declare("f", void, &[(Id::new("p"), i1)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let p = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let then_block = mb.create_block("then");
        let else_block = mb.create_block("else");
        let entry = mb.entry_block();
        mb.block(entry)
            .unwrap()
            .create_conditional_branch(p, then_block, else_block)
            .unwrap();
        mb.block(then_block).unwrap().create_return(None).unwrap();
        mb.block(else_block).unwrap().create_return(None).unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let terminator = body.block(method.entry_block()).terminator();
        assert!(matches!(
            body.value(terminator).kind(),
            ValueKind::ConditionalBranch
        ));
        let true_target = body.true_target(terminator).unwrap();
        let false_target = body.false_target(terminator).unwrap();
        assert_eq!(body.value(true_target).destination(), Some(then_block));
        assert_eq!(body.value(false_target).destination(), Some(else_block));
    }

    #[test]
    fn switch_with_two_targets_canonicalises() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[(Id::new("x"), i32_ty)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let t0 = mb.create_block("case");
        let t1 = mb.create_block("case");
        let entry = mb.entry_block();
        mb.block(entry)
            .unwrap()
            .create_switch_branch(x, &[t0, t1])
            .unwrap();
        mb.block(t0).unwrap().create_return(None).unwrap();
        mb.block(t1).unwrap().create_return(None).unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let terminator = body.block(method.entry_block()).terminator();
        assert!(matches!(
            body.value(terminator).kind(),
            ValueKind::ConditionalBranch
        ));
        let condition =
            body.value(terminator).argument_refs()[0].resolve(body);
        assert!(matches!(
            body.value(condition).kind(),
            ValueKind::Compare { op: CompareOp::Eq }
        ));
        let zero = body.value(condition).operands()[1].resolve(body);
        assert!(matches!(
            body.value(zero).kind(),
            ValueKind::Primitive { raw: 0 }
        ));
        let true_target = body.true_target(terminator).unwrap();
        let false_target = body.false_target(terminator).unwrap();
        assert_eq!(body.value(true_target).destination(), Some(t0));
        assert_eq!(body.value(false_target).destination(), Some(t1));
    }

    #[test]
    fn switch_with_many_targets_stays_a_switch() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[(Id::new("x"), i32_ty)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let dests =
            [mb.create_block("case"), mb.create_block("case"), mb.create_block("case")];
        let entry = mb.entry_block();
        mb.block(entry)
            .unwrap()
            .create_switch_branch(x, &dests)
            .unwrap();
        for dest in dests {
            mb.block(dest).unwrap().create_return(None).unwrap();
        }
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let terminator = body.block(method.entry_block()).terminator();
        assert!(matches!(
            body.value(terminator).kind(),
            ValueKind::SwitchBranch
        ));
        let targets = body.terminator_targets(method.entry_block());
        assert_eq!(targets.len(), 3);
        for (target, dest) in targets.iter().zip(dests) {
            assert_eq!(body.value(*target).destination(), Some(dest));
        }
    }

    #[test]
    fn replaced_parameter_drops_branch_arguments() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let exit = mb.create_block("exit");
        let p = mb.create_block_parameter(exit, i32_ty, Id::new("p"));
        let forty_two = mb.create_primitive(BasicValueType::Int32, 42);
        let entry = mb.entry_block();
        {
            let mut bb = mb.block(entry).unwrap();
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, forty_two).unwrap();
        }
        mb.block(exit).unwrap().create_return(None).unwrap();

        let seven = mb.create_primitive(BasicValueType::Int32, 7);
        mb.replace(p, seven).unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        assert!(body.block(exit).params().is_empty());
        let target = body.target_to(method.entry_block(), exit).unwrap();
        assert!(body.value(target).operands().is_empty());
        assert!(body.value(target).is_sealed());
    }

    #[test]
    fn branch_arguments_match_parameters_after_finish() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let exit = mb.create_block("exit");
        mb.create_block_parameter(exit, i32_ty, Id::new("p"));
        let forty_two = mb.create_primitive(BasicValueType::Int32, 42);
        let entry = mb.entry_block();
        {
            let mut bb = mb.block(entry).unwrap();
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, forty_two).unwrap();
        }
        mb.block(exit).unwrap().create_return(None).unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let target = body.target_to(method.entry_block(), exit).unwrap();
        assert_eq!(
            body.value(target).operands().len(),
            body.block(exit).params().len()
        );
    }

    #[test]
    fn replace_is_idempotent_and_monotone() {
        let mut ctx = Context::new();
        let i32_ty = int32(&ctx);
        ctx.declare("f", i32_ty, &[]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let a = mb.create_primitive(BasicValueType::Int32, 1);
        let b = mb.create_primitive(BasicValueType::Int32, 2);
        let c = mb.create_primitive(BasicValueType::Int32, 3);

        mb.replace(a, b).unwrap();
        mb.replace(a, b).unwrap();
        assert_eq!(mb.method().body().resolve(a), b);

        assert!(mb.replace(a, c).unwrap_err().is_invalid_state());
        assert!(mb.replace(b, a).unwrap_err().is_invalid_state());
        assert!(mb.replace(c, c).unwrap_err().is_invalid_state());
    }

    #[test]
    fn split_block_moves_the_suffix() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[(Id::new("x"), i32_ty)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let entry = mb.entry_block();
        let (v1, v2, v3);
        {
            let mut bb = mb.block(entry).unwrap();
            v1 = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            v2 = bb.create_binary(BinaryOp::Add, v1, x).unwrap();
            v3 = bb.create_binary(BinaryOp::Add, v2, x).unwrap();
            bb.create_return(None).unwrap();
        }
        let tail = mb.block(entry).unwrap().split_block(v1, true).unwrap();

        let body = mb.method().body();
        let entry_values: Vec<ValueId> =
            body.block(entry).body().iter().map(|v| v.direct()).collect();
        let tail_values: Vec<ValueId> =
            body.block(tail).body().iter().map(|v| v.direct()).collect();
        assert_eq!(entry_values, vec![v1]);
        assert_eq!(tail_values, vec![v2, v3]);
        assert!(matches!(
            body.value(body.block(entry).terminator()).kind(),
            ValueKind::UnconditionalBranch
        ));
        assert_eq!(body.successors(entry).to_vec(), vec![tail]);
        assert!(matches!(
            body.value(body.block(tail).terminator()).kind(),
            ValueKind::Return
        ));
        assert_eq!(body.value(v2).block(), Some(tail));

        mb.finish().unwrap();
    }

    #[test]
    fn merge_block_appends_and_takes_the_terminator() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[(Id::new("x"), i32_ty)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let entry = mb.entry_block();
        let other = mb.create_block("tail");
        let (v1, v2);
        {
            let mut bb = mb.block(entry).unwrap();
            v1 = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            bb.create_branch(other).unwrap();
        }
        {
            let mut bb = mb.block(other).unwrap();
            v2 = bb.create_binary(BinaryOp::Mul, x, x).unwrap();
            bb.create_return(None).unwrap();
        }
        mb.block(entry).unwrap().merge_block(other, false).unwrap();
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        assert_eq!(method.num_live_blocks(), 1);
        let entry_values: Vec<ValueId> =
            body.block(entry).body().iter().map(|v| v.direct()).collect();
        assert_eq!(entry_values, vec![v1, v2]);
        assert!(matches!(
            body.value(body.block(entry).terminator()).kind(),
            ValueKind::Return
        ));
        assert!(body.block(other).is_removed());
    }

    #[test]
    fn scheduled_removals_are_applied_on_finish() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        let i32_ty = int32(&ctx);
        ctx.declare("f", void, &[(Id::new("x"), i32_ty)]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let entry = mb.entry_block();
        let v2;
        {
            let mut bb = mb.block(entry).unwrap();
            let v1 = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            v2 = bb.create_binary(BinaryOp::Sub, x, x).unwrap();
            bb.create_return(None).unwrap();
            bb.remove(v1).unwrap();
        }
        mb.finish().unwrap();

        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let entry_values: Vec<ValueId> =
            body.block(entry).body().iter().map(|v| v.direct()).collect();
        assert_eq!(entry_values, vec![v2]);
    }

    #[test]
    fn specialize_call_inlines_a_single_exit() {
        let mut ctx = Context::new();
        let i32_ty = int32(&ctx);
        ctx.declare("callee", i32_ty, &[(Id::new("x"), i32_ty)])
            .unwrap();
        ctx.declare("caller", i32_ty, &[(Id::new("y"), i32_ty)])
            .unwrap();

        {
            let (env, method) = ctx.method_with_env("callee").unwrap();
            let x = method.params().get(0).unwrap();
            let mut mb = MethodBuilder::new(method, env);
            let entry = mb.entry_block();
            let mut bb = mb.block(entry).unwrap();
            let doubled = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            bb.create_return(Some(doubled)).unwrap();
            mb.finish().unwrap();
        }

        {
            let (env, caller, callee) =
                ctx.method_and_callee("caller", "callee").unwrap();
            let y = caller.params().get(0).unwrap();
            let mut mb = MethodBuilder::new(caller, env);
            let entry = mb.entry_block();
            let call = {
                let mut bb = mb.block(entry).unwrap();
                let call =
                    bb.create_call(Id::new("callee"), i32_ty, &[y]);
                bb.create_return(Some(call)).unwrap();
                call
            };
            mb.block(entry)
                .unwrap()
                .specialize_call(call, callee)
                .unwrap();
            mb.finish().unwrap();
        }

        let caller = ctx.find_method("caller").unwrap();
        let scope = Scope::new(caller, ctx.env()).unwrap();
        assert_eq!(scope.len(), 3);

        let body = caller.body();
        for block in scope.blocks() {
            for value in body.block(block).body() {
                let kind = body.value(value.resolve(body)).kind();
                assert!(!matches!(kind, ValueKind::Call { .. }));
            }
        }
        let exit = scope
            .blocks()
            .find(|block| {
                matches!(
                    body.value(body.block(*block).terminator()).kind(),
                    ValueKind::Return
                )
            })
            .unwrap();
        let returned = body
            .return_value(body.block(exit).terminator())
            .unwrap();
        assert!(matches!(
            body.value(returned).kind(),
            ValueKind::Binary { op: BinaryOp::Add }
        ));
    }

    #[test]
    fn rebuild_roundtrip_preserves_the_shape() {
        let mut ctx = Context::new();
        let i32_ty = int32(&ctx);
        let i1 = bool_ty(&ctx);
        let signature =
            [(Id::new("x"), i32_ty), (Id::new("c"), i1)];
        ctx.declare("f", i32_ty, &signature).unwrap();
        ctx.declare("f2", i32_ty, &signature).unwrap();

        {
            let (env, method) = ctx.method_with_env("f").unwrap();
            let x = method.params().get(0).unwrap();
            let c = method.params().get(1).unwrap();
            let mut mb = MethodBuilder::new(method, env);
            let then_block = mb.create_block("then");
            let else_block = mb.create_block("else");
            let exit = mb.create_block("exit");
            let p = mb.create_block_parameter(exit, i32_ty, Id::new("p"));
            let entry = mb.entry_block();
            mb.block(entry)
                .unwrap()
                .create_conditional_branch(c, then_block, else_block)
                .unwrap();
            {
                let mut bb = mb.block(then_block).unwrap();
                let v = bb.create_binary(BinaryOp::Add, x, x).unwrap();
                bb.create_branch(exit).unwrap();
                bb.add_branch_argument(exit, v).unwrap();
            }
            {
                let mut bb = mb.block(else_block).unwrap();
                let v = bb.create_binary(BinaryOp::Sub, x, x).unwrap();
                bb.create_branch(exit).unwrap();
                bb.add_branch_argument(exit, v).unwrap();
            }
            mb.block(exit).unwrap().create_return(Some(p)).unwrap();
            mb.finish().unwrap();
        }

        {
            let (env, fresh, source) =
                ctx.method_and_callee("f2", "f").unwrap();
            let mut mb = MethodBuilder::new(fresh, env);
            mb.rebuild_method(source).unwrap();
            mb.finish().unwrap();
        }

        let source = ctx.find_method("f").unwrap();
        let rebuilt = ctx.find_method("f2").unwrap();
        let source_scope = Scope::new(source, ctx.env()).unwrap();
        let rebuilt_scope = Scope::new(rebuilt, ctx.env()).unwrap();
        assert_eq!(source_scope.len(), rebuilt_scope.len());

        for (a, b) in source_scope.blocks().zip(rebuilt_scope.blocks()) {
            let sb = source.body().block(a);
            let rb = rebuilt.body().block(b);
            assert_eq!(sb.params().len(), rb.params().len());
            assert_eq!(sb.body().len(), rb.body().len());
            for (av, bv) in sb.body().iter().zip(rb.body().iter()) {
                let ak = source.body().value(av.resolve(source.body()));
                let bk = rebuilt.body().value(bv.resolve(rebuilt.body()));
                assert_eq!(
                    std::mem::discriminant(ak.kind()),
                    std::mem::discriminant(bk.kind())
                );
            }
            assert_eq!(
                std::mem::discriminant(
                    source
                        .body()
                        .value(sb.terminator())
                        .kind()
                ),
                std::mem::discriminant(
                    rebuilt
                        .body()
                        .value(rb.terminator())
                        .kind()
                )
            );
        }
    }

    #[test]
    fn scope_rejects_builder_terminators() {
        let mut ctx = Context::new();
        let void = ctx.env().types().void();
        ctx.declare("f", void, &[]).unwrap();
        let method = ctx.find_method("f").unwrap();
        let err = Scope::new(method, ctx.env()).unwrap_err();
        assert!(err.is_invalid_state());
    }
}
