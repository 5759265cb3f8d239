//! Ordered, mutable parameter lists for methods and basic blocks.
//!
//! Function parameters and block parameters are the same node kind; the
//! collection carries a nullable owning-block handle instead of two
//! distinct types. Parameter indices are only re-assigned by
//! [`update_indices`](ParameterCollection::update_indices) or by the
//! [`perform_removal`](ParameterCollection::perform_removal) sweep.
use crate::common::{BlockId, ValueId};
use crate::context::IrEnv;
use crate::method::MethodBody;
use crate::types::TypeHandle;
use crate::value::{ValueData, ValueKind};
use warp_utils::Id;

#[derive(Debug, Clone, Default)]
pub struct ParameterCollection {
    /// The owning block; `None` for a method's function parameters.
    owner: Option<BlockId>,
    params: Vec<ValueId>,
}

impl ParameterCollection {
    pub fn for_method() -> Self {
        Self {
            owner: None,
            params: Vec::new(),
        }
    }

    pub fn for_block(block: BlockId) -> Self {
        Self {
            owner: Some(block),
            params: Vec::new(),
        }
    }

    pub fn owner(&self) -> Option<BlockId> {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ValueId> {
        self.params.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.params.iter().copied()
    }

    pub fn contains(&self, param: ValueId) -> bool {
        self.params.contains(&param)
    }

    pub fn index_of(&self, param: ValueId) -> Option<usize> {
        self.params.iter().position(|p| *p == param)
    }

    /// Allocate a parameter node and append it.
    pub(crate) fn create_parameter(
        &mut self,
        body: &mut MethodBody,
        env: &IrEnv,
        ty: TypeHandle,
        name: Id,
    ) -> ValueId {
        let kind = ValueKind::Parameter {
            index: self.params.len(),
            name,
        };
        let data =
            ValueData::new_sealed(env.new_node_id(), kind, ty, self.owner, []);
        let param = body.values.push(data);
        self.params.push(param);
        param
    }

    /// Allocate a parameter node and insert it at the front, renumbering
    /// the rest.
    pub(crate) fn create_parameter_at_front(
        &mut self,
        body: &mut MethodBody,
        env: &IrEnv,
        ty: TypeHandle,
        name: Id,
    ) -> ValueId {
        let kind = ValueKind::Parameter { index: 0, name };
        let data =
            ValueData::new_sealed(env.new_node_id(), kind, ty, self.owner, []);
        let param = body.values.push(data);
        self.params.insert(0, param);
        self.update_indices(body);
        param
    }

    /// Append every parameter of `other`, re-owning and renumbering them.
    pub(crate) fn add_range(
        &mut self,
        body: &mut MethodBody,
        other: &ParameterCollection,
    ) {
        for param in other.iter() {
            body.values[param].set_block(self.owner);
            self.params.push(param);
        }
        self.update_indices(body);
    }

    pub(crate) fn remove(
        &mut self,
        body: &mut MethodBody,
        param: ValueId,
    ) -> bool {
        match self.index_of(param) {
            Some(index) => {
                self.remove_at(body, index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_at(&mut self, body: &mut MethodBody, index: usize) {
        self.params.remove(index);
        self.update_indices(body);
    }

    /// Re-assign every parameter's stored index to its list position.
    pub(crate) fn update_indices(&self, body: &mut MethodBody) {
        for (position, param) in self.params.iter().enumerate() {
            if let ValueKind::Parameter { index, .. } =
                body.values[*param].kind_mut()
            {
                *index = position;
            }
        }
    }

    /// Drop every replaced parameter and compact the indices of the rest.
    /// Returns the list positions that were dropped, in ascending order.
    pub(crate) fn perform_removal(
        &mut self,
        body: &mut MethodBody,
    ) -> Vec<usize> {
        let mut dropped = Vec::new();
        let mut position = 0;
        self.params.retain(|param| {
            let keep = !body.values[*param].is_replaced();
            if !keep {
                dropped.push(position);
            }
            position += 1;
            keep
        });
        if !dropped.is_empty() {
            self.update_indices(body);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::builder::MethodBuilder;
    use crate::types::BasicValueType;
    use warp_utils::Id;

    #[test]
    fn insert_at_front_renumbers() {
        let mut ctx = Context::new();
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        ctx.declare("f", i32_ty, &[]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let block = mb.create_block("join");
        let second = mb.create_block_parameter(block, i32_ty, Id::new("b"));
        let first =
            mb.create_block_parameter_at_front(block, i32_ty, Id::new("a"));

        let body = mb.method().body();
        let params = body.block(block).params();
        assert_eq!(params.get(0), Some(first));
        assert_eq!(params.get(1), Some(second));
        assert_eq!(body.value(first).parameter_index(), Some(0));
        assert_eq!(body.value(second).parameter_index(), Some(1));
        assert_eq!(params.index_of(second), Some(1));
    }

    #[test]
    fn direct_removal_compacts_indices() {
        let mut ctx = Context::new();
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        ctx.declare("f", i32_ty, &[]).unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let block = mb.create_block("join");
        let a = mb.create_block_parameter(block, i32_ty, Id::new("a"));
        let b = mb.create_block_parameter(block, i32_ty, Id::new("b"));
        let c = mb.create_block_parameter(block, i32_ty, Id::new("c"));

        mb.remove_block_parameter(block, b).unwrap();
        {
            let body = mb.method().body();
            let params = body.block(block).params();
            assert_eq!(params.len(), 2);
            assert!(!params.contains(b));
            assert_eq!(body.value(c).parameter_index(), Some(1));
        }

        mb.remove_block_parameter_at(block, 0).unwrap();
        let body = mb.method().body();
        let params = body.block(block).params();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get(0), Some(c));
        assert_eq!(body.value(c).parameter_index(), Some(0));
        assert!(mb
            .remove_block_parameter(block, a)
            .unwrap_err()
            .is_invalid_argument());
    }
}
