//! The IR context: the shared environment (types, id allocators) and the
//! program-level method registry.
use crate::common::NodeId;
use crate::method::Method;
use crate::types::{TypeHandle, TypeStore};
use linked_hash_map::LinkedHashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use warp_idx::{impl_index, IndexedMap};
use warp_utils::{Error, Id, WarpResult};

/// Arena key for a method inside a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);
impl_index!(MethodId);

/// The environment shared by every method of a program: the interned type
/// directory and the atomic id allocators. Read-only apart from the
/// counters, so distinct methods can be mutated from distinct threads.
#[derive(Debug)]
pub struct IrEnv {
    types: TypeStore,
    next_node_id: AtomicU32,
    next_marker: AtomicU64,
}

impl IrEnv {
    pub fn new() -> Self {
        Self {
            types: TypeStore::new(),
            next_node_id: AtomicU32::new(0),
            // marker 0 is the never-visited state of fresh blocks
            next_marker: AtomicU64::new(1),
        }
    }

    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    /// Allocate a fresh context-global node id.
    pub fn new_node_id(&self) -> NodeId {
        NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate a fresh visit marker for analysis bookkeeping.
    pub fn new_marker(&self) -> u64 {
        self.next_marker.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IrEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A program under compilation: the environment plus a deterministic
/// name-keyed method registry.
pub struct Context {
    env: IrEnv,
    methods: IndexedMap<MethodId, Method>,
    /// Name index into the arena, in declaration order.
    index: LinkedHashMap<Id, MethodId>,
    /// Extra options provided by the embedding driver, interpreted by
    /// individual passes.
    pub extra_opts: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            env: IrEnv::new(),
            methods: IndexedMap::new(),
            index: LinkedHashMap::new(),
            extra_opts: Vec::new(),
        }
    }

    pub fn env(&self) -> &IrEnv {
        &self.env
    }

    /// Intern a new method with the given signature. The entry block is
    /// created empty; mutation goes through a
    /// [`MethodBuilder`](crate::MethodBuilder).
    pub fn declare<S>(
        &mut self,
        name: S,
        return_type: TypeHandle,
        params: &[(Id, TypeHandle)],
    ) -> WarpResult<Id>
    where
        S: Into<Id>,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::invalid_argument(format!(
                "method `{name}' is already declared"
            )));
        }
        let mut method = Method::new(name, return_type, &self.env);
        for (param_name, ty) in params {
            let mut collection = std::mem::take(&mut method.params);
            collection.create_parameter(
                &mut method.body,
                &self.env,
                *ty,
                *param_name,
            );
            method.params = collection;
        }
        let id = self.methods.push(method);
        self.index.insert(name, id);
        Ok(name)
    }

    fn lookup<S>(&self, name: S) -> Option<MethodId>
    where
        S: Into<Id>,
    {
        self.index.get(&name.into()).copied()
    }

    pub fn find_method<S>(&self, name: S) -> Option<&Method>
    where
        S: Into<Id>,
    {
        self.lookup(name).map(|id| &self.methods[id])
    }

    pub fn find_method_mut<S>(&mut self, name: S) -> Option<&mut Method>
    where
        S: Into<Id>,
    {
        let id = self.lookup(name)?;
        Some(&mut self.methods[id])
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    /// Method names in declaration order.
    pub fn method_names(&self) -> Vec<Id> {
        self.index.keys().copied().collect()
    }

    /// Split the borrow so that drivers can hand out `&mut Method`
    /// together with the shared environment.
    pub fn split_mut(
        &mut self,
    ) -> (&IrEnv, impl Iterator<Item = &mut Method>) {
        (&self.env, self.methods.values_mut())
    }

    /// The environment and one method, mutably. Fails when the method is
    /// unknown.
    pub fn method_with_env<S>(
        &mut self,
        name: S,
    ) -> WarpResult<(&IrEnv, &mut Method)>
    where
        S: Into<Id>,
    {
        let id = self.lookup(name).ok_or_else(|| {
            Error::invalid_argument("no method with that name")
        })?;
        Ok((&self.env, &mut self.methods[id]))
    }

    /// The environment, one method mutably, and a second method read-only.
    /// Used by call specialisation, which rebuilds the callee's graph
    /// while mutating the caller.
    pub fn method_and_callee<S, T>(
        &mut self,
        caller: S,
        callee: T,
    ) -> WarpResult<(&IrEnv, &mut Method, &Method)>
    where
        S: Into<Id>,
        T: Into<Id>,
    {
        let caller: Id = caller.into();
        let callee: Id = callee.into();
        let caller_id = self.lookup(caller).ok_or_else(|| {
            Error::invalid_argument(format!("no method named `{caller}'"))
        })?;
        let callee_id = self.lookup(callee).ok_or_else(|| {
            Error::invalid_argument(format!("no method named `{callee}'"))
        })?;
        let (caller, callee) = self
            .methods
            .split_mut_indices(caller_id, callee_id)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "a method cannot be specialised into itself",
                )
            })?;
        Ok((&self.env, caller, &*callee))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicValueType;

    #[test]
    fn declare_rejects_duplicates() {
        let mut ctx = Context::new();
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        ctx.declare("f", i32_ty, &[]).unwrap();
        let err = ctx.declare("f", i32_ty, &[]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn declared_params_are_numbered() {
        let mut ctx = Context::new();
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        ctx.declare(
            "f",
            i32_ty,
            &[(Id::new("x"), i32_ty), (Id::new("y"), i32_ty)],
        )
        .unwrap();
        let method = ctx.find_method("f").unwrap();
        let params: Vec<_> = method.params().iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(method.body().value(params[0]).parameter_index(), Some(0));
        assert_eq!(method.body().value(params[1]).parameter_index(), Some(1));
        assert_eq!(method.body().value(params[0]).block(), None);
    }

    #[test]
    fn node_ids_are_monotone() {
        let env = IrEnv::new();
        let a = env.new_node_id();
        let b = env.new_node_id();
        assert!(a < b);
    }
}
