//! The sealed directory of interned type descriptors. Types are created
//! once when the environment is built and are immutable afterwards; the IR
//! only ever sees copyable [`TypeHandle`]s.
use warp_idx::{impl_index, IndexedMap};

/// The primitive value types the accelerator backends understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicValueType {
    Int1,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
}

impl BasicValueType {
    const ALL: [BasicValueType; 8] = [
        BasicValueType::Int1,
        BasicValueType::Int8,
        BasicValueType::Int16,
        BasicValueType::Int32,
        BasicValueType::Int64,
        BasicValueType::Float16,
        BasicValueType::Float32,
        BasicValueType::Float64,
    ];

    pub fn is_int(&self) -> bool {
        matches!(
            self,
            BasicValueType::Int1
                | BasicValueType::Int8
                | BasicValueType::Int16
                | BasicValueType::Int32
                | BasicValueType::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        !self.is_int()
    }
}

impl std::fmt::Display for BasicValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BasicValueType::Int1 => "i1",
            BasicValueType::Int8 => "i8",
            BasicValueType::Int16 => "i16",
            BasicValueType::Int32 => "i32",
            BasicValueType::Int64 => "i64",
            BasicValueType::Float16 => "f16",
            BasicValueType::Float32 => "f32",
            BasicValueType::Float64 => "f64",
        };
        write!(f, "{name}")
    }
}

/// The shape of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Primitive(BasicValueType),
}

/// Copyable handle to an interned type. Handle equality is type equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(u32);
impl_index!(TypeHandle);

/// The interned type directory. Constructed once with every primitive type
/// and the void singleton; read-only afterwards.
#[derive(Debug)]
pub struct TypeStore {
    kinds: IndexedMap<TypeHandle, TypeKind>,
    void: TypeHandle,
    primitives: [TypeHandle; 8],
}

impl TypeStore {
    pub fn new() -> Self {
        let mut kinds = IndexedMap::new();
        let void = kinds.push(TypeKind::Void);
        let primitives = BasicValueType::ALL
            .map(|bvt| kinds.push(TypeKind::Primitive(bvt)));
        Self {
            kinds,
            void,
            primitives,
        }
    }

    /// The void singleton.
    pub fn void(&self) -> TypeHandle {
        self.void
    }

    /// The handle for a primitive type.
    pub fn primitive(&self, bvt: BasicValueType) -> TypeHandle {
        let idx = BasicValueType::ALL
            .iter()
            .position(|other| *other == bvt)
            .unwrap_or_else(|| unreachable!());
        self.primitives[idx]
    }

    pub fn kind(&self, handle: TypeHandle) -> TypeKind {
        self.kinds[handle]
    }

    pub fn is_void(&self, handle: TypeHandle) -> bool {
        handle == self.void
    }

    pub fn is_primitive(&self, handle: TypeHandle) -> bool {
        matches!(self.kinds[handle], TypeKind::Primitive(_))
    }

    /// The basic value type behind a handle, if it is primitive.
    pub fn basic_value_type(
        &self,
        handle: TypeHandle,
    ) -> Option<BasicValueType> {
        match self.kinds[handle] {
            TypeKind::Void => None,
            TypeKind::Primitive(bvt) => Some(bvt),
        }
    }

    pub fn is_integer(&self, handle: TypeHandle) -> bool {
        self.basic_value_type(handle)
            .map(|bvt| bvt.is_int())
            .unwrap_or(false)
    }

    /// Textual form used by the printer and by error messages.
    pub fn format(&self, handle: TypeHandle) -> String {
        match self.kinds[handle] {
            TypeKind::Void => "void".to_string(),
            TypeKind::Primitive(bvt) => bvt.to_string(),
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}
