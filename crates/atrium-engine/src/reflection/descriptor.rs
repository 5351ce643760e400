//! Type ids and property shape descriptors.

/// Registry-wide identifier of a reflection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Storage shape of a property: which value type it holds, whether the slot
/// stores an arena handle instead of an inline value, and whether it is a
/// collection of such elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub is_ref: bool,
    pub is_collection: bool,
}

impl TypeDescriptor {
    /// Inline value of `type_id`.
    pub fn value(type_id: TypeId) -> Self {
        Self {
            type_id,
            is_ref: false,
            is_collection: false,
        }
    }

    /// Single handle to an object of `type_id`.
    pub fn reference(type_id: TypeId) -> Self {
        Self {
            type_id,
            is_ref: true,
            is_collection: false,
        }
    }

    /// Ordered collection of handles to objects of `type_id`.
    pub fn ref_collection(type_id: TypeId) -> Self {
        Self {
            type_id,
            is_ref: true,
            is_collection: true,
        }
    }

    /// Ordered collection of inline values of `type_id`.
    pub fn value_collection(type_id: TypeId) -> Self {
        Self {
            type_id,
            is_ref: false,
            is_collection: true,
        }
    }
}

/// Well-known scalar and external type ids. Domain type ids live with their
/// registration in [`crate::base`].
pub mod type_ids {
    use super::TypeId;

    pub const BOOL: TypeId = TypeId(1);
    pub const I32: TypeId = TypeId(2);
    pub const I64: TypeId = TypeId(3);
    pub const U32: TypeId = TypeId(4);
    pub const U64: TypeId = TypeId(5);
    pub const F32: TypeId = TypeId(6);
    pub const F64: TypeId = TypeId(7);
    pub const STRING: TypeId = TypeId(8);
    pub const ID: TypeId = TypeId(9);
    pub const VEC3: TypeId = TypeId(10);
}
