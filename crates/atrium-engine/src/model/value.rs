//! Property value storage.
//!
//! Objects store their reflected state as a vector of tagged values indexed
//! by the property slots the registry assigns at finalize. Reference-typed
//! properties hold arena handles; collections hold nested value vectors.

use crate::ids::ObjectId;
use crate::model::arena::ObjectHandle;
use crate::{ModelError, ModelResult};

/// One reflected property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Id(ObjectId),
    Vec3([f32; 3]),
    /// Reference to another object in the arena; `None` until assigned.
    Ref(Option<ObjectHandle>),
    /// Ordered collection of values of one element shape.
    Collection(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Variant tag, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::I32(_) => "i32",
            PropertyValue::I64(_) => "i64",
            PropertyValue::U32(_) => "u32",
            PropertyValue::U64(_) => "u64",
            PropertyValue::F32(_) => "f32",
            PropertyValue::F64(_) => "f64",
            PropertyValue::String(_) => "string",
            PropertyValue::Id(_) => "id",
            PropertyValue::Vec3(_) => "vec3",
            PropertyValue::Ref(_) => "ref",
            PropertyValue::Collection(_) => "collection",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ModelError {
        ModelError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_handle(&self) -> ModelResult<Option<ObjectHandle>> {
        match self {
            PropertyValue::Ref(h) => Ok(*h),
            other => Err(other.mismatch("ref")),
        }
    }

    pub fn as_collection(&self) -> ModelResult<&[PropertyValue]> {
        match self {
            PropertyValue::Collection(items) => Ok(items),
            other => Err(other.mismatch("collection")),
        }
    }

    pub fn as_bool(&self) -> ModelResult<bool> {
        match self {
            PropertyValue::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_str(&self) -> ModelResult<&str> {
        match self {
            PropertyValue::String(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_vec3(&self) -> ModelResult<[f32; 3]> {
        match self {
            PropertyValue::Vec3(v) => Ok(*v),
            other => Err(other.mismatch("vec3")),
        }
    }
}
