//! Atrium engine core: a reflected prototype/instance object system.
//!
//! The crate hosts a runtime type registry with single-inheritance property
//! merging, a generational object arena, the object constructor (load,
//! clone, save, diff), architype-partitioned caches with load-scoped
//! contexts, package and level containers, and the incremental render
//! dependency graph, including:
//! - Reflection metadata and handler dispatch (`reflection`)
//! - Object model, caches and containers (`model`)
//! - Render bridge seam and dependency tracking (`render`)
//! - The standard type set (`base`)

#![warn(missing_debug_implementations)]
#![allow(clippy::result_large_err)]

pub mod base;
pub mod ids;
pub mod model;
pub mod reflection;
pub mod render;
pub mod storage;

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::ObjectId;
use crate::model::object::ObjectState;

pub use crate::ids::ObjectId as Id;
pub use crate::model::arena::{ObjectArena, ObjectHandle};
pub use crate::model::architype::Architype;
pub use crate::model::object::SmartObject;
pub use crate::model::state::EngineState;
pub use crate::model::value::PropertyValue;
pub use crate::reflection::registry::TypeRegistry;
pub use crate::storage::Document;

/// Errors produced by the object model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Generic unrecoverable operation failure.
    #[error("operation failed")]
    Failed,

    /// A prototype referenced by id could not be found or loaded.
    #[error("prototype object does not exist: {0}")]
    ProtoDoesntExist(ObjectId),

    /// A requested entity (object, property, mapping entry) does not exist.
    #[error("entity does not exist: {0}")]
    DoesntExist(String),

    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A resolved filesystem path does not exist or cannot be accessed.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// An id lookup (type, object) found nothing.
    #[error("id not found: {0}")]
    IdNotFound(ObjectId),

    /// The render backend failed to compile resources for an object.
    #[error("render compilation failed: {0}")]
    CompilationFailed(String),

    /// A lifecycle transition outside the allowed state graph.
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ObjectState, to: ObjectState },

    /// The object already belongs to a container.
    #[error("owner already set on object: {0}")]
    OwnerAlreadySet(ObjectId),

    /// The object already has a prototype back-reference.
    #[error("prototype already set on object: {0}")]
    PrototypeAlreadySet(ObjectId),

    /// An `ObjectHandle` whose slot was freed or reused.
    #[error("dangling object handle")]
    DanglingHandle,

    /// A property value did not match the expected variant.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Convenience alias used across the object model.
pub type ModelResult<T> = Result<T, ModelError>;
