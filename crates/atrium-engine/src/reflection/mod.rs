//! Reflection metadata: type descriptors, properties and the registry.

pub mod builder;
pub mod descriptor;
pub mod handlers;
pub mod property;
pub mod registry;

pub use builder::TypeBuilder;
pub use descriptor::{type_ids, TypeDescriptor, TypeId};
pub use property::{Property, PropertyHandlers};
pub use registry::{ReflectionType, TypeHandlers, TypeRegistry};
