//! Fluent type registration.

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::reflection::descriptor::TypeId;
use crate::reflection::property::Property;
use crate::reflection::registry::{
    AllocFn, PostLoadFn, ReflectionType, TickFn, TypeHandlers, TypeRegistry, ValueCompareFn,
    ValueCopyFn, ValueDeserializeFn, ValueFromProtoFn, ValueSerializeFn, ValueToStringFn,
};

/// Builds and registers one [`ReflectionType`].
#[derive(Debug)]
pub struct TypeBuilder {
    ty: ReflectionType,
}

impl TypeBuilder {
    pub fn new(type_id: TypeId, module_id: &str, name: &str, architype: Architype) -> Self {
        Self {
            ty: ReflectionType::new(
                type_id,
                ObjectId::new(module_id),
                ObjectId::new(name),
                architype,
            ),
        }
    }

    pub fn parent(mut self, parent: TypeId) -> Self {
        self.ty.parent = Some(parent);
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.ty.local_properties.push(property);
        self
    }

    pub fn handlers(mut self, handlers: TypeHandlers) -> Self {
        self.ty.handlers = handlers;
        self
    }

    pub fn alloc(mut self, f: AllocFn) -> Self {
        self.ty.handlers.alloc = Some(f);
        self
    }

    pub fn serialize(mut self, f: ValueSerializeFn) -> Self {
        self.ty.handlers.serialize = Some(f);
        self
    }

    pub fn deserialize(mut self, f: ValueDeserializeFn) -> Self {
        self.ty.handlers.deserialize = Some(f);
        self
    }

    pub fn deserialize_from_proto(mut self, f: ValueFromProtoFn) -> Self {
        self.ty.handlers.deserialize_from_proto = Some(f);
        self
    }

    pub fn copy(mut self, f: ValueCopyFn) -> Self {
        self.ty.handlers.copy = Some(f);
        self
    }

    pub fn instantiate(mut self, f: ValueCopyFn) -> Self {
        self.ty.handlers.instantiate = Some(f);
        self
    }

    pub fn compare(mut self, f: ValueCompareFn) -> Self {
        self.ty.handlers.compare = Some(f);
        self
    }

    pub fn to_string(mut self, f: ValueToStringFn) -> Self {
        self.ty.handlers.to_string = Some(f);
        self
    }

    pub fn post_load(mut self, f: PostLoadFn) -> Self {
        self.ty.handlers.post_load = Some(f);
        self
    }

    pub fn tick(mut self, f: TickFn) -> Self {
        self.ty.handlers.tick = Some(f);
        self
    }

    pub fn register(self, registry: &mut TypeRegistry) {
        registry.add_type(self.ty);
    }
}
