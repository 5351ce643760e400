//! The runtime type registry.
//!
//! Types register once at startup, then [`TypeRegistry::finalize`] runs
//! exactly once: it walks each inheritance chain to the nearest initialized
//! ancestor, merges property lists parent-first, assigns slots, resolves
//! unset whole-object handlers from the nearest ancestor and builds the
//! derived views (serialization list, editor buckets, default value
//! template). Registration mistakes are programmer errors and panic.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::model::arena::ObjectHandle;
use crate::model::load_context::ObjectLoadContext;
use crate::model::object::SmartObject;
use crate::model::state::EngineState;
use crate::model::value::PropertyValue;
use crate::reflection::descriptor::{type_ids, TypeId};
use crate::reflection::property::{fill_default_handlers, Property};
use crate::storage::Document;
use crate::{ModelError, ModelResult};

pub type AllocFn = fn(&ReflectionType, &ObjectId) -> SmartObject;
pub type ValueSerializeFn = fn(&EngineState, &PropertyValue) -> ModelResult<Document>;
pub type ValueDeserializeFn =
    fn(&mut EngineState, &mut ObjectLoadContext, &Document) -> ModelResult<PropertyValue>;
/// Prototype-merge per element: the destination owner id, the prototype's
/// value and the override document (if the key was present).
pub type ValueFromProtoFn = fn(
    &mut EngineState,
    &mut ObjectLoadContext,
    &ObjectId,
    &PropertyValue,
    Option<&Document>,
) -> ModelResult<PropertyValue>;
pub type ValueCopyFn = fn(
    &mut EngineState,
    &mut ObjectLoadContext,
    &ObjectId,
    &PropertyValue,
) -> ModelResult<PropertyValue>;
pub type ValueCompareFn =
    fn(&EngineState, &PropertyValue, &PropertyValue) -> ModelResult<bool>;
pub type ValueToStringFn = fn(&EngineState, &PropertyValue) -> String;
pub type PostLoadFn = fn(&mut EngineState, ObjectHandle) -> ModelResult<()>;
pub type TickFn = fn(&mut EngineState, ObjectHandle, f32) -> ModelResult<()>;

/// Whole-object handler table. Unset slots inherit from the nearest
/// ancestor at finalize.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeHandlers {
    pub alloc: Option<AllocFn>,
    pub serialize: Option<ValueSerializeFn>,
    pub deserialize: Option<ValueDeserializeFn>,
    pub deserialize_from_proto: Option<ValueFromProtoFn>,
    pub copy: Option<ValueCopyFn>,
    pub instantiate: Option<ValueCopyFn>,
    pub compare: Option<ValueCompareFn>,
    pub to_string: Option<ValueToStringFn>,
    pub post_load: Option<PostLoadFn>,
    pub tick: Option<TickFn>,
}

/// Reflection entry of one type.
#[derive(Debug)]
pub struct ReflectionType {
    pub type_id: TypeId,
    pub module_id: ObjectId,
    pub type_name: ObjectId,
    pub architype: Architype,
    pub parent: Option<TypeId>,
    pub handlers: TypeHandlers,
    /// Properties declared on this type only, in declaration order.
    pub local_properties: Vec<Property>,
    /// Merged list, parent properties first. Valid after finalize.
    pub properties: Arc<[Property]>,
    /// Serializable subset of `properties`. Valid after finalize.
    pub serialization_properties: Arc<[Property]>,
    /// Properties grouped by category. Valid after finalize.
    pub editor_properties: FxHashMap<String, Vec<Property>>,
    /// Per-slot default values. Valid after finalize.
    pub default_values: Vec<PropertyValue>,
    pub initialized: bool,
}

impl ReflectionType {
    pub fn new(type_id: TypeId, module_id: ObjectId, type_name: ObjectId, architype: Architype) -> Self {
        Self {
            type_id,
            module_id,
            type_name,
            architype,
            parent: None,
            handlers: TypeHandlers::default(),
            local_properties: Vec::new(),
            properties: Arc::from(Vec::new()),
            serialization_properties: Arc::from(Vec::new()),
            editor_properties: FxHashMap::default(),
            default_values: Vec::new(),
            initialized: false,
        }
    }

    /// Allocate an empty object of this type with the default value
    /// template, or through the alloc handler when one is registered.
    pub fn alloc_empty(&self, id: &ObjectId) -> SmartObject {
        match self.handlers.alloc {
            Some(f) => f(self, id),
            None => SmartObject::new(
                id.clone(),
                self.type_id,
                self.architype,
                self.default_values.clone(),
            ),
        }
    }
}

fn default_value_for(p: &Property) -> PropertyValue {
    if p.descriptor.is_collection {
        return PropertyValue::Collection(Vec::new());
    }
    if p.descriptor.is_ref {
        return PropertyValue::Ref(None);
    }
    match p.descriptor.type_id {
        type_ids::BOOL => PropertyValue::Bool(false),
        type_ids::I32 => PropertyValue::I32(0),
        type_ids::I64 => PropertyValue::I64(0),
        type_ids::U32 => PropertyValue::U32(0),
        type_ids::U64 => PropertyValue::U64(0),
        type_ids::F32 => PropertyValue::F32(0.0),
        type_ids::F64 => PropertyValue::F64(0.0),
        type_ids::STRING => PropertyValue::String(String::new()),
        type_ids::ID => PropertyValue::Id(ObjectId::new("")),
        type_ids::VEC3 => PropertyValue::Vec3([0.0; 3]),
        other => panic!(
            "no inline default for value type {other:?} (property `{}`)",
            p.name
        ),
    }
}

/// All registered types, addressable by id and by name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<ReflectionType>,
    by_id: FxHashMap<u32, usize>,
    by_name: FxHashMap<ObjectId, usize>,
    finalized: bool,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Register a type. Duplicate ids or names, and registration after
    /// finalize, are fatal.
    pub fn add_type(&mut self, ty: ReflectionType) {
        assert!(!self.finalized, "type registered after finalize: {}", ty.type_name);
        assert!(
            !self.by_id.contains_key(&ty.type_id.0),
            "duplicate type id: {:?}",
            ty.type_id
        );
        assert!(
            !self.by_name.contains_key(&ty.type_name),
            "duplicate type name: {}",
            ty.type_name
        );
        let idx = self.types.len();
        self.by_id.insert(ty.type_id.0, idx);
        self.by_name.insert(ty.type_name.clone(), idx);
        self.types.push(ty);
    }

    pub fn get(&self, type_id: TypeId) -> Option<&ReflectionType> {
        self.by_id.get(&type_id.0).map(|&i| &self.types[i])
    }

    pub fn get_by_name(&self, name: &ObjectId) -> Option<&ReflectionType> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn expect(&self, type_id: TypeId) -> ModelResult<&ReflectionType> {
        self.get(type_id)
            .ok_or_else(|| ModelError::DoesntExist(format!("type {:?}", type_id)))
    }

    pub fn expect_by_name(&self, name: &ObjectId) -> ModelResult<&ReflectionType> {
        self.get_by_name(name)
            .ok_or_else(|| ModelError::IdNotFound(name.clone()))
    }

    fn parent_index(&self, idx: usize) -> Option<usize> {
        let parent = self.types[idx].parent?;
        Some(*self.by_id.get(&parent.0).unwrap_or_else(|| {
            panic!(
                "unknown parent type {:?} of {}",
                parent, self.types[idx].type_name
            )
        }))
    }

    /// Merge properties and resolve handlers across the inheritance forest.
    /// Runs exactly once.
    pub fn finalize(&mut self) {
        assert!(!self.finalized, "registry finalized twice");
        self.finalized = true;

        for start in 0..self.types.len() {
            // Walk up to the nearest initialized ancestor (or the root).
            let mut chain = Vec::new();
            let mut cur = Some(start);
            while let Some(idx) = cur {
                chain.push(idx);
                if self.types[idx].initialized {
                    break;
                }
                cur = self.parent_index(idx);
            }

            // Unwind, threading the accumulated parent list down the chain.
            let mut inherited: Vec<Property> = Vec::new();
            while let Some(idx) = chain.pop() {
                if self.types[idx].initialized {
                    inherited = self.types[idx].properties.to_vec();
                    continue;
                }
                let ty = &mut self.types[idx];
                let mut merged = inherited;
                for mut prop in ty.local_properties.clone() {
                    prop.slot = merged.len();
                    fill_default_handlers(&mut prop);
                    merged.push(prop);
                }
                ty.properties = Arc::from(merged.clone());
                ty.initialized = true;
                inherited = merged;
            }
        }

        // Nearest-ancestor fallback for unset whole-object handlers.
        for idx in 0..self.types.len() {
            let mut resolved = self.types[idx].handlers;
            let mut cur = self.parent_index(idx);
            while let Some(pidx) = cur {
                let ph = self.types[pidx].handlers;
                resolved.alloc = resolved.alloc.or(ph.alloc);
                resolved.serialize = resolved.serialize.or(ph.serialize);
                resolved.deserialize = resolved.deserialize.or(ph.deserialize);
                resolved.deserialize_from_proto =
                    resolved.deserialize_from_proto.or(ph.deserialize_from_proto);
                resolved.copy = resolved.copy.or(ph.copy);
                resolved.instantiate = resolved.instantiate.or(ph.instantiate);
                resolved.compare = resolved.compare.or(ph.compare);
                resolved.to_string = resolved.to_string.or(ph.to_string);
                resolved.post_load = resolved.post_load.or(ph.post_load);
                resolved.tick = resolved.tick.or(ph.tick);
                cur = self.parent_index(pidx);
            }
            self.types[idx].handlers = resolved;
        }

        // Derived views and the per-type default value template.
        for idx in 0..self.types.len() {
            let props = self.types[idx].properties.clone();
            let serialization: Vec<Property> =
                props.iter().filter(|p| p.serializable).cloned().collect();

            for p in &serialization {
                let vt = self.get(p.descriptor.type_id).unwrap_or_else(|| {
                    panic!(
                        "unregistered value type {:?} for property `{}.{}`",
                        p.descriptor.type_id, self.types[idx].type_name, p.name
                    )
                });
                let h = &vt.handlers;
                assert!(
                    h.serialize.is_some()
                        && h.deserialize.is_some()
                        && h.copy.is_some()
                        && h.compare.is_some(),
                    "incomplete handler set on value type {} for property `{}.{}`",
                    vt.type_name,
                    self.types[idx].type_name,
                    p.name
                );
            }

            let mut editor: FxHashMap<String, Vec<Property>> = FxHashMap::default();
            for p in props.iter() {
                editor.entry(p.category.clone()).or_default().push(p.clone());
            }

            let defaults = props.iter().map(default_value_for).collect();

            let ty = &mut self.types[idx];
            ty.serialization_properties = Arc::from(serialization);
            ty.editor_properties = editor;
            ty.default_values = defaults;
        }
    }
}
