//! Standard whole-object value handlers.
//!
//! Scalars serialize as plain JSON values. Object references serialize as
//! the referenced id and deserialize through the proto caches with a
//! class-mode load fallback. Component references are the exception: they
//! are owned sub-objects, so copy recursively clones them under a composite
//! child id, and compare is structural so a freshly cloned graph diffs
//! empty against its prototype.

use log::error;

use crate::ids::ObjectId;
use crate::model::constructor;
use crate::model::load_context::{ConstructionMode, ObjectLoadContext};
use crate::model::state::EngineState;
use crate::model::value::PropertyValue;
use crate::reflection::builder::TypeBuilder;
use crate::reflection::descriptor::type_ids;
use crate::reflection::registry::{TypeHandlers, TypeRegistry};
use crate::storage::{doc_id, doc_insert, doc_opt_id, keys, Document};
use crate::{Architype, ModelError, ModelResult};

fn malformed(expected: &str, doc: &Document) -> ModelError {
    ModelError::SerializationError(format!("expected {expected}, found `{doc}`"))
}

/// Share the value as-is. Used by every non-owning value type.
pub fn copy_plain(
    _state: &mut EngineState,
    _load: &mut ObjectLoadContext,
    _owner: &ObjectId,
    value: &PropertyValue,
) -> ModelResult<PropertyValue> {
    Ok(value.clone())
}

/// Structural equality of the tagged values.
pub fn compare_plain(
    _state: &EngineState,
    left: &PropertyValue,
    right: &PropertyValue,
) -> ModelResult<bool> {
    Ok(left == right)
}

pub fn to_string_plain(state: &EngineState, value: &PropertyValue) -> String {
    match value {
        PropertyValue::Ref(Some(h)) => state
            .arena
            .object(*h)
            .map(|o| o.id().to_string())
            .unwrap_or_else(|_| "<dangling>".to_owned()),
        PropertyValue::Ref(None) => "null".to_owned(),
        PropertyValue::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

macro_rules! int_codec {
    ($emit:ident, $parse:ident, $variant:ident, $get:ident, $ty:ty) => {
        fn $emit(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
            match value {
                PropertyValue::$variant(x) => Ok(Document::from(*x)),
                other => Err(ModelError::TypeMismatch {
                    expected: stringify!($ty),
                    found: other.kind(),
                }),
            }
        }
        fn $parse(doc: &Document) -> ModelResult<PropertyValue> {
            doc.$get()
                .and_then(|x| <$ty>::try_from(x).ok())
                .map(PropertyValue::$variant)
                .ok_or_else(|| malformed(stringify!($ty), doc))
        }
    };
}

int_codec!(emit_i32, parse_i32, I32, as_i64, i32);
int_codec!(emit_i64, parse_i64, I64, as_i64, i64);
int_codec!(emit_u32, parse_u32, U32, as_u64, u32);
int_codec!(emit_u64, parse_u64, U64, as_u64, u64);

fn emit_bool(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    Ok(Document::from(value.as_bool()?))
}

fn parse_bool(doc: &Document) -> ModelResult<PropertyValue> {
    doc.as_bool()
        .map(PropertyValue::Bool)
        .ok_or_else(|| malformed("bool", doc))
}

fn emit_f32(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    match value {
        PropertyValue::F32(x) => Ok(Document::from(*x)),
        other => Err(ModelError::TypeMismatch { expected: "f32", found: other.kind() }),
    }
}

fn parse_f32(doc: &Document) -> ModelResult<PropertyValue> {
    doc.as_f64()
        .map(|x| PropertyValue::F32(x as f32))
        .ok_or_else(|| malformed("f32", doc))
}

fn emit_f64(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    match value {
        PropertyValue::F64(x) => Ok(Document::from(*x)),
        other => Err(ModelError::TypeMismatch { expected: "f64", found: other.kind() }),
    }
}

fn parse_f64(doc: &Document) -> ModelResult<PropertyValue> {
    doc.as_f64()
        .map(PropertyValue::F64)
        .ok_or_else(|| malformed("f64", doc))
}

fn emit_string(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    Ok(Document::from(value.as_str()?))
}

fn parse_string(doc: &Document) -> ModelResult<PropertyValue> {
    doc.as_str()
        .map(|s| PropertyValue::String(s.to_owned()))
        .ok_or_else(|| malformed("string", doc))
}

fn emit_id(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    match value {
        PropertyValue::Id(id) => Ok(Document::from(id.as_str())),
        other => Err(ModelError::TypeMismatch { expected: "id", found: other.kind() }),
    }
}

fn parse_id(doc: &Document) -> ModelResult<PropertyValue> {
    doc.as_str()
        .map(|s| PropertyValue::Id(ObjectId::new(s)))
        .ok_or_else(|| malformed("id", doc))
}

fn emit_vec3(_: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    let [x, y, z] = value.as_vec3()?;
    Ok(serde_json::json!({ "x": x, "y": y, "z": z }))
}

fn parse_vec3(doc: &Document) -> ModelResult<PropertyValue> {
    let axis = |k: &str| doc.get(k).and_then(Document::as_f64).map(|v| v as f32);
    match (axis("x"), axis("y"), axis("z")) {
        (Some(x), Some(y), Some(z)) => Ok(PropertyValue::Vec3([x, y, z])),
        _ => Err(malformed("vec3 {x, y, z}", doc)),
    }
}

macro_rules! scalar_dispatch {
    ($de:ident, $fp:ident, $parse:ident) => {
        fn $de(
            _: &mut EngineState,
            _: &mut ObjectLoadContext,
            doc: &Document,
        ) -> ModelResult<PropertyValue> {
            $parse(doc)
        }
        fn $fp(
            _: &mut EngineState,
            _: &mut ObjectLoadContext,
            _: &ObjectId,
            proto: &PropertyValue,
            over: Option<&Document>,
        ) -> ModelResult<PropertyValue> {
            match over {
                Some(doc) => $parse(doc),
                None => Ok(proto.clone()),
            }
        }
    };
}

scalar_dispatch!(de_bool, fp_bool, parse_bool);
scalar_dispatch!(de_i32, fp_i32, parse_i32);
scalar_dispatch!(de_i64, fp_i64, parse_i64);
scalar_dispatch!(de_u32, fp_u32, parse_u32);
scalar_dispatch!(de_u64, fp_u64, parse_u64);
scalar_dispatch!(de_f32, fp_f32, parse_f32);
scalar_dispatch!(de_f64, fp_f64, parse_f64);
scalar_dispatch!(de_string, fp_string, parse_string);
scalar_dispatch!(de_id, fp_id, parse_id);
scalar_dispatch!(de_vec3, fp_vec3, parse_vec3);

/// Serialize a reference as the referenced object's id; unset references
/// serialize as null.
pub fn serialize_object_ref(state: &EngineState, value: &PropertyValue) -> ModelResult<Document> {
    match value.as_handle()? {
        Some(handle) => Ok(Document::from(state.arena.object(handle)?.id().as_str())),
        None => Ok(Document::Null),
    }
}

/// Resolve an id-form reference: local/global proto caches first, then a
/// class-mode load through the current mapping.
pub fn deserialize_object_ref(
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    doc: &Document,
) -> ModelResult<PropertyValue> {
    if doc.is_null() {
        return Ok(PropertyValue::Ref(None));
    }
    let id = doc
        .as_str()
        .map(ObjectId::new)
        .ok_or_else(|| malformed("object reference id", doc))?;
    if let Some(handle) = load.find_proto_obj(state, &id) {
        return Ok(PropertyValue::Ref(Some(handle)));
    }
    load.push_mode(ConstructionMode::ClassObj);
    let result = constructor::object_load_internal_id(state, load, &id);
    load.pop_mode();
    result.map(|h| PropertyValue::Ref(Some(h))).map_err(|e| {
        error!("failed to load referenced object `{id}`: {e}");
        match e {
            // An unmapped id means the prototype is simply not there; any
            // other failure keeps its cause.
            ModelError::DoesntExist(_) => ModelError::ProtoDoesntExist(id),
            other => other,
        }
    })
}

pub fn object_ref_from_proto(
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    _owner: &ObjectId,
    proto: &PropertyValue,
    over: Option<&Document>,
) -> ModelResult<PropertyValue> {
    match over {
        Some(doc) => deserialize_object_ref(state, load, doc),
        None => Ok(proto.clone()),
    }
}

/// Serialize a component reference. Class components (no prototype) embed
/// their full definition; derived ones write `{id, object_class}` plus the
/// diff against their prototype.
pub fn serialize_component_ref(
    state: &EngineState,
    value: &PropertyValue,
) -> ModelResult<Document> {
    let Some(handle) = value.as_handle()? else {
        return Ok(Document::Null);
    };
    let (id, proto) = {
        let obj = state.arena.object(handle)?;
        (obj.id().clone(), obj.prototype())
    };

    let mut doc = Document::Object(Default::default());
    doc_insert(&mut doc, keys::ID, Document::from(id.as_str()))?;
    match proto {
        Some(proto) => {
            let proto_id = state.arena.object(proto)?.id().clone();
            doc_insert(&mut doc, keys::OBJECT_CLASS, Document::from(proto_id.as_str()))?;
            for p in constructor::diff_object_properties(state, proto, handle)? {
                let ser = p
                    .handlers
                    .serialize
                    .unwrap_or_else(|| panic!("property `{}` has no serialize handler", p.name));
                ser(&p, state, handle, &mut doc)?;
            }
        }
        None => {
            let type_id = state.arena.object(handle)?.type_id();
            let type_name = state.registry.expect(type_id)?.type_name.clone();
            doc_insert(&mut doc, keys::TYPE_ID, Document::from(type_name.as_str()))?;
            constructor::object_properties_save(state, handle, &mut doc)?;
        }
    }
    Ok(doc)
}

/// Deserialize a component reference: embedded full definitions load in
/// place, `{id, object_class}` forms clone from the prototype and apply
/// the inline overrides.
pub fn deserialize_component_ref(
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    doc: &Document,
) -> ModelResult<PropertyValue> {
    if doc.is_null() {
        return Ok(PropertyValue::Ref(None));
    }
    if doc.get(keys::TYPE_ID).is_some() {
        let handle = constructor::object_load_internal_doc(state, load, doc)?;
        return Ok(PropertyValue::Ref(Some(handle)));
    }

    let id = doc_id(doc, keys::ID)?;
    let existing = match load.mode() {
        ConstructionMode::ClassObj => load.find_proto_obj(state, &id),
        _ => load.find_obj(state, &id),
    };
    if let Some(handle) = existing {
        return Ok(PropertyValue::Ref(Some(handle)));
    }

    let Some(class_id) = doc_opt_id(doc, keys::OBJECT_CLASS) else {
        return Err(ModelError::ProtoDoesntExist(id));
    };
    let proto = constructor::preload_proto(state, load, &class_id)?;
    let handle = constructor::object_clone_internal(state, load, proto, &id)?;
    constructor::update_object_properties(state, load, handle, doc)?;
    Ok(PropertyValue::Ref(Some(handle)))
}

/// Copy a component reference by recursively cloning the referenced
/// sub-object under the composite id `"<owner>/<referenced>"`.
pub fn copy_component_ref(
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    owner: &ObjectId,
    value: &PropertyValue,
) -> ModelResult<PropertyValue> {
    let Some(src) = value.as_handle()? else {
        return Ok(PropertyValue::Ref(None));
    };
    let base_id = {
        let obj = state.arena.object(src)?;
        match obj.prototype() {
            Some(proto) => state.arena.object(proto)?.id().clone(),
            None => obj.id().clone(),
        }
    };
    let new_id = owner.child(&base_id);
    let handle = constructor::object_clone_internal(state, load, src, &new_id)?;
    Ok(PropertyValue::Ref(Some(handle)))
}

/// Prototype-merge for a component reference: clone the prototype's
/// sub-object, then apply the override payload onto the clone.
pub fn component_from_proto(
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    owner: &ObjectId,
    proto: &PropertyValue,
    over: Option<&Document>,
) -> ModelResult<PropertyValue> {
    let cloned = copy_component_ref(state, load, owner, proto)?;
    if let (Some(doc), Some(handle)) = (over, cloned.as_handle()?) {
        constructor::update_object_properties(state, load, handle, doc)?;
    }
    Ok(cloned)
}

/// Structural compare: component references are equal when the referenced
/// sub-objects carry identical property values, identity aside. A freshly
/// cloned graph therefore diffs empty against its prototype.
pub fn compare_component_ref(
    state: &EngineState,
    left: &PropertyValue,
    right: &PropertyValue,
) -> ModelResult<bool> {
    match (left.as_handle()?, right.as_handle()?) {
        (None, None) => Ok(true),
        (Some(l), Some(r)) => {
            if l == r {
                return Ok(true);
            }
            Ok(constructor::diff_object_properties(state, l, r)
                .map(|d| d.is_empty())
                .unwrap_or(false))
        }
        _ => Ok(false),
    }
}

/// Handler table shared by every non-owning object reference.
pub fn object_ref_handlers() -> TypeHandlers {
    TypeHandlers {
        serialize: Some(serialize_object_ref),
        deserialize: Some(deserialize_object_ref),
        deserialize_from_proto: Some(object_ref_from_proto),
        copy: Some(copy_plain),
        compare: Some(compare_plain),
        to_string: Some(to_string_plain),
        ..TypeHandlers::default()
    }
}

/// Handler table for owned sub-objects (components).
pub fn component_ref_handlers() -> TypeHandlers {
    TypeHandlers {
        serialize: Some(serialize_component_ref),
        deserialize: Some(deserialize_component_ref),
        deserialize_from_proto: Some(component_from_proto),
        copy: Some(copy_component_ref),
        compare: Some(compare_component_ref),
        to_string: Some(to_string_plain),
        ..TypeHandlers::default()
    }
}

macro_rules! register_scalar {
    ($registry:expr, $id:expr, $name:literal, $emit:ident, $de:ident, $fp:ident) => {
        TypeBuilder::new($id, "base", $name, Architype::SmartObject)
            .serialize($emit)
            .deserialize($de)
            .deserialize_from_proto($fp)
            .copy(copy_plain)
            .compare(compare_plain)
            .to_string(to_string_plain)
            .register($registry);
    };
}

/// Register the scalar and external value types.
pub fn register_scalar_types(registry: &mut TypeRegistry) {
    register_scalar!(registry, type_ids::BOOL, "bool", emit_bool, de_bool, fp_bool);
    register_scalar!(registry, type_ids::I32, "i32", emit_i32, de_i32, fp_i32);
    register_scalar!(registry, type_ids::I64, "i64", emit_i64, de_i64, fp_i64);
    register_scalar!(registry, type_ids::U32, "u32", emit_u32, de_u32, fp_u32);
    register_scalar!(registry, type_ids::U64, "u64", emit_u64, de_u64, fp_u64);
    register_scalar!(registry, type_ids::F32, "f32", emit_f32, de_f32, fp_f32);
    register_scalar!(registry, type_ids::F64, "f64", emit_f64, de_f64, fp_f64);
    register_scalar!(registry, type_ids::STRING, "string", emit_string, de_string, fp_string);
    register_scalar!(registry, type_ids::ID, "object_id", emit_id, de_id, fp_id);
    register_scalar!(registry, type_ids::VEC3, "vec3", emit_vec3, de_vec3, fp_vec3);
}
