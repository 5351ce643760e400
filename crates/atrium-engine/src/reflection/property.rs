//! Property descriptors and default handler dispatch.
//!
//! A [`Property`] names a slot in its owning type's value vector and carries
//! an optional per-property handler set. Finalize fills every `None` handler
//! with the default dispatcher below, which reduces the slot (follows the
//! handle for reference-typed properties) and invokes the *value type's*
//! whole-object handler from the registry. Collections dispatch per element,
//! recording `order_idx` on save and placing elements by it on load.

use crate::ids::ObjectId;
use crate::model::arena::ObjectHandle;
use crate::model::load_context::ObjectLoadContext;
use crate::model::state::EngineState;
use crate::model::value::PropertyValue;
use crate::reflection::descriptor::TypeDescriptor;
use crate::reflection::registry::{TypeHandlers, ValueCopyFn};
use crate::storage::{doc_insert, keys, Document};
use crate::{ModelError, ModelResult};

pub type PropSerializeFn =
    fn(&Property, &EngineState, ObjectHandle, &mut Document) -> ModelResult<()>;
pub type PropDeserializeFn = fn(
    &Property,
    &mut EngineState,
    &mut ObjectLoadContext,
    ObjectHandle,
    &Document,
) -> ModelResult<()>;
pub type PropFromProtoFn = fn(
    &Property,
    &mut EngineState,
    &mut ObjectLoadContext,
    ObjectHandle,
    ObjectHandle,
    &Document,
) -> ModelResult<()>;
pub type PropCopyFn = fn(
    &Property,
    &mut EngineState,
    &mut ObjectLoadContext,
    ObjectHandle,
    ObjectHandle,
) -> ModelResult<()>;
pub type PropCompareFn =
    fn(&Property, &EngineState, ObjectHandle, ObjectHandle) -> ModelResult<bool>;
pub type PropToStringFn = fn(&Property, &EngineState, ObjectHandle) -> String;

/// Per-property handler overrides. `None` slots resolve to the default
/// dispatchers at finalize.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyHandlers {
    pub serialize: Option<PropSerializeFn>,
    pub deserialize: Option<PropDeserializeFn>,
    pub deserialize_from_proto: Option<PropFromProtoFn>,
    pub copy: Option<PropCopyFn>,
    pub compare: Option<PropCompareFn>,
    pub to_string: Option<PropToStringFn>,
}

/// One reflected property of a type.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    /// Index into the owning object's value vector, assigned at finalize.
    pub slot: usize,
    pub descriptor: TypeDescriptor,
    pub category: String,
    pub serializable: bool,
    /// Absent document keys are tolerated and leave the default value.
    pub has_default: bool,
    /// Participates in the render dependency graph.
    pub render_subobject: bool,
    pub handlers: PropertyHandlers,
}

impl Property {
    pub fn new(name: &str, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.to_owned(),
            slot: usize::MAX,
            descriptor,
            category: String::new(),
            serializable: false,
            has_default: false,
            render_subobject: false,
            handlers: PropertyHandlers::default(),
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    pub fn serializable(mut self) -> Self {
        self.serializable = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn render_subobject(mut self) -> Self {
        self.render_subobject = true;
        self
    }

    pub fn on_serialize(mut self, f: PropSerializeFn) -> Self {
        self.handlers.serialize = Some(f);
        self
    }

    pub fn on_deserialize(mut self, f: PropDeserializeFn) -> Self {
        self.handlers.deserialize = Some(f);
        self
    }

    pub fn on_compare(mut self, f: PropCompareFn) -> Self {
        self.handlers.compare = Some(f);
        self
    }
}

fn value_handlers<'a>(state: &'a EngineState, p: &Property) -> &'a TypeHandlers {
    state
        .registry
        .get(p.descriptor.type_id)
        .map(|rt| &rt.handlers)
        .unwrap_or_else(|| {
            panic!(
                "unregistered value type {:?} for property `{}`",
                p.descriptor.type_id, p.name
            )
        })
}

macro_rules! value_handler {
    ($state:expr, $p:expr, $slot:ident) => {
        value_handlers($state, $p).$slot.unwrap_or_else(|| {
            panic!(
                "missing `{}` handler on value type of property `{}`",
                stringify!($slot),
                $p.name
            )
        })
    };
}

/// Default serialize: reduce the slot and emit under the property name;
/// collections emit `[{order_idx, value}]`.
pub fn default_serialize(
    p: &Property,
    state: &EngineState,
    obj: ObjectHandle,
    out: &mut Document,
) -> ModelResult<()> {
    let value = state.arena.object(obj)?.value(p.slot).clone();
    let ser = value_handler!(state, p, serialize);

    let doc = if p.descriptor.is_collection {
        let items = value.as_collection()?;
        let mut arr = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let mut entry = Document::Object(Default::default());
            doc_insert(&mut entry, keys::ORDER_IDX, Document::from(idx))?;
            doc_insert(&mut entry, keys::VALUE, ser(state, item)?)?;
            arr.push(entry);
        }
        Document::Array(arr)
    } else {
        ser(state, &value)?
    };
    doc_insert(out, &p.name, doc)
}

fn collection_entry(item: &Document) -> ModelResult<(usize, &Document)> {
    let idx = item
        .get(keys::ORDER_IDX)
        .and_then(Document::as_u64)
        .ok_or_else(|| ModelError::SerializationError("collection entry without order_idx".into()))?;
    let payload = item
        .get(keys::VALUE)
        .ok_or_else(|| ModelError::SerializationError("collection entry without value".into()))?;
    Ok((idx as usize, payload))
}

/// Default deserialize: a missing key is `DoesntExist` (the caller tolerates
/// it for `has_default` properties); collection elements land at their
/// recorded `order_idx`.
pub fn default_deserialize(
    p: &Property,
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    obj: ObjectHandle,
    doc: &Document,
) -> ModelResult<()> {
    let Some(entry) = doc.get(&p.name) else {
        return Err(ModelError::DoesntExist(p.name.clone()));
    };
    let de = value_handler!(&*state, p, deserialize);

    let value = if p.descriptor.is_collection {
        let arr = entry.as_array().ok_or_else(|| {
            ModelError::SerializationError(format!("property `{}` is not a collection", p.name))
        })?;
        let mut placed: Vec<Option<PropertyValue>> = vec![None; arr.len()];
        for item in arr {
            let (idx, payload) = collection_entry(item)?;
            if idx >= placed.len() {
                placed.resize(idx + 1, None);
            }
            placed[idx] = Some(de(state, load, payload)?);
        }
        let items = placed
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    ModelError::SerializationError(format!(
                        "gap in collection property `{}`",
                        p.name
                    ))
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;
        PropertyValue::Collection(items)
    } else {
        de(state, load, entry)?
    };

    state.arena.object_mut(obj)?.set_value(p.slot, value);
    Ok(())
}

fn copy_with(
    p: &Property,
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    src: ObjectHandle,
    dst: ObjectHandle,
    copy: ValueCopyFn,
) -> ModelResult<()> {
    let value = state.arena.object(src)?.value(p.slot).clone();
    let dst_id = state.arena.object(dst)?.id().clone();

    let out = if p.descriptor.is_collection {
        let items = value.as_collection()?;
        let mut copied = Vec::with_capacity(items.len());
        for item in items {
            copied.push(copy(state, load, &dst_id, item)?);
        }
        PropertyValue::Collection(copied)
    } else {
        copy(state, load, &dst_id, &value)?
    };

    state.arena.object_mut(dst)?.set_value(p.slot, out);
    Ok(())
}

/// Default copy: per-element value-type copy into the destination slot.
pub fn default_copy(
    p: &Property,
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    src: ObjectHandle,
    dst: ObjectHandle,
) -> ModelResult<()> {
    let copy = value_handler!(&*state, p, copy);
    copy_with(p, state, load, src, dst, copy)
}

/// Instantiate variant: prefers the value type's instantiate handler,
/// falling back to copy.
pub fn default_instantiate(
    p: &Property,
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    src: ObjectHandle,
    dst: ObjectHandle,
) -> ModelResult<()> {
    let copy = match value_handlers(state, p).instantiate {
        Some(f) => f,
        None => value_handler!(&*state, p, copy),
    };
    copy_with(p, state, load, src, dst, copy)
}

/// Default prototype-merge load: document keys override (through the value
/// type's from-proto handler), absent keys copy from the prototype.
pub fn default_from_proto(
    p: &Property,
    state: &mut EngineState,
    load: &mut ObjectLoadContext,
    proto: ObjectHandle,
    dst: ObjectHandle,
    doc: &Document,
) -> ModelResult<()> {
    let proto_value = state.arena.object(proto)?.value(p.slot).clone();
    let dst_id = state.arena.object(dst)?.id().clone();
    let handlers = value_handlers(state, p);
    let from_proto = handlers.deserialize_from_proto;
    let copy = value_handler!(&*state, p, copy);
    let de = value_handler!(&*state, p, deserialize);
    let over = doc.get(&p.name);

    let merge_one = |state: &mut EngineState,
                     load: &mut ObjectLoadContext,
                     proto_item: &PropertyValue,
                     over_doc: Option<&Document>|
     -> ModelResult<PropertyValue> {
        match (from_proto, over_doc) {
            (Some(f), o) => f(state, load, &dst_id, proto_item, o),
            (None, Some(d)) => de(state, load, d),
            (None, None) => copy(state, load, &dst_id, proto_item),
        }
    };

    let out = if p.descriptor.is_collection {
        let proto_items = proto_value.as_collection()?.to_vec();
        let mut overrides: Vec<Option<&Document>> = vec![None; proto_items.len()];
        let mut extras: Vec<&Document> = Vec::new();
        if let Some(arr_doc) = over {
            let arr = arr_doc.as_array().ok_or_else(|| {
                ModelError::SerializationError(format!(
                    "property `{}` override is not a collection",
                    p.name
                ))
            })?;
            for item in arr {
                let (idx, payload) = collection_entry(item)?;
                if idx < overrides.len() {
                    overrides[idx] = Some(payload);
                } else {
                    extras.push(payload);
                }
            }
        }
        let mut merged = Vec::with_capacity(proto_items.len() + extras.len());
        for (proto_item, over_doc) in proto_items.iter().zip(overrides) {
            merged.push(merge_one(state, load, proto_item, over_doc)?);
        }
        // Elements the instance adds beyond the prototype's length.
        for payload in extras {
            merged.push(de(state, load, payload)?);
        }
        PropertyValue::Collection(merged)
    } else {
        merge_one(state, load, &proto_value, over)?
    };

    state.arena.object_mut(dst)?.set_value(p.slot, out);
    Ok(())
}

/// Default compare: ordered elementwise for collections; differing lengths
/// compare unequal.
pub fn default_compare(
    p: &Property,
    state: &EngineState,
    left: ObjectHandle,
    right: ObjectHandle,
) -> ModelResult<bool> {
    let cmp = value_handler!(state, p, compare);
    let lv = state.arena.object(left)?.value(p.slot);
    let rv = state.arena.object(right)?.value(p.slot);

    if p.descriptor.is_collection {
        let li = lv.as_collection()?;
        let ri = rv.as_collection()?;
        if li.len() != ri.len() {
            return Ok(false);
        }
        for (l, r) in li.iter().zip(ri) {
            if !cmp(state, l, r)? {
                return Ok(false);
            }
        }
        Ok(true)
    } else {
        cmp(state, lv, rv)
    }
}

pub fn default_to_string(p: &Property, state: &EngineState, obj: ObjectHandle) -> String {
    let Ok(o) = state.arena.object(obj) else {
        return format!("{}: <dangling>", p.name);
    };
    match value_handlers(state, p).to_string {
        Some(f) => format!("{}: {}", p.name, f(state, o.value(p.slot))),
        None => format!("{}: {:?}", p.name, o.value(p.slot)),
    }
}

/// Fill unset handlers with the default dispatchers.
pub(crate) fn fill_default_handlers(p: &mut Property) {
    let h = &mut p.handlers;
    h.serialize.get_or_insert(default_serialize);
    h.deserialize.get_or_insert(default_deserialize);
    h.deserialize_from_proto.get_or_insert(default_from_proto);
    h.copy.get_or_insert(default_copy);
    h.compare.get_or_insert(default_compare);
    h.to_string.get_or_insert(default_to_string);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::ids::ObjectId;
    use crate::model::architype::Architype;
    use crate::reflection::builder::TypeBuilder;
    use crate::reflection::descriptor::{type_ids, TypeId};
    use crate::reflection::handlers::register_scalar_types;
    use crate::reflection::registry::TypeRegistry;
    use crate::storage::{DirResolver, FsStorage};
    use crate::ModelError;

    const HOLDER: TypeId = TypeId(100);

    fn state_with_holder() -> EngineState {
        let mut registry = TypeRegistry::new();
        register_scalar_types(&mut registry);
        TypeBuilder::new(HOLDER, "test", "holder", Architype::SmartObject)
            .property(
                Property::new("nums", TypeDescriptor::value_collection(type_ids::I32))
                    .serializable()
                    .with_default(),
            )
            .register(&mut registry);
        registry.finalize();
        EngineState::new(
            registry,
            Box::new(FsStorage),
            Box::new(DirResolver::new("/tmp")),
        )
    }

    fn holder(state: &mut EngineState, id: &str) -> ObjectHandle {
        let obj = state
            .registry
            .get(HOLDER)
            .unwrap()
            .alloc_empty(&ObjectId::new(id));
        state.arena.insert(obj)
    }

    fn nums_property(state: &EngineState) -> Property {
        state.registry.get(HOLDER).unwrap().properties[0].clone()
    }

    #[test]
    fn collection_elements_land_at_their_recorded_order_idx() {
        let mut state = state_with_holder();
        let h = holder(&mut state, "a");
        let mut ctx = ObjectLoadContext::new();

        // Recorded out of order; placement follows order_idx.
        let doc = json!({
            "nums": [
                { "order_idx": 2, "value": 30 },
                { "order_idx": 0, "value": 10 },
                { "order_idx": 1, "value": 20 }
            ]
        });
        let p = nums_property(&state);
        default_deserialize(&p, &mut state, &mut ctx, h, &doc).unwrap();

        assert_eq!(
            state.arena.object(h).unwrap().value(p.slot),
            &PropertyValue::Collection(vec![
                PropertyValue::I32(10),
                PropertyValue::I32(20),
                PropertyValue::I32(30),
            ])
        );
    }

    #[test]
    fn collection_gap_is_a_serialization_error() {
        let mut state = state_with_holder();
        let h = holder(&mut state, "a");
        let mut ctx = ObjectLoadContext::new();

        // order_idx 2 forces a resize past the entry count, leaving a gap
        // at index 1.
        let doc = json!({
            "nums": [
                { "order_idx": 0, "value": 10 },
                { "order_idx": 2, "value": 30 }
            ]
        });
        let p = nums_property(&state);
        let err = default_deserialize(&p, &mut state, &mut ctx, h, &doc).unwrap_err();
        assert!(matches!(err, ModelError::SerializationError(_)));
    }

    #[test]
    fn collections_of_differing_lengths_compare_unequal() {
        let mut state = state_with_holder();
        let a = holder(&mut state, "a");
        let b = holder(&mut state, "b");
        let p = nums_property(&state);

        state.arena.object_mut(a).unwrap().set_value(
            p.slot,
            PropertyValue::Collection(vec![PropertyValue::I32(1)]),
        );
        state.arena.object_mut(b).unwrap().set_value(
            p.slot,
            PropertyValue::Collection(vec![PropertyValue::I32(1), PropertyValue::I32(2)]),
        );
        assert!(!default_compare(&p, &state, a, b).unwrap());

        // Same length and values compare equal again.
        state.arena.object_mut(b).unwrap().set_value(
            p.slot,
            PropertyValue::Collection(vec![PropertyValue::I32(1)]),
        );
        assert!(default_compare(&p, &state, a, b).unwrap());
    }
}
