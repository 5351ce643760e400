//! The object constructor: load, clone, instantiate, mirror, construct,
//! save, diff and update.
//!
//! Every operation resolves the merged serializable property list of the
//! object's type and invokes one handler per property. A failing handler
//! aborts the whole operation for that object without rollback; the caller
//! discards the batch. Each public entry point accumulates every object it
//! touches and runs the post-load hook exactly once per object at the end.

use std::path::Path;

use log::{error, info, trace, warn};

use crate::ids::ObjectId;
use crate::model::arena::ObjectHandle;
use crate::model::load_context::{ConstructionMode, ObjectLoadContext};
use crate::model::object::{ObjectFlags, ObjectState, Owner};
use crate::model::state::EngineState;
use crate::reflection::descriptor::TypeId;
use crate::reflection::property::{self, Property};
use crate::storage::{doc_insert, doc_opt_id, keys, Document};
use crate::{ModelError, ModelResult};

/// Load a mapped object by id in the given mode, running post-load hooks
/// over the whole loaded batch.
pub fn object_load(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    id: &ObjectId,
    mode: ConstructionMode,
) -> ModelResult<ObjectHandle> {
    let parked = ctx.take_loaded();
    ctx.push_mode(mode);
    let result = object_load_internal_id(state, ctx, id);
    ctx.pop_mode();
    let batch = ctx.swap_loaded(parked);
    let handle = result?;
    run_post_load(state, &batch)?;
    Ok(handle)
}

/// Load an object document from an explicit path relative to the context
/// prefix.
pub fn object_load_path(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    rel_path: &Path,
    mode: ConstructionMode,
) -> ModelResult<ObjectHandle> {
    let parked = ctx.take_loaded();
    ctx.push_mode(mode);
    let result = (|| {
        let path = ctx.make_full_path(rel_path)?;
        let doc = state.storage.read_container(&path)?;
        object_load_internal_doc(state, ctx, &doc)
    })();
    ctx.pop_mode();
    let batch = ctx.swap_loaded(parked);
    let handle = result?;
    run_post_load(state, &batch)?;
    Ok(handle)
}

pub(crate) fn object_load_internal_id(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    let mode = ctx.mode();
    debug_assert!(mode != ConstructionMode::Inactive);

    let cached = match mode {
        ConstructionMode::ClassObj => ctx.find_proto_obj(state, id),
        _ => ctx.find_obj(state, id),
    };
    if let Some(handle) = cached {
        trace!("object {id} is already present, skipping load");
        return Ok(handle);
    }

    let path = ctx.object_path(id)?;
    let doc = state.storage.read_container(&path)?;
    let handle = object_load_internal_doc(state, ctx, &doc)?;

    let loaded_id = state.arena.object(handle)?.id().clone();
    if &loaded_id != id {
        warn!("mapping id `{id}` differs from document id `{loaded_id}`");
    }
    Ok(handle)
}

pub(crate) fn object_load_internal_doc(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    doc: &Document,
) -> ModelResult<ObjectHandle> {
    if let Some(class_id) = doc_opt_id(doc, keys::CLASS_ID) {
        if doc.get(keys::TYPE_ID).is_some() {
            return Err(ModelError::SerializationError(
                "document carries both `type_id` and `class_id`".into(),
            ));
        }
        let proto = preload_proto(state, ctx, &class_id).map_err(|e| {
            error!("failed to preload prototype `{class_id}`: {e}");
            ModelError::ProtoDoesntExist(class_id.clone())
        })?;
        object_load_partial(state, ctx, proto, doc)
    } else {
        object_load_full(state, ctx, doc)
    }
}

/// Full load: `type_id` picks the reflection type, every serializable
/// property deserializes from the document.
fn object_load_full(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    doc: &Document,
) -> ModelResult<ObjectHandle> {
    let type_name = crate::storage::doc_id(doc, keys::TYPE_ID)?;
    let obj_id = crate::storage::doc_id(doc, keys::ID)?;

    let handle = alloc_empty_object_by_name(state, ctx, &type_name, &obj_id, ObjectFlags::empty())?;
    object_properties_load(state, ctx, handle, doc)?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    Ok(handle)
}

/// Partial (prototype-merge) load: keys present in the document override,
/// absent keys copy from the preloaded prototype.
fn object_load_partial(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    proto: ObjectHandle,
    doc: &Document,
) -> ModelResult<ObjectHandle> {
    let obj_id = crate::storage::doc_id(doc, keys::ID)?;
    let proto_type = state.arena.object(proto)?.type_id();

    let handle = alloc_empty_object(state, ctx, proto_type, &obj_id, ObjectFlags::INHERITED)?;
    state.arena.object_mut(handle)?.set_prototype(proto)?;
    load_derive_object_properties(state, ctx, proto, handle, doc)?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    Ok(handle)
}

/// Resolve a prototype: local then global proto caches, else a default
/// class object when the id names a registered type, else a recursive
/// class-mode load.
pub fn preload_proto(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    if let Some(handle) = ctx.find_proto_obj(state, id) {
        return Ok(handle);
    }
    if state.registry.get_by_name(id).is_some() {
        info!("creating default class object for type `{id}`");
        return create_default_class_obj(state, ctx, id);
    }
    ctx.push_mode(ConstructionMode::ClassObj);
    let result = object_load_internal_id(state, ctx, id);
    ctx.pop_mode();
    result
}

fn create_default_class_obj(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    type_name: &ObjectId,
) -> ModelResult<ObjectHandle> {
    ctx.push_mode(ConstructionMode::ClassObj);
    let result =
        alloc_empty_object_by_name(state, ctx, type_name, type_name, ObjectFlags::STANDALONE);
    ctx.pop_mode();
    let handle = result?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    Ok(handle)
}

/// Clone `src` under `new_id`, running post-load over the whole batch
/// (the clone itself plus every recursively cloned sub-object, parents
/// first).
pub fn object_clone(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    new_id: &ObjectId,
    mode: ConstructionMode,
) -> ModelResult<ObjectHandle> {
    let parked = ctx.take_loaded();
    ctx.push_mode(mode);
    let result = object_clone_internal(state, ctx, src, new_id);
    ctx.pop_mode();
    let batch = ctx.swap_loaded(parked);
    let handle = result?;
    run_post_load(state, &batch)?;
    Ok(handle)
}

pub(crate) fn object_clone_internal(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    new_id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    let cached = match ctx.mode() {
        ConstructionMode::ClassObj => ctx.find_proto_obj(state, new_id),
        _ => ctx.find_obj(state, new_id),
    };
    if let Some(handle) = cached {
        return Ok(handle);
    }

    let src_type = state.arena.object(src)?.type_id();
    let handle = alloc_empty_object(state, ctx, src_type, new_id, ObjectFlags::empty())?;
    state.arena.object_mut(handle)?.set_prototype(src)?;
    clone_object_properties(state, ctx, src, handle)?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    Ok(handle)
}

/// Clone variant preferring value-type instantiate handlers where present.
pub fn object_instantiate(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    new_id: &ObjectId,
    mode: ConstructionMode,
) -> ModelResult<ObjectHandle> {
    let parked = ctx.take_loaded();
    ctx.push_mode(mode);
    let result = object_instantiate_internal(state, ctx, src, new_id);
    ctx.pop_mode();
    let batch = ctx.swap_loaded(parked);
    let handle = result?;
    run_post_load(state, &batch)?;
    Ok(handle)
}

fn object_instantiate_internal(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    new_id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    if let Some(handle) = ctx.find_obj(state, new_id) {
        return Ok(handle);
    }
    let src_type = state.arena.object(src)?.type_id();
    let handle = alloc_empty_object(state, ctx, src_type, new_id, ObjectFlags::empty())?;
    state.arena.object_mut(handle)?.set_prototype(src)?;
    instantiate_object_properties(state, ctx, src, handle)?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    Ok(handle)
}

/// Instance-scope duplicate of a class object under the same id.
pub fn mirror_object(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    class_id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    let proto = ctx
        .find_proto_obj(state, class_id)
        .ok_or_else(|| ModelError::ProtoDoesntExist(class_id.clone()))?;
    object_clone(state, ctx, proto, class_id, ConstructionMode::Mirror)
}

/// Default-construct an object of `type_name` from its value template.
/// Lands in class scope inside a package context, instance scope inside a
/// level context.
pub fn object_construct(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    type_name: &ObjectId,
    id: &ObjectId,
) -> ModelResult<ObjectHandle> {
    let mode = if ctx.package().is_some() {
        ConstructionMode::ClassObj
    } else {
        ConstructionMode::InstanceObj
    };
    let parked = ctx.take_loaded();
    ctx.push_mode(mode);
    let result = alloc_empty_object_by_name(state, ctx, type_name, id, ObjectFlags::STANDALONE);
    ctx.pop_mode();
    let batch = ctx.swap_loaded(parked);
    let handle = result?;
    state.arena.object_mut(handle)?.set_state(ObjectState::Loaded)?;
    run_post_load(state, &batch)?;
    Ok(handle)
}

pub(crate) fn alloc_empty_object_by_name(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    type_name: &ObjectId,
    id: &ObjectId,
    extra_flags: ObjectFlags,
) -> ModelResult<ObjectHandle> {
    let type_id = state.registry.expect_by_name(type_name)?.type_id;
    alloc_empty_object(state, ctx, type_id, id, extra_flags)
}

pub(crate) fn alloc_empty_object(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    type_id: TypeId,
    id: &ObjectId,
    extra_flags: ObjectFlags,
) -> ModelResult<ObjectHandle> {
    let mut obj = state.registry.expect(type_id)?.alloc_empty(id);

    let mode_flags = match ctx.mode() {
        ConstructionMode::ClassObj => ObjectFlags::PROTO_OBJ,
        ConstructionMode::InstanceObj => ObjectFlags::INSTANCE_OBJ,
        ConstructionMode::Mirror => ObjectFlags::INSTANCE_OBJ | ObjectFlags::MIRROR,
        ConstructionMode::Inactive => ObjectFlags::empty(),
    };
    obj.add_flags(extra_flags | mode_flags);

    if let Some(package) = ctx.package() {
        obj.set_owner(Owner::Package(package.clone()))?;
    } else if let Some(level) = ctx.level() {
        obj.set_owner(Owner::Level(level.clone()))?;
    }

    let handle = state.arena.insert(obj);
    ctx.add_obj(state, handle)?;
    Ok(handle)
}

fn serialization_properties(
    state: &EngineState,
    obj: ObjectHandle,
) -> ModelResult<std::sync::Arc<[Property]>> {
    let type_id = state.arena.object(obj)?.type_id();
    Ok(state.registry.expect(type_id)?.serialization_properties.clone())
}

/// Deserialize every serializable property from `doc`. Missing keys are
/// tolerated for `has_default` properties.
pub fn object_properties_load(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    obj: ObjectHandle,
    doc: &Document,
) -> ModelResult<()> {
    let props = serialization_properties(state, obj)?;
    for p in props.iter() {
        let de = p
            .handlers
            .deserialize
            .unwrap_or_else(|| panic!("property `{}` has no deserialize handler", p.name));
        match de(p, state, ctx, obj, doc) {
            Ok(()) => {}
            Err(ModelError::DoesntExist(_)) if p.has_default => {}
            Err(e) => {
                error!("failed to load property `{}`: {e}", p.name);
                return Err(e);
            }
        }
    }
    Ok(())
}

fn load_derive_object_properties(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    proto: ObjectHandle,
    obj: ObjectHandle,
    doc: &Document,
) -> ModelResult<()> {
    let props = serialization_properties(state, obj)?;
    for p in props.iter() {
        let merge = p.handlers.deserialize_from_proto.unwrap_or(property::default_from_proto);
        merge(p, state, ctx, proto, obj, doc)?;
    }
    Ok(())
}

fn clone_object_properties(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    dst: ObjectHandle,
) -> ModelResult<()> {
    let props = serialization_properties(state, src)?;
    for p in props.iter() {
        let copy = p
            .handlers
            .copy
            .unwrap_or_else(|| panic!("property `{}` has no copy handler", p.name));
        copy(p, state, ctx, src, dst)?;
    }
    Ok(())
}

fn instantiate_object_properties(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    src: ObjectHandle,
    dst: ObjectHandle,
) -> ModelResult<()> {
    let props = serialization_properties(state, src)?;
    for p in props.iter() {
        property::default_instantiate(p, state, ctx, src, dst)?;
    }
    Ok(())
}

/// Serialize every serializable property of `obj` into `doc`.
pub fn object_properties_save(
    state: &EngineState,
    obj: ObjectHandle,
    doc: &mut Document,
) -> ModelResult<()> {
    let props = serialization_properties(state, obj)?;
    for p in props.iter() {
        let ser = p
            .handlers
            .serialize
            .unwrap_or_else(|| panic!("property `{}` has no serialize handler", p.name));
        ser(p, state, obj, doc)?;
    }
    Ok(())
}

/// Save `obj` at `path`: full form, or partial (`class_id` + diff against
/// the prototype) for objects that carry a prototype back-reference.
pub fn object_save(state: &EngineState, obj: ObjectHandle, path: &Path) -> ModelResult<()> {
    let mut doc = Document::Object(Default::default());
    if state.arena.object(obj)?.prototype().is_some() {
        object_save_partial(state, obj, &mut doc)?;
    } else {
        object_save_full(state, obj, &mut doc)?;
    }
    state.storage.write_container(path, &doc)
}

fn object_save_full(state: &EngineState, obj: ObjectHandle, doc: &mut Document) -> ModelResult<()> {
    let (type_id, id) = {
        let o = state.arena.object(obj)?;
        (o.type_id(), o.id().clone())
    };
    let type_name = state.registry.expect(type_id)?.type_name.clone();
    doc_insert(doc, keys::TYPE_ID, Document::from(type_name.as_str()))?;
    doc_insert(doc, keys::ID, Document::from(id.as_str()))?;
    object_properties_save(state, obj, doc)
}

fn object_save_partial(
    state: &EngineState,
    obj: ObjectHandle,
    doc: &mut Document,
) -> ModelResult<()> {
    let (proto, id) = {
        let o = state.arena.object(obj)?;
        (o.prototype().ok_or(ModelError::Failed)?, o.id().clone())
    };
    let proto_id = state.arena.object(proto)?.id().clone();
    doc_insert(doc, keys::CLASS_ID, Document::from(proto_id.as_str()))?;
    doc_insert(doc, keys::ID, Document::from(id.as_str()))?;

    for p in diff_object_properties(state, proto, obj)? {
        let ser = p
            .handlers
            .serialize
            .unwrap_or_else(|| panic!("property `{}` has no serialize handler", p.name));
        ser(&p, state, obj, doc)?;
    }
    Ok(())
}

/// Properties whose values differ between two objects of the same type.
pub fn diff_object_properties(
    state: &EngineState,
    left: ObjectHandle,
    right: ObjectHandle,
) -> ModelResult<Vec<Property>> {
    if left == right {
        return Ok(Vec::new());
    }
    let left_type = state.arena.object(left)?.type_id();
    let right_type = state.arena.object(right)?.type_id();
    if left_type != right_type {
        return Err(ModelError::Failed);
    }

    let props = state.registry.expect(left_type)?.serialization_properties.clone();
    let mut diff = Vec::new();
    for p in props.iter() {
        let cmp = p
            .handlers
            .compare
            .unwrap_or_else(|| panic!("property `{}` has no compare handler", p.name));
        if !cmp(p, state, left, right)? {
            diff.push(p.clone());
        }
    }
    Ok(diff)
}

/// Apply a document's keys onto an existing object, warning on unknown
/// keys.
pub fn update_object_properties(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
    obj: ObjectHandle,
    doc: &Document,
) -> ModelResult<()> {
    let props = serialization_properties(state, obj)?;
    let map = doc
        .as_object()
        .ok_or_else(|| ModelError::SerializationError("expected an object document".into()))?;

    for key in map.keys() {
        if matches!(
            key.as_str(),
            keys::ID | keys::CLASS_ID | keys::TYPE_ID | keys::OBJECT_CLASS
        ) {
            continue;
        }
        match props.iter().find(|p| p.name == *key) {
            Some(p) => {
                let de = p
                    .handlers
                    .deserialize
                    .unwrap_or_else(|| panic!("property `{}` has no deserialize handler", p.name));
                de(p, state, ctx, obj, doc)?;
            }
            None => warn!("ignoring unknown property `{key}`"),
        }
    }
    Ok(())
}

/// Run the post-load hook once per freshly loaded object, then advance
/// Loaded → Constructed.
fn run_post_load(state: &mut EngineState, batch: &[ObjectHandle]) -> ModelResult<()> {
    for &handle in batch {
        let (obj_state, hook) = {
            let obj = state.arena.object(handle)?;
            let rt = state.registry.expect(obj.type_id())?;
            (obj.state(), rt.handlers.post_load)
        };
        if obj_state != ObjectState::Loaded {
            continue;
        }
        if let Some(f) = hook {
            f(state, handle)?;
        }
        let obj = state.arena.object_mut(handle)?;
        if obj.state() == ObjectState::Loaded {
            obj.set_state(ObjectState::Constructed)?;
        }
    }
    Ok(())
}
