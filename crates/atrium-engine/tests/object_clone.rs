//! Clone, diff, mirror and partial-save semantics of the object
//! constructor.

use tempfile::TempDir;

use atrium_engine::base::slots;
use atrium_engine::ids::ObjectId;
use atrium_engine::model::constructor;
use atrium_engine::model::load_context::{ConstructionMode, ObjectLoadContext};
use atrium_engine::model::object::{ObjectFlags, ObjectState};
use atrium_engine::model::PropertyValue;
use atrium_engine::storage::{DirResolver, FsStorage, Storage};
use atrium_engine::{EngineState, ObjectHandle};

fn new_state() -> EngineState {
    EngineState::with_base_types(Box::new(FsStorage), Box::new(DirResolver::new("/tmp")))
}

fn id(s: &str) -> ObjectId {
    ObjectId::new(s)
}

/// Class-scope setup: a mesh asset, a mesh_component `root` referencing it
/// and a game_object `go_a` owning the component.
fn build_class_objects(
    state: &mut EngineState,
    ctx: &mut ObjectLoadContext,
) -> (ObjectHandle, ObjectHandle, ObjectHandle) {
    let mesh = constructor::object_construct(state, ctx, &id("mesh"), &id("mesh_cube")).unwrap();
    state
        .arena
        .object_mut(mesh)
        .unwrap()
        .set_value(slots::MESH_SOURCE, PropertyValue::String("meshes/cube.obj".into()));

    let root =
        constructor::object_construct(state, ctx, &id("mesh_component"), &id("root")).unwrap();
    state
        .arena
        .object_mut(root)
        .unwrap()
        .set_value(slots::MESH_COMPONENT_MESH, PropertyValue::Ref(Some(mesh)));

    let go_a = constructor::object_construct(state, ctx, &id("game_object"), &id("go_a")).unwrap();
    state.arena.object_mut(go_a).unwrap().set_value(
        slots::GAME_OBJECT_COMPONENTS,
        PropertyValue::Collection(vec![PropertyValue::Ref(Some(root))]),
    );
    (mesh, root, go_a)
}

fn package_ctx() -> ObjectLoadContext {
    let mut ctx = ObjectLoadContext::new();
    ctx.set_package(id("pkg"));
    ctx
}

fn level_ctx() -> ObjectLoadContext {
    let mut ctx = ObjectLoadContext::new();
    ctx.set_level(id("lvl"));
    ctx
}

#[test]
fn clone_creates_composite_sub_objects() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (mesh, root, go_a) = build_class_objects(&mut state, &mut pkg);

    let mut lvl = level_ctx();
    let go_b = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();

    let obj = state.arena.object(go_b).unwrap();
    assert_eq!(obj.state(), ObjectState::Constructed);
    assert!(obj.has_flag(ObjectFlags::INSTANCE_OBJ));
    assert_eq!(obj.prototype(), Some(go_a));

    // The owned component cloned under the composite child id.
    let components = obj.value(slots::GAME_OBJECT_COMPONENTS).as_collection().unwrap();
    assert_eq!(components.len(), 1);
    let sub = components[0].as_handle().unwrap().unwrap();
    assert_ne!(sub, root);

    let sub_obj = state.arena.object(sub).unwrap();
    assert_eq!(sub_obj.id().as_str(), "go_b/root");
    assert_eq!(sub_obj.prototype(), Some(root));
    // Asset references are shared, not cloned.
    assert_eq!(
        sub_obj.value(slots::MESH_COMPONENT_MESH),
        &PropertyValue::Ref(Some(mesh))
    );

    // Both clone and sub-object are addressable in the instance scope.
    assert_eq!(lvl.find_obj(&state, &id("go_b")), Some(go_b));
    assert_eq!(lvl.find_obj(&state, &id("go_b/root")), Some(sub));
}

#[test]
fn clone_then_diff_is_empty() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (_, _, go_a) = build_class_objects(&mut state, &mut pkg);

    let mut lvl = level_ctx();
    let go_b = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();

    let diff = constructor::diff_object_properties(&state, go_a, go_b).unwrap();
    assert!(diff.is_empty(), "unexpected diff: {:?}", diff);
}

#[test]
fn mutated_sub_object_shows_in_diff_and_partial_save() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (_, _, go_a) = build_class_objects(&mut state, &mut pkg);

    let mut lvl = level_ctx();
    let go_b = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();

    let sub = lvl.find_obj(&state, &id("go_b/root")).unwrap();
    state
        .arena
        .object_mut(sub)
        .unwrap()
        .set_value(slots::TRANSFORM_POSITION, PropertyValue::Vec3([1.0, 2.0, 3.0]));

    let diff = constructor::diff_object_properties(&state, go_a, go_b).unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].name, "components");

    // Partial save carries class_id and only the differing property.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("go_b.json");
    constructor::object_save(&state, go_b, &path).unwrap();
    let doc = FsStorage.read_container(&path).unwrap();
    assert_eq!(doc.get("class_id").and_then(|v| v.as_str()), Some("go_a"));
    assert_eq!(doc.get("id").and_then(|v| v.as_str()), Some("go_b"));
    let entry = &doc.get("components").unwrap().as_array().unwrap()[0];
    let payload = entry.get("value").unwrap();
    assert_eq!(payload.get("id").and_then(|v| v.as_str()), Some("go_b/root"));
    assert_eq!(payload.get("object_class").and_then(|v| v.as_str()), Some("root"));
    assert!(payload.get("position").is_some());
    // Unchanged sub-object properties stay out of the document.
    assert!(payload.get("scale").is_none());
}

#[test]
fn unmutated_clone_saves_identity_only() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (_, _, go_a) = build_class_objects(&mut state, &mut pkg);

    let mut lvl = level_ctx();
    let go_b = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("go_b.json");
    constructor::object_save(&state, go_b, &path).unwrap();
    let doc = FsStorage.read_container(&path).unwrap();
    assert_eq!(doc.get("class_id").and_then(|v| v.as_str()), Some("go_a"));
    assert!(doc.get("components").is_none());
}

#[test]
fn clone_under_an_existing_id_returns_the_existing_object() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (_, _, go_a) = build_class_objects(&mut state, &mut pkg);

    let mut lvl = level_ctx();
    let first = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();
    let second = constructor::object_clone(
        &mut state,
        &mut lvl,
        go_a,
        &id("go_b"),
        ConstructionMode::InstanceObj,
    )
    .unwrap();
    assert_eq!(first, second);
}

#[test]
fn mirror_duplicates_a_class_object_into_instance_scope() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (mesh, _, _) = build_class_objects(&mut state, &mut pkg);

    // The level context sees the prototype through the global cache.
    state.proto_global.add_item(
        id("mesh_cube"),
        state.arena.object(mesh).unwrap().architype(),
        mesh,
    );

    let mut lvl = level_ctx();
    let mirror = constructor::mirror_object(&mut state, &mut lvl, &id("mesh_cube")).unwrap();

    let obj = state.arena.object(mirror).unwrap();
    assert_eq!(obj.id().as_str(), "mesh_cube");
    assert!(obj.has_flag(ObjectFlags::MIRROR));
    assert!(obj.has_flag(ObjectFlags::INSTANCE_OBJ));
    assert_eq!(obj.prototype(), Some(mesh));
    assert_eq!(lvl.find_obj(&state, &id("mesh_cube")), Some(mirror));
}

#[test]
fn update_ignores_unknown_keys() {
    let mut state = new_state();
    let mut pkg = package_ctx();
    let (mesh, _, _) = build_class_objects(&mut state, &mut pkg);

    let doc = serde_json::json!({
        "source": "meshes/other.obj",
        "no_such_property": 42
    });
    constructor::update_object_properties(&mut state, &mut pkg, mesh, &doc).unwrap();
    assert_eq!(
        state.arena.object(mesh).unwrap().value(slots::MESH_SOURCE),
        &PropertyValue::String("meshes/other.obj".into())
    );
}
