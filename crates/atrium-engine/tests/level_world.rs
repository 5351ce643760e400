//! Level loading: package pull-in, instance merges, spawning and save.

use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use atrium_engine::base::slots;
use atrium_engine::ids::ObjectId;
use atrium_engine::model::level::{Level, LevelManager, SpawnParameters};
use atrium_engine::model::package::PackageManager;
use atrium_engine::model::PropertyValue;
use atrium_engine::storage::{DirResolver, FsStorage, Storage};
use atrium_engine::{EngineState, ModelError};

fn write(path: &Path, doc: serde_json::Value) {
    FsStorage.write_container(path, &doc).unwrap();
}

/// A package with a mesh asset and a game_object prototype embedding its
/// mesh_component, plus a level instancing that prototype with a transform
/// override.
fn write_content(root: &Path) {
    let pkg = root.join("packages").join("assets.apkg");
    write(
        &pkg.join("package.acfg"),
        json!({
            "class_obj_mapping": [
                { "mesh_cube": "objects/mesh_cube.json" },
                { "go_a": "objects/go_a.json" }
            ]
        }),
    );
    write(
        &pkg.join("objects/mesh_cube.json"),
        json!({ "type_id": "mesh", "id": "mesh_cube", "source": "meshes/cube.obj" }),
    );
    write(
        &pkg.join("objects/go_a.json"),
        json!({
            "type_id": "game_object",
            "id": "go_a",
            "components": [
                {
                    "order_idx": 0,
                    "value": {
                        "type_id": "mesh_component",
                        "id": "root",
                        "mesh": "mesh_cube"
                    }
                }
            ]
        }),
    );

    let lvl = root.join("levels").join("intro.alvl");
    write(
        &lvl.join("root.cfg"),
        json!({
            "packages": ["assets"],
            "instance_obj_mapping": [ { "go_1": "instances/go_1.json" } ]
        }),
    );
    write(
        &lvl.join("instances/go_1.json"),
        json!({
            "class_id": "go_a",
            "id": "go_1",
            "components": [
                {
                    "order_idx": 0,
                    "value": { "position": { "x": 4.0, "y": 0.0, "z": 0.0 } }
                }
            ]
        }),
    );
}

fn state_for(root: &Path) -> EngineState {
    EngineState::with_base_types(Box::new(FsStorage), Box::new(DirResolver::new(root)))
}

fn id(s: &str) -> ObjectId {
    ObjectId::new(s)
}

#[test]
fn level_load_pulls_packages_and_merges_instances() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();

    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();
    assert!(packages.is_loaded(&id("assets")));

    let level = levels.get(&id("intro")).unwrap();
    let go_1 = level.find_game_object(&id("go_1")).unwrap();
    let proto = state.proto_global.get(&id("go_a")).unwrap();
    assert_eq!(state.arena.object(go_1).unwrap().prototype(), Some(proto));

    // The prototype's component cloned under the instance's composite id,
    // with the document override applied on top.
    let sub = level.find_component(&id("go_1/root")).unwrap();
    let sub_obj = state.arena.object(sub).unwrap();
    assert_eq!(
        sub_obj.value(slots::TRANSFORM_POSITION),
        &PropertyValue::Vec3([4.0, 0.0, 0.0])
    );
    let mesh = state.proto_global.get(&id("mesh_cube")).unwrap();
    assert_eq!(
        sub_obj.value(slots::MESH_COMPONENT_MESH),
        &PropertyValue::Ref(Some(mesh))
    );
}

#[test]
fn spawn_clones_a_prototype_with_transform_overrides() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();

    let level = levels.get_mut(&id("intro")).unwrap();
    let params = SpawnParameters {
        position: Some([5.0, 1.0, 0.0]),
        ..SpawnParameters::default()
    };
    let go_2 = level
        .spawn_object(&mut state, &id("go_a"), &id("go_2"), &params)
        .unwrap();

    assert_eq!(level.find_game_object(&id("go_2")), Some(go_2));
    let sub = level.find_component(&id("go_2/root")).unwrap();
    assert_eq!(
        state.arena.object(sub).unwrap().value(slots::TRANSFORM_POSITION),
        &PropertyValue::Vec3([5.0, 1.0, 0.0])
    );
}

#[test]
fn level_save_writes_manifest_and_partial_instances() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();

    let out = TempDir::new().unwrap();
    levels.save_level(&state, &id("intro"), out.path()).unwrap();

    let manifest = FsStorage
        .read_container(&out.path().join("intro.alvl/root.cfg"))
        .unwrap();
    assert_eq!(
        manifest.get("packages").unwrap().as_array().unwrap()[0].as_str(),
        Some("assets")
    );

    let instance = FsStorage
        .read_container(&out.path().join("intro.alvl/instances/go_1.json"))
        .unwrap();
    assert_eq!(instance.get("class_id").and_then(|v| v.as_str()), Some("go_a"));
    // The position override survives the save.
    assert!(instance.get("components").is_some());
}

#[test]
fn level_unload_frees_instances_but_keeps_packages() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();

    let go_1 = levels
        .get(&id("intro"))
        .unwrap()
        .find_game_object(&id("go_1"))
        .unwrap();

    levels.unload_level(&mut state, &id("intro")).unwrap();
    assert!(state.arena.object(go_1).is_err());
    assert!(state.proto_global.get(&id("go_a")).is_some());

    // The level can come back after an unload.
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();
    assert!(levels.get(&id("intro")).unwrap().find_game_object(&id("go_1")).is_some());
}

#[test]
fn failed_level_load_frees_its_instances() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    // Second instance document is missing.
    let lvl = dir.path().join("levels").join("broken.alvl");
    write(
        &lvl.join("root.cfg"),
        json!({
            "packages": ["assets"],
            "instance_obj_mapping": [
                { "go_1": "instances/go_1.json" },
                { "ghost": "instances/ghost.json" }
            ]
        }),
    );
    write(&lvl.join("instances/go_1.json"), json!({ "class_id": "go_a", "id": "go_1" }));

    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();

    packages.load_package(&mut state, &id("assets")).unwrap();
    let baseline = state.arena.len();

    let err = levels
        .load_level(&mut state, &mut packages, &id("broken"))
        .unwrap_err();
    assert!(matches!(err, ModelError::PathNotFound(_)));
    assert!(levels.get(&id("broken")).is_none());
    // The instances loaded before the failure are freed; the pulled-in
    // package stays loaded.
    assert_eq!(state.arena.len(), baseline);
    assert!(packages.is_loaded(&id("assets")));
}

#[test]
fn reloading_a_loaded_level_is_a_noop() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let mut levels = LevelManager::new();
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();
    let before = state.arena.len();
    levels
        .load_level(&mut state, &mut packages, &id("intro"))
        .unwrap();
    assert_eq!(state.arena.len(), before);
}

#[test]
fn tick_walks_the_level_without_tick_hooks() {
    let dir = TempDir::new().unwrap();
    write_content(dir.path());
    let mut state = state_for(dir.path());
    let mut packages = PackageManager::new();
    let path = dir.path().join("levels/intro.alvl");
    let mut level = Level::load(&mut state, &mut packages, &id("intro"), &path).unwrap();
    // No base type registers a tick hook; the walk is a no-op.
    level.tick(&mut state, 0.016).unwrap();
}
