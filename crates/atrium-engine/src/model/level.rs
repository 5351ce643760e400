//! Levels: instance worlds on disk.
//!
//! A level is a `<name>.alvl` directory with a `root.cfg` manifest naming
//! the packages it depends on and its instance object mapping. Loading
//! pulls the packages in through the package manager first, then
//! instance-loads every mapping entry. Spawning clones a prototype into
//! the level at runtime.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use rustc_hash::FxHashMap;

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::model::arena::ObjectHandle;
use crate::model::constructor;
use crate::model::container::Container;
use crate::model::load_context::ConstructionMode;
use crate::model::mapping::{LevelManifest, ObjectMapping};
use crate::model::package::PackageManager;
use crate::model::state::EngineState;
use crate::model::value::PropertyValue;
use crate::storage::ResourceCategory;
use crate::{ModelError, ModelResult};

pub const LEVEL_EXTENSION: &str = "alvl";
pub const LEVEL_MANIFEST: &str = "root.cfg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelState {
    Unloaded,
    Loaded,
}

/// Transform overrides applied to a spawned object's root component.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnParameters {
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[f32; 3]>,
    pub scale: Option<[f32; 3]>,
}

#[derive(Debug)]
pub struct Level {
    pub container: Container,
    packages: Vec<ObjectId>,
    tickable: Vec<ObjectHandle>,
    state: LevelState,
}

impl Level {
    pub fn new(id: ObjectId) -> Self {
        let mut container = Container::new(id.clone());
        container.ctx.set_level(id);
        Self {
            container,
            packages: Vec::new(),
            tickable: Vec::new(),
            state: LevelState::Unloaded,
        }
    }

    pub fn id(&self) -> &ObjectId {
        self.container.id()
    }

    pub fn state(&self) -> LevelState {
        self.state
    }

    pub fn packages(&self) -> &[ObjectId] {
        &self.packages
    }

    /// Load the level rooted at `path`, pulling its packages in first.
    pub fn load(
        state: &mut EngineState,
        packages: &mut PackageManager,
        id: &ObjectId,
        path: &Path,
    ) -> ModelResult<Level> {
        if path.extension() != Some(OsStr::new(LEVEL_EXTENSION)) {
            error!("`{}` is not a level directory", path.display());
            return Err(ModelError::Failed);
        }

        let manifest_doc = state.storage.read_container(&path.join(LEVEL_MANIFEST))?;
        let manifest: LevelManifest = serde_json::from_value(manifest_doc)
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;

        for package_id in &manifest.packages {
            packages.load_package(state, package_id)?;
        }

        let mapping = Arc::new(ObjectMapping::from_level_manifest(&manifest)?);
        let mut level = Level::new(id.clone());
        level.container.set_load_path(path.to_path_buf());
        level
            .container
            .set_save_root(path.parent().unwrap_or_else(|| Path::new("")).to_path_buf());
        level.container.ctx.set_objects_mapping(Arc::clone(&mapping));
        level.packages = manifest.packages.clone();

        let instance_ids: Vec<ObjectId> = mapping.instance_ids().cloned().collect();
        for instance_id in &instance_ids {
            let result = constructor::object_load(
                state,
                &mut level.container.ctx,
                instance_id,
                ConstructionMode::InstanceObj,
            )
            .and_then(|handle| level.register_tickable(state, handle));
            // An aborted load frees everything loaded before the failure.
            if let Err(e) = result {
                level.container.unload(state);
                return Err(e);
            }
        }

        info!("loaded level `{id}` with {} instances", instance_ids.len());
        level.state = LevelState::Loaded;
        Ok(level)
    }

    /// Clone a prototype into the level under `object_id`, apply the spawn
    /// parameters to its root component and append it to the tick list.
    pub fn spawn_object(
        &mut self,
        state: &mut EngineState,
        proto_id: &ObjectId,
        object_id: &ObjectId,
        params: &SpawnParameters,
    ) -> ModelResult<ObjectHandle> {
        let ctx = &self.container.ctx;
        let proto = ctx
            .find_proto_obj(state, proto_id)
            .or_else(|| ctx.find_obj(state, proto_id))
            .ok_or_else(|| ModelError::ProtoDoesntExist(proto_id.clone()))?;

        let handle = constructor::object_clone(
            state,
            &mut self.container.ctx,
            proto,
            object_id,
            ConstructionMode::InstanceObj,
        )?;
        apply_spawn_params(state, handle, params)?;
        self.register_tickable(state, handle)?;
        Ok(handle)
    }

    pub fn find_game_object(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.container
            .ctx
            .instance_local()
            .get_in(id, Architype::GameObject)
    }

    pub fn find_component(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.container
            .ctx
            .instance_local()
            .get_in(id, Architype::Component)
    }

    /// Invoke the tick hook of every tickable object.
    pub fn tick(&mut self, state: &mut EngineState, dt: f32) -> ModelResult<()> {
        let tickable = self.tickable.clone();
        for handle in tickable {
            let hook = {
                let obj = state.arena.object(handle)?;
                state.registry.expect(obj.type_id())?.handlers.tick
            };
            if let Some(f) = hook {
                f(state, handle, dt)?;
            }
        }
        Ok(())
    }

    /// Write the manifest and every instance object (partial saves for
    /// inherited ones) under `root`.
    pub fn save(&self, state: &EngineState, root: &Path) -> ModelResult<()> {
        let dir = root.join(format!("{}.{LEVEL_EXTENSION}", self.id()));
        let mapping = self.container.ctx.mapping();

        let manifest = serde_json::to_value(mapping.to_level_manifest(self.packages.clone()))
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;
        state.storage.write_container(&dir.join(LEVEL_MANIFEST), &manifest)?;

        for id in mapping.instance_ids() {
            let handle = self
                .container
                .ctx
                .instance_local()
                .get(id)
                .ok_or_else(|| ModelError::IdNotFound(id.clone()))?;
            let entry = mapping
                .get(id)
                .ok_or_else(|| ModelError::DoesntExist(format!("mapping entry {id}")))?;
            constructor::object_save(state, handle, &dir.join(&entry.rel_path))?;
        }
        Ok(())
    }

    pub fn unload(&mut self, state: &mut EngineState) {
        self.tickable.clear();
        self.packages.clear();
        self.container.unload(state);
        self.state = LevelState::Unloaded;
    }

    fn register_tickable(&mut self, state: &EngineState, handle: ObjectHandle) -> ModelResult<()> {
        let obj = state.arena.object(handle)?;
        if state.registry.expect(obj.type_id())?.handlers.tick.is_some() {
            self.tickable.push(handle);
        }
        Ok(())
    }
}

fn apply_spawn_params(
    state: &mut EngineState,
    handle: ObjectHandle,
    params: &SpawnParameters,
) -> ModelResult<()> {
    if params.position.is_none() && params.rotation.is_none() && params.scale.is_none() {
        return Ok(());
    }
    // Root component is the first entry of the `components` collection.
    let root = {
        let obj = state.arena.object(handle)?;
        let props = state.registry.expect(obj.type_id())?.properties.clone();
        let Some(p) = props.iter().find(|p| p.name == "components") else {
            return Ok(());
        };
        match obj.value(p.slot).as_collection()?.first() {
            Some(first) => match first.as_handle()? {
                Some(h) => h,
                None => return Ok(()),
            },
            None => return Ok(()),
        }
    };
    for (name, value) in [
        ("position", params.position),
        ("rotation", params.rotation),
        ("scale", params.scale),
    ] {
        if let Some(v) = value {
            set_named_vec3(state, root, name, v)?;
        }
    }
    Ok(())
}

fn set_named_vec3(
    state: &mut EngineState,
    handle: ObjectHandle,
    name: &str,
    value: [f32; 3],
) -> ModelResult<()> {
    let slot = {
        let obj = state.arena.object(handle)?;
        state
            .registry
            .expect(obj.type_id())?
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.slot)
    };
    if let Some(slot) = slot {
        state
            .arena
            .object_mut(handle)?
            .set_value(slot, PropertyValue::Vec3(value));
    }
    Ok(())
}

/// Loads, saves and unloads levels by id.
#[derive(Debug, Default)]
pub struct LevelManager {
    levels: FxHashMap<ObjectId, Level>,
}

impl LevelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Level> {
        self.levels.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut Level> {
        self.levels.get_mut(id)
    }

    pub fn load_level(
        &mut self,
        state: &mut EngineState,
        packages: &mut PackageManager,
        id: &ObjectId,
    ) -> ModelResult<()> {
        if self.levels.contains_key(id) {
            info!("level `{id}` is already loaded");
            return Ok(());
        }
        let path = state.resolver.resolve(ResourceCategory::Levels, id);
        let level = Level::load(state, packages, id, &path).map_err(|e| {
            error!("failed to load level `{id}`: {e}");
            e
        })?;
        self.levels.insert(id.clone(), level);
        Ok(())
    }

    pub fn save_level(&self, state: &EngineState, id: &ObjectId, root: &Path) -> ModelResult<()> {
        self.levels
            .get(id)
            .ok_or_else(|| ModelError::IdNotFound(id.clone()))?
            .save(state, root)
    }

    pub fn unload_level(&mut self, state: &mut EngineState, id: &ObjectId) -> ModelResult<()> {
        let mut level = self
            .levels
            .remove(id)
            .ok_or_else(|| ModelError::IdNotFound(id.clone()))?;
        level.unload(state);
        Ok(())
    }
}
