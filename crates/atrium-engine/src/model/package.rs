//! Packages: prototype libraries on disk.
//!
//! A package is a `<name>.apkg` directory with a `package.acfg` manifest.
//! Loading reads the manifest and class-mode loads every class mapping
//! entry into the package's local proto cache; the prototypes become
//! globally visible only when the package registers in the global cache.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use rustc_hash::FxHashMap;

use crate::ids::ObjectId;
use crate::model::constructor;
use crate::model::container::Container;
use crate::model::load_context::ConstructionMode;
use crate::model::mapping::{ObjectMapping, PackageManifest};
use crate::model::state::EngineState;
use crate::storage::ResourceCategory;
use crate::{ModelError, ModelResult};

pub const PACKAGE_EXTENSION: &str = "apkg";
pub const PACKAGE_MANIFEST: &str = "package.acfg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Unloaded,
    Loaded,
}

#[derive(Debug)]
pub struct Package {
    pub container: Container,
    state: PackageState,
    registered: bool,
}

impl Package {
    pub fn new(id: ObjectId) -> Self {
        let mut container = Container::new(id.clone());
        container.ctx.set_package(id);
        Self {
            container,
            state: PackageState::Unloaded,
            registered: false,
        }
    }

    pub fn id(&self) -> &ObjectId {
        self.container.id()
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    /// Load the package rooted at `path`. A failure aborts this load and
    /// leaves other containers untouched.
    pub fn load(state: &mut EngineState, id: &ObjectId, path: &Path) -> ModelResult<Package> {
        if path.extension() != Some(OsStr::new(PACKAGE_EXTENSION)) {
            error!("`{}` is not a package directory", path.display());
            return Err(ModelError::Failed);
        }

        let manifest_doc = state.storage.read_container(&path.join(PACKAGE_MANIFEST))?;
        let manifest: PackageManifest = serde_json::from_value(manifest_doc)
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;
        let mapping = Arc::new(ObjectMapping::from_package_manifest(&manifest)?);

        let mut package = Package::new(id.clone());
        package.container.set_load_path(path.to_path_buf());
        package
            .container
            .set_save_root(path.parent().unwrap_or_else(|| Path::new("")).to_path_buf());
        package.container.ctx.set_objects_mapping(Arc::clone(&mapping));

        let class_ids: Vec<ObjectId> = mapping.class_ids().cloned().collect();
        for class_id in &class_ids {
            let result = constructor::object_load(
                state,
                &mut package.container.ctx,
                class_id,
                ConstructionMode::ClassObj,
            );
            // An aborted load frees everything loaded before the failure.
            if let Err(e) = result {
                package.container.unload(state);
                return Err(e);
            }
        }

        info!("loaded package `{id}` with {} class objects", class_ids.len());
        package.state = PackageState::Loaded;
        Ok(package)
    }

    /// Write the manifest and every class object under `root`.
    pub fn save(&self, state: &EngineState, root: &Path) -> ModelResult<()> {
        let dir = root.join(format!("{}.{PACKAGE_EXTENSION}", self.id()));
        let mapping = self.container.ctx.mapping();

        let manifest = serde_json::to_value(mapping.to_package_manifest())
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;
        state.storage.write_container(&dir.join(PACKAGE_MANIFEST), &manifest)?;

        for id in mapping.class_ids() {
            let handle = self
                .container
                .ctx
                .proto_local()
                .get(id)
                .ok_or_else(|| ModelError::IdNotFound(id.clone()))?;
            let entry = mapping
                .get(id)
                .ok_or_else(|| ModelError::DoesntExist(format!("mapping entry {id}")))?;
            constructor::object_save(state, handle, &dir.join(&entry.rel_path))?;
        }
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn register_in_global_cache(&mut self, state: &mut EngineState) {
        if !self.registered {
            self.container.register_in_global_cache(state);
            self.registered = true;
        }
    }

    pub fn unregister_in_global_cache(&mut self, state: &mut EngineState) {
        if self.registered {
            self.container.unregister_in_global_cache(state);
            self.registered = false;
        }
    }

    pub fn unload(&mut self, state: &mut EngineState) {
        self.unregister_in_global_cache(state);
        self.container.unload(state);
        self.state = PackageState::Unloaded;
    }
}

/// Loads packages by id through the resolver, deduplicating repeat loads.
#[derive(Debug, Default)]
pub struct PackageManager {
    packages: FxHashMap<ObjectId, Package>,
}

impl PackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, id: &ObjectId) -> bool {
        self.packages.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut Package> {
        self.packages.get_mut(id)
    }

    /// Load and globally register the package. Loading an already loaded
    /// package succeeds without touching it.
    pub fn load_package(&mut self, state: &mut EngineState, id: &ObjectId) -> ModelResult<()> {
        if self.packages.contains_key(id) {
            info!("package `{id}` is already loaded");
            return Ok(());
        }
        let path = state.resolver.resolve(ResourceCategory::Packages, id);
        let mut package = Package::load(state, id, &path).map_err(|e| {
            error!("failed to load package `{id}`: {e}");
            e
        })?;
        package.register_in_global_cache(state);
        self.packages.insert(id.clone(), package);
        Ok(())
    }

    pub fn unload_package(&mut self, state: &mut EngineState, id: &ObjectId) -> ModelResult<()> {
        let mut package = self
            .packages
            .remove(id)
            .ok_or_else(|| ModelError::IdNotFound(id.clone()))?;
        package.unload(state);
        Ok(())
    }
}
