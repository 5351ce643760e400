//! Load-scoped construction context.
//!
//! Every container owns one [`ObjectLoadContext`] for its whole lifetime. It
//! carries the construction-mode stack, the path prefix and object mapping,
//! the container's local cache sets and owned handles, and the per-batch
//! loaded-objects accumulator the constructor drains to run post-load hooks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ids::ObjectId;
use crate::model::arena::ObjectHandle;
use crate::model::caches::CacheSet;
use crate::model::mapping::ObjectMapping;
use crate::model::state::EngineState;
use crate::{ModelError, ModelResult};

/// What scope objects constructed through this context land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionMode {
    Inactive,
    ClassObj,
    InstanceObj,
    Mirror,
}

#[derive(Debug)]
pub struct ObjectLoadContext {
    mode_stack: Vec<ConstructionMode>,
    path_prefix: PathBuf,
    global_load_mode: bool,
    mapping: Arc<ObjectMapping>,
    proto_local: CacheSet,
    instance_local: CacheSet,
    owned: Vec<ObjectHandle>,
    package: Option<ObjectId>,
    level: Option<ObjectId>,
    loaded: Vec<ObjectHandle>,
}

impl Default for ObjectLoadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectLoadContext {
    pub fn new() -> Self {
        Self {
            mode_stack: Vec::new(),
            path_prefix: PathBuf::new(),
            global_load_mode: false,
            mapping: Arc::new(ObjectMapping::new()),
            proto_local: CacheSet::new(),
            instance_local: CacheSet::new(),
            owned: Vec::new(),
            package: None,
            level: None,
            loaded: Vec::new(),
        }
    }

    pub fn set_prefix(&mut self, prefix: impl Into<PathBuf>) -> &mut Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.path_prefix
    }

    /// When set, constructed objects also register in the global caches.
    pub fn set_global_load_mode(&mut self, on: bool) -> &mut Self {
        self.global_load_mode = on;
        self
    }

    pub fn global_load_mode(&self) -> bool {
        self.global_load_mode
    }

    pub fn set_objects_mapping(&mut self, mapping: Arc<ObjectMapping>) -> &mut Self {
        self.mapping = mapping;
        self
    }

    pub fn mapping(&self) -> &ObjectMapping {
        &self.mapping
    }

    pub fn set_package(&mut self, id: ObjectId) -> &mut Self {
        self.package = Some(id);
        self
    }

    pub fn package(&self) -> Option<&ObjectId> {
        self.package.as_ref()
    }

    pub fn set_level(&mut self, id: ObjectId) -> &mut Self {
        self.level = Some(id);
        self
    }

    pub fn level(&self) -> Option<&ObjectId> {
        self.level.as_ref()
    }

    pub fn mode(&self) -> ConstructionMode {
        self.mode_stack
            .last()
            .copied()
            .unwrap_or(ConstructionMode::Inactive)
    }

    pub fn push_mode(&mut self, mode: ConstructionMode) {
        self.mode_stack.push(mode);
    }

    pub fn pop_mode(&mut self) {
        self.mode_stack.pop();
    }

    /// Resolve a mapped object id to its absolute document path.
    pub fn object_path(&self, id: &ObjectId) -> ModelResult<PathBuf> {
        let entry = self
            .mapping
            .get(id)
            .ok_or_else(|| ModelError::DoesntExist(format!("mapping entry {id}")))?;
        self.make_full_path(&entry.rel_path)
    }

    pub fn make_full_path(&self, rel: &Path) -> ModelResult<PathBuf> {
        if self.path_prefix.as_os_str().is_empty() {
            return Err(ModelError::PathNotFound(rel.to_path_buf()));
        }
        Ok(self.path_prefix.join(rel))
    }

    /// Prototype lookup: local set first, then the global set.
    pub fn find_proto_obj(&self, state: &EngineState, id: &ObjectId) -> Option<ObjectHandle> {
        self.proto_local
            .get(id)
            .or_else(|| state.proto_global.get(id))
    }

    /// Instance lookup: local set first, then the global set.
    pub fn find_obj(&self, state: &EngineState, id: &ObjectId) -> Option<ObjectHandle> {
        self.instance_local
            .get(id)
            .or_else(|| state.instance_global.get(id))
    }

    pub fn proto_local(&self) -> &CacheSet {
        &self.proto_local
    }

    pub fn instance_local(&self) -> &CacheSet {
        &self.instance_local
    }

    /// Register a freshly constructed object in this context: the local
    /// cache set the current mode selects (plus the globals under
    /// global-load-mode), the owned list and the batch accumulator.
    pub fn add_obj(&mut self, state: &mut EngineState, handle: ObjectHandle) -> ModelResult<()> {
        let (id, architype) = {
            let obj = state.arena.object(handle)?;
            (obj.id().clone(), obj.architype())
        };
        match self.mode() {
            ConstructionMode::ClassObj => {
                self.proto_local.add_item(id.clone(), architype, handle);
                if self.global_load_mode {
                    state.proto_global.add_item(id, architype, handle);
                }
            }
            ConstructionMode::InstanceObj | ConstructionMode::Mirror => {
                self.instance_local.add_item(id.clone(), architype, handle);
                if self.global_load_mode {
                    state.instance_global.add_item(id, architype, handle);
                }
            }
            ConstructionMode::Inactive => {
                panic!("object {id} constructed outside an active mode")
            }
        }
        self.owned.push(handle);
        self.loaded.push(handle);
        Ok(())
    }

    /// Park the accumulator for a nested batch. Pair with
    /// [`Self::swap_loaded`].
    pub fn take_loaded(&mut self) -> Vec<ObjectHandle> {
        std::mem::take(&mut self.loaded)
    }

    /// Restore a parked accumulator, returning the batch gathered since
    /// [`Self::take_loaded`].
    pub fn swap_loaded(&mut self, parked: Vec<ObjectHandle>) -> Vec<ObjectHandle> {
        std::mem::replace(&mut self.loaded, parked)
    }

    pub fn owned(&self) -> &[ObjectHandle] {
        &self.owned
    }

    /// Tear down everything this context owns: frees arena slots and clears
    /// the local sets and mapping.
    pub fn unload(&mut self, state: &mut EngineState) {
        for handle in self.owned.drain(..) {
            state.arena.remove(handle);
        }
        self.proto_local.clear();
        self.instance_local.clear();
        self.loaded.clear();
        self.mapping = Arc::new(ObjectMapping::new());
    }
}
