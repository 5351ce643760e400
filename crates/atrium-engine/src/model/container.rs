//! Shared container core for packages and levels.

use std::path::{Path, PathBuf};

use log::info;

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::model::load_context::ObjectLoadContext;
use crate::model::state::EngineState;

/// What a package and a level have in common: an identity, its on-disk
/// location and the load context owning every object loaded through it.
#[derive(Debug)]
pub struct Container {
    id: ObjectId,
    load_path: PathBuf,
    save_root: PathBuf,
    pub ctx: ObjectLoadContext,
}

impl Container {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            load_path: PathBuf::new(),
            save_root: PathBuf::new(),
            ctx: ObjectLoadContext::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn set_load_path(&mut self, path: PathBuf) {
        self.ctx.set_prefix(path.clone());
        self.load_path = path;
    }

    pub fn load_path(&self) -> &Path {
        &self.load_path
    }

    pub fn set_save_root(&mut self, path: PathBuf) {
        self.save_root = path;
    }

    pub fn save_root(&self) -> &Path {
        &self.save_root
    }

    /// Copy the local cache sets into the global ones and switch the
    /// context to global-load-mode, so later loads register globally too.
    /// Registering an id that is already globally visible is fatal.
    pub fn register_in_global_cache(&mut self, state: &mut EngineState) {
        let mut protos = 0usize;
        let mut instances = 0usize;
        for arch in Architype::ALL {
            for (id, handle) in self.ctx.proto_local().partition(arch).iter() {
                state.proto_global.add_item(id.clone(), arch, handle);
                protos += 1;
            }
            for (id, handle) in self.ctx.instance_local().partition(arch).iter() {
                state.instance_global.add_item(id.clone(), arch, handle);
                instances += 1;
            }
        }
        self.ctx.set_global_load_mode(true);
        info!(
            "container `{}` registered {protos} proto and {instances} instance objects globally",
            self.id
        );
    }

    pub fn unregister_in_global_cache(&mut self, state: &mut EngineState) {
        for arch in Architype::ALL {
            for (id, _) in self.ctx.proto_local().partition(arch).iter() {
                state.proto_global.remove_item(id, arch);
            }
            for (id, _) in self.ctx.instance_local().partition(arch).iter() {
                state.instance_global.remove_item(id, arch);
            }
        }
        self.ctx.set_global_load_mode(false);
    }

    /// Free every owned object and clear the local sets and mapping.
    pub fn unload(&mut self, state: &mut EngineState) {
        self.ctx.unload(state);
    }
}
