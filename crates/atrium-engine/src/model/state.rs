//! Engine-wide state, threaded explicitly through every operation.

use crate::model::arena::ObjectArena;
use crate::model::caches::CacheSet;
use crate::reflection::registry::TypeRegistry;
use crate::storage::{ResourceResolver, Storage};

/// Everything the object model shares: the finalized type registry, the
/// object arena, the global cache sets and the I/O seams. There are no
/// process-global singletons; callers own one of these and pass it down.
#[derive(Debug)]
pub struct EngineState {
    pub registry: TypeRegistry,
    pub arena: ObjectArena,
    pub proto_global: CacheSet,
    pub instance_global: CacheSet,
    pub storage: Box<dyn Storage>,
    pub resolver: Box<dyn ResourceResolver>,
}

impl EngineState {
    pub fn new(
        registry: TypeRegistry,
        storage: Box<dyn Storage>,
        resolver: Box<dyn ResourceResolver>,
    ) -> Self {
        Self {
            registry,
            arena: ObjectArena::new(),
            proto_global: CacheSet::new(),
            instance_global: CacheSet::new(),
            storage,
            resolver,
        }
    }

    /// State with the standard type set registered and finalized.
    pub fn with_base_types(
        storage: Box<dyn Storage>,
        resolver: Box<dyn ResourceResolver>,
    ) -> Self {
        let mut registry = TypeRegistry::new();
        crate::base::register_base_types(&mut registry);
        registry.finalize();
        Self::new(registry, storage, resolver)
    }
}
