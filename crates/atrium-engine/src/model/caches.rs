//! Architype-partitioned object caches.
//!
//! A [`Cache`] maps ids to handles for a single architype; a [`CacheSet`]
//! keeps one cache per architype plus a catch-all over every object it
//! holds. Load contexts own local sets, [`crate::model::state::EngineState`]
//! owns the global ones. Inserting an id twice, or into the wrong
//! partition, is a programmer error and panics.

use rustc_hash::FxHashMap;

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::model::arena::ObjectHandle;

/// Id → handle map scoped to one architype (or the catch-all).
#[derive(Debug, Default)]
pub struct Cache {
    items: FxHashMap<ObjectId, ObjectHandle>,
}

impl Cache {
    pub fn get(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.items.get(id).copied()
    }

    pub fn has_id(&self, id: &ObjectId) -> bool {
        self.items.contains_key(id)
    }

    /// Panics if `id` is already cached.
    pub fn add_item(&mut self, id: ObjectId, handle: ObjectHandle) {
        let prev = self.items.insert(id.clone(), handle);
        assert!(prev.is_none(), "cache item re-assigned: {id}");
    }

    pub fn remove_item(&mut self, id: &ObjectId) -> Option<ObjectHandle> {
        self.items.remove(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, ObjectHandle)> {
        self.items.iter().map(|(id, h)| (id, *h))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// One cache per architype plus the catch-all.
#[derive(Debug, Default)]
pub struct CacheSet {
    partitions: FxHashMap<Architype, Cache>,
    all: Cache,
}

impl CacheSet {
    pub fn new() -> Self {
        let mut partitions = FxHashMap::default();
        for a in Architype::ALL {
            partitions.insert(a, Cache::default());
        }
        Self {
            partitions,
            all: Cache::default(),
        }
    }

    /// Insert into the architype partition and the catch-all.
    pub fn add_item(&mut self, id: ObjectId, architype: Architype, handle: ObjectHandle) {
        let cache = self
            .partitions
            .get_mut(&architype)
            .unwrap_or_else(|| panic!("no cache partition for {architype}"));
        cache.add_item(id.clone(), handle);
        self.all.add_item(id, handle);
    }

    pub fn remove_item(&mut self, id: &ObjectId, architype: Architype) -> Option<ObjectHandle> {
        let removed = self.partitions.get_mut(&architype)?.remove_item(id);
        if removed.is_some() {
            self.all.remove_item(id);
        }
        removed
    }

    pub fn get(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.all.get(id)
    }

    pub fn get_in(&self, id: &ObjectId, architype: Architype) -> Option<ObjectHandle> {
        self.partitions.get(&architype).and_then(|c| c.get(id))
    }

    pub fn catch_all(&self) -> &Cache {
        &self.all
    }

    pub fn partition(&self, architype: Architype) -> &Cache {
        &self.partitions[&architype]
    }

    pub fn clear(&mut self) {
        for cache in self.partitions.values_mut() {
            cache.clear();
        }
        self.all.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::arena::ObjectArena;
    use crate::model::object::SmartObject;
    use crate::reflection::descriptor::TypeId;

    fn handle(arena: &mut ObjectArena, id: &str, arch: Architype) -> ObjectHandle {
        arena.insert(SmartObject::new(ObjectId::new(id), TypeId(1), arch, Vec::new()))
    }

    #[test]
    fn add_fills_partition_and_catch_all() {
        let mut arena = ObjectArena::new();
        let h = handle(&mut arena, "mesh_cube", Architype::Mesh);

        let mut set = CacheSet::new();
        set.add_item(ObjectId::new("mesh_cube"), Architype::Mesh, h);

        assert_eq!(set.get(&ObjectId::new("mesh_cube")), Some(h));
        assert_eq!(set.get_in(&ObjectId::new("mesh_cube"), Architype::Mesh), Some(h));
        assert_eq!(set.get_in(&ObjectId::new("mesh_cube"), Architype::Texture), None);
    }

    #[test]
    #[should_panic(expected = "re-assigned")]
    fn duplicate_insert_panics() {
        let mut arena = ObjectArena::new();
        let h = handle(&mut arena, "a", Architype::Mesh);

        let mut set = CacheSet::new();
        set.add_item(ObjectId::new("a"), Architype::Mesh, h);
        set.add_item(ObjectId::new("a"), Architype::Mesh, h);
    }

    #[test]
    fn remove_clears_both_views() {
        let mut arena = ObjectArena::new();
        let h = handle(&mut arena, "a", Architype::Mesh);

        let mut set = CacheSet::new();
        set.add_item(ObjectId::new("a"), Architype::Mesh, h);
        assert_eq!(set.remove_item(&ObjectId::new("a"), Architype::Mesh), Some(h));
        assert_eq!(set.get(&ObjectId::new("a")), None);
        assert!(set.partition(Architype::Mesh).is_empty());
    }
}
