//! Generational object arena.
//!
//! Objects live in arena slots and are referenced everywhere else through
//! [`ObjectHandle`]s. A slot's generation bumps on removal, so a handle kept
//! past its object's lifetime resolves to [`crate::ModelError::DanglingHandle`]
//! instead of aliasing whatever reuses the slot.

use crate::model::object::SmartObject;
use crate::{ModelError, ModelResult};

/// Stable reference to an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<SmartObject>,
}

/// Owning store for every live [`SmartObject`].
#[derive(Debug, Default)]
pub struct ObjectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, obj: SmartObject) -> ObjectHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(obj);
            return ObjectHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(obj),
        });
        ObjectHandle {
            index,
            generation: 0,
        }
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Resolve a handle, rejecting stale generations.
    pub fn object(&self, handle: ObjectHandle) -> ModelResult<&SmartObject> {
        self.slot(handle).ok_or(ModelError::DanglingHandle)
    }

    pub fn object_mut(&mut self, handle: ObjectHandle) -> ModelResult<&mut SmartObject> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
            .ok_or(ModelError::DanglingHandle)
    }

    /// Free the object's slot. Stale handles are a no-op returning `None`.
    pub fn remove(&mut self, handle: ObjectHandle) -> Option<SmartObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let obj = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(obj)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &SmartObject)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|obj| {
                (
                    ObjectHandle {
                        index: i as u32,
                        generation: s.generation,
                    },
                    obj,
                )
            })
        })
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&SmartObject> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ObjectId;
    use crate::model::architype::Architype;
    use crate::reflection::descriptor::TypeId;

    fn obj(id: &str) -> SmartObject {
        SmartObject::new(
            ObjectId::new(id),
            TypeId(1),
            Architype::SmartObject,
            Vec::new(),
        )
    }

    #[test]
    fn insert_and_resolve() {
        let mut arena = ObjectArena::new();
        let h = arena.insert(obj("a"));
        assert_eq!(arena.object(h).unwrap().id().as_str(), "a");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_handle_dangles_after_slot_reuse() {
        let mut arena = ObjectArena::new();
        let h = arena.insert(obj("a"));
        arena.remove(h).unwrap();

        let h2 = arena.insert(obj("b"));
        // Same slot, new generation.
        assert!(arena.object(h).is_err());
        assert_eq!(arena.object(h2).unwrap().id().as_str(), "b");
    }

    #[test]
    fn double_remove_is_noop() {
        let mut arena = ObjectArena::new();
        let h = arena.insert(obj("a"));
        assert!(arena.remove(h).is_some());
        assert!(arena.remove(h).is_none());
        assert!(arena.is_empty());
    }
}
