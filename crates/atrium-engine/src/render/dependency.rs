//! Incremental render dependency tracking.
//!
//! The graph records which render-subobjects each owner currently uses
//! (forward map) and which owners use each subobject (reverse map).
//! Rebuilding a node diffs against the previous snapshot, so the work done
//! is proportional to what changed, and reverse entries are pruned as soon
//! as their owner set empties.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::arena::ObjectHandle;
use crate::model::state::EngineState;
use crate::model::value::PropertyValue;
use crate::ModelResult;

#[derive(Debug, Default)]
struct Node {
    children: FxHashSet<ObjectHandle>,
    prev_children: FxHashSet<ObjectHandle>,
}

#[derive(Debug, Default)]
pub struct RenderDependencyGraph {
    forward: FxHashMap<ObjectHandle, Node>,
    reverse: FxHashMap<ObjectHandle, FxHashSet<ObjectHandle>>,
}

impl RenderDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan the owner's render-subobject properties and apply the edge
    /// delta against the previous snapshot.
    pub fn build_node(&mut self, state: &EngineState, owner: ObjectHandle) -> ModelResult<()> {
        let mut current: FxHashSet<ObjectHandle> = FxHashSet::default();
        {
            let obj = state.arena.object(owner)?;
            let rt = state.registry.expect(obj.type_id())?;
            for p in rt.properties.iter().filter(|p| p.render_subobject) {
                match obj.value(p.slot) {
                    PropertyValue::Ref(Some(h)) => {
                        current.insert(*h);
                    }
                    PropertyValue::Collection(items) => {
                        for item in items {
                            if let PropertyValue::Ref(Some(h)) = item {
                                current.insert(*h);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let node = self.forward.entry(owner).or_default();
        let prev = std::mem::take(&mut node.prev_children);

        for added in current.difference(&prev) {
            self.reverse.entry(*added).or_default().insert(owner);
        }
        for removed in prev.difference(&current) {
            if let Some(owners) = self.reverse.get_mut(removed) {
                owners.remove(&owner);
                if owners.is_empty() {
                    self.reverse.remove(removed);
                }
            }
        }

        let node = self.forward.entry(owner).or_default();
        node.children = current.clone();
        node.prev_children = current;
        Ok(())
    }

    /// Drop the owner's node and every edge it contributed.
    pub fn remove_node(&mut self, owner: ObjectHandle) {
        let Some(node) = self.forward.remove(&owner) else {
            return;
        };
        for child in node.children {
            if let Some(owners) = self.reverse.get_mut(&child) {
                owners.remove(&owner);
                if owners.is_empty() {
                    self.reverse.remove(&child);
                }
            }
        }
    }

    pub fn children_of(&self, owner: ObjectHandle) -> Option<&FxHashSet<ObjectHandle>> {
        self.forward.get(&owner).map(|n| &n.children)
    }

    pub fn owners_of(&self, child: ObjectHandle) -> Option<&FxHashSet<ObjectHandle>> {
        self.reverse.get(&child)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{slots, types};
    use crate::ids::ObjectId;
    use crate::storage::{DirResolver, FsStorage};

    fn state_with_base() -> EngineState {
        EngineState::with_base_types(Box::new(FsStorage), Box::new(DirResolver::new("/tmp")))
    }

    fn alloc(state: &mut EngineState, type_id: crate::reflection::TypeId, id: &str) -> ObjectHandle {
        let obj = state.registry.get(type_id).unwrap().alloc_empty(&ObjectId::new(id));
        state.arena.insert(obj)
    }

    #[test]
    fn rebuild_applies_edge_delta_and_prunes() {
        let mut state = state_with_base();
        let mesh = alloc(&mut state, types::MESH, "mesh_b");
        let material = alloc(&mut state, types::MATERIAL, "mat_c");
        let owner = alloc(&mut state, types::MESH_COMPONENT, "mc_a");

        state
            .arena
            .object_mut(owner)
            .unwrap()
            .set_value(slots::MESH_COMPONENT_MESH, PropertyValue::Ref(Some(mesh)));
        state
            .arena
            .object_mut(owner)
            .unwrap()
            .set_value(slots::MESH_COMPONENT_MATERIAL, PropertyValue::Ref(Some(material)));

        let mut graph = RenderDependencyGraph::new();
        graph.build_node(&state, owner).unwrap();
        assert_eq!(graph.children_of(owner).unwrap().len(), 2);
        assert!(graph.owners_of(mesh).unwrap().contains(&owner));

        // Owner drops the mesh: the vanished edge goes away and the now
        // ownerless reverse entry is pruned.
        state
            .arena
            .object_mut(owner)
            .unwrap()
            .set_value(slots::MESH_COMPONENT_MESH, PropertyValue::Ref(None));
        graph.build_node(&state, owner).unwrap();

        assert_eq!(graph.children_of(owner).unwrap().len(), 1);
        assert!(graph.owners_of(mesh).is_none());
        assert!(graph.owners_of(material).unwrap().contains(&owner));
    }

    #[test]
    fn remove_node_drops_contributed_edges() {
        let mut state = state_with_base();
        let mesh = alloc(&mut state, types::MESH, "mesh_b");
        let owner = alloc(&mut state, types::MESH_COMPONENT, "mc_a");
        state
            .arena
            .object_mut(owner)
            .unwrap()
            .set_value(slots::MESH_COMPONENT_MESH, PropertyValue::Ref(Some(mesh)));

        let mut graph = RenderDependencyGraph::new();
        graph.build_node(&state, owner).unwrap();
        graph.remove_node(owner);
        assert!(graph.is_empty());
    }
}
