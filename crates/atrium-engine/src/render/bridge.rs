//! Render bridge: the seam between the object model and a renderer.

use crate::model::arena::ObjectHandle;
use crate::model::object::ObjectState;
use crate::model::state::EngineState;
use crate::render::dependency::RenderDependencyGraph;
use crate::ModelResult;

/// External renderer seam. Implementations compile or release GPU-side
/// resources for an object; a failure surfaces as
/// [`crate::ModelError::CompilationFailed`].
pub trait RenderBackend {
    fn render_construct(
        &mut self,
        state: &mut EngineState,
        obj: ObjectHandle,
        include_subobjects: bool,
    ) -> ModelResult<()>;

    fn render_destruct(
        &mut self,
        state: &mut EngineState,
        obj: ObjectHandle,
        include_subobjects: bool,
    ) -> ModelResult<()>;
}

/// Owns the dependency graph and drives object lifecycle into and out of
/// RenderReady around backend calls.
#[derive(Debug)]
pub struct RenderBridge<B> {
    backend: B,
    pub graph: RenderDependencyGraph,
}

impl<B: RenderBackend> RenderBridge<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            graph: RenderDependencyGraph::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Constructed → RenderPreparing → RenderReady, rebuilding the object's
    /// dependency node on the way.
    pub fn prepare(
        &mut self,
        state: &mut EngineState,
        obj: ObjectHandle,
        include_subobjects: bool,
    ) -> ModelResult<()> {
        state
            .arena
            .object_mut(obj)?
            .set_state(ObjectState::RenderPreparing)?;
        self.graph.build_node(state, obj)?;
        self.backend.render_construct(state, obj, include_subobjects)?;
        state.arena.object_mut(obj)?.set_state(ObjectState::RenderReady)
    }

    /// RenderReady → RenderPreparing → Constructed, dropping the object's
    /// dependency node.
    pub fn teardown(
        &mut self,
        state: &mut EngineState,
        obj: ObjectHandle,
        include_subobjects: bool,
    ) -> ModelResult<()> {
        state
            .arena
            .object_mut(obj)?
            .set_state(ObjectState::RenderPreparing)?;
        self.backend.render_destruct(state, obj, include_subobjects)?;
        self.graph.remove_node(obj);
        state.arena.object_mut(obj)?.set_state(ObjectState::Constructed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{slots, types};
    use crate::ids::ObjectId;
    use crate::model::value::PropertyValue;
    use crate::storage::{DirResolver, FsStorage};
    use crate::ModelError;

    #[derive(Debug, Default)]
    struct CountingBackend {
        constructed: usize,
        destructed: usize,
    }

    impl RenderBackend for CountingBackend {
        fn render_construct(
            &mut self,
            _: &mut EngineState,
            _: ObjectHandle,
            _: bool,
        ) -> ModelResult<()> {
            self.constructed += 1;
            Ok(())
        }

        fn render_destruct(
            &mut self,
            _: &mut EngineState,
            _: ObjectHandle,
            _: bool,
        ) -> ModelResult<()> {
            self.destructed += 1;
            Ok(())
        }
    }

    fn constructed_object(state: &mut EngineState, type_id: crate::reflection::TypeId, id: &str) -> ObjectHandle {
        let obj = state.registry.get(type_id).unwrap().alloc_empty(&ObjectId::new(id));
        let h = state.arena.insert(obj);
        let o = state.arena.object_mut(h).unwrap();
        o.set_state(ObjectState::Loaded).unwrap();
        o.set_state(ObjectState::Constructed).unwrap();
        h
    }

    #[test]
    fn prepare_and_teardown_walk_the_lifecycle() {
        let mut state = EngineState::with_base_types(
            Box::new(FsStorage),
            Box::new(DirResolver::new("/tmp")),
        );
        let mesh = constructed_object(&mut state, types::MESH, "mesh_cube");
        let owner = constructed_object(&mut state, types::MESH_COMPONENT, "mc");
        state
            .arena
            .object_mut(owner)
            .unwrap()
            .set_value(slots::MESH_COMPONENT_MESH, PropertyValue::Ref(Some(mesh)));

        let mut bridge = RenderBridge::new(CountingBackend::default());
        bridge.prepare(&mut state, owner, true).unwrap();
        assert_eq!(state.arena.object(owner).unwrap().state(), ObjectState::RenderReady);
        assert!(bridge.graph.owners_of(mesh).unwrap().contains(&owner));
        assert_eq!(bridge.backend().constructed, 1);

        bridge.teardown(&mut state, owner, true).unwrap();
        assert_eq!(state.arena.object(owner).unwrap().state(), ObjectState::Constructed);
        assert!(bridge.graph.is_empty());
        assert_eq!(bridge.backend().destructed, 1);
    }

    #[test]
    fn prepare_rejects_objects_that_are_not_constructed() {
        let mut state = EngineState::with_base_types(
            Box::new(FsStorage),
            Box::new(DirResolver::new("/tmp")),
        );
        let obj = state
            .registry
            .get(types::MESH)
            .unwrap()
            .alloc_empty(&ObjectId::new("mesh_cube"));
        let h = state.arena.insert(obj);

        let mut bridge = RenderBridge::new(CountingBackend::default());
        let err = bridge.prepare(&mut state, h, false).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTransition { .. }));
        assert_eq!(bridge.backend().constructed, 0);
    }
}
