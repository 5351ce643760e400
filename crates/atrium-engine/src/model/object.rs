//! Smart objects: the reflected runtime unit.

use bitflags::bitflags;

use crate::ids::ObjectId;
use crate::model::architype::Architype;
use crate::model::arena::ObjectHandle;
use crate::model::value::PropertyValue;
use crate::reflection::descriptor::TypeId;
use crate::{ModelError, ModelResult};

/// Lifecycle state of a smart object.
///
/// Forward path: Empty → Loaded → Constructed → RenderPreparing →
/// RenderReady. Teardown runs RenderReady → RenderPreparing → Constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Empty,
    Loaded,
    Constructed,
    RenderPreparing,
    RenderReady,
}

impl ObjectState {
    fn can_transition(self, to: ObjectState) -> bool {
        use ObjectState::*;
        matches!(
            (self, to),
            (Empty, Loaded)
                | (Loaded, Constructed)
                | (Constructed, RenderPreparing)
                | (RenderPreparing, RenderReady)
                | (RenderReady, RenderPreparing)
                | (RenderPreparing, Constructed)
        )
    }
}

bitflags! {
    /// Role flags, orthogonal to lifecycle state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u32 {
        /// Prototype object living in class scope.
        const PROTO_OBJ    = 1 << 0;
        /// Instance object living in a level's scope.
        const INSTANCE_OBJ = 1 << 1;
        /// Created outside any container document.
        const STANDALONE   = 1 << 2;
        /// Loaded partially against a prototype (`class_id` document).
        const INHERITED    = 1 << 3;
        /// Instance-scope duplicate of a class object under the same id.
        const MIRROR       = 1 << 4;
    }
}

/// Container an object belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Package(ObjectId),
    Level(ObjectId),
}

/// A reflected object: identity, type, lifecycle and the value vector the
/// type's property slots index into.
#[derive(Debug)]
pub struct SmartObject {
    id: ObjectId,
    type_id: TypeId,
    architype: Architype,
    state: ObjectState,
    flags: ObjectFlags,
    prototype: Option<ObjectHandle>,
    owner: Option<Owner>,
    values: Vec<PropertyValue>,
}

impl SmartObject {
    pub fn new(
        id: ObjectId,
        type_id: TypeId,
        architype: Architype,
        values: Vec<PropertyValue>,
    ) -> Self {
        Self {
            id,
            type_id,
            architype,
            state: ObjectState::Empty,
            flags: ObjectFlags::empty(),
            prototype: None,
            owner: None,
            values,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn architype(&self) -> Architype {
        self.architype
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Advance the lifecycle, rejecting transitions outside the state graph.
    pub fn set_state(&mut self, to: ObjectState) -> ModelResult<()> {
        if self.state == to {
            return Ok(());
        }
        if !self.state.can_transition(to) {
            return Err(ModelError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn add_flags(&mut self, flags: ObjectFlags) {
        self.flags |= flags;
    }

    pub fn has_flag(&self, flag: ObjectFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn prototype(&self) -> Option<ObjectHandle> {
        self.prototype
    }

    /// Assign-once prototype back-reference.
    pub fn set_prototype(&mut self, proto: ObjectHandle) -> ModelResult<()> {
        if self.prototype.is_some() {
            return Err(ModelError::PrototypeAlreadySet(self.id.clone()));
        }
        self.prototype = Some(proto);
        Ok(())
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// Assign-once container ownership.
    pub fn set_owner(&mut self, owner: Owner) -> ModelResult<()> {
        if self.owner.is_some() {
            return Err(ModelError::OwnerAlreadySet(self.id.clone()));
        }
        self.owner = Some(owner);
        Ok(())
    }

    pub fn value(&self, slot: usize) -> &PropertyValue {
        &self.values[slot]
    }

    pub fn value_mut(&mut self, slot: usize) -> &mut PropertyValue {
        &mut self.values[slot]
    }

    pub fn set_value(&mut self, slot: usize, value: PropertyValue) {
        self.values[slot] = value;
    }

    pub fn values(&self) -> &[PropertyValue] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj() -> SmartObject {
        SmartObject::new(
            ObjectId::new("o"),
            TypeId(1),
            Architype::SmartObject,
            Vec::new(),
        )
    }

    #[test]
    fn forward_lifecycle_and_teardown() {
        let mut o = obj();
        o.set_state(ObjectState::Loaded).unwrap();
        o.set_state(ObjectState::Constructed).unwrap();
        o.set_state(ObjectState::RenderPreparing).unwrap();
        o.set_state(ObjectState::RenderReady).unwrap();
        o.set_state(ObjectState::RenderPreparing).unwrap();
        o.set_state(ObjectState::Constructed).unwrap();
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut o = obj();
        let err = o.set_state(ObjectState::Constructed).unwrap_err();
        assert!(matches!(
            err,
            crate::ModelError::InvalidTransition {
                from: ObjectState::Empty,
                to: ObjectState::Constructed,
            }
        ));
    }

    #[test]
    fn owner_and_prototype_assign_once() {
        let mut o = obj();
        o.set_owner(Owner::Package(ObjectId::new("base"))).unwrap();
        assert!(o.set_owner(Owner::Level(ObjectId::new("intro"))).is_err());
    }
}
