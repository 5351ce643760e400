//! The standard type set.
//!
//! Registers the scalar value types plus the domain tree: smart_object at
//! the root, game_object with its owned component collection, the
//! component hierarchy with transform and render properties, and the
//! render asset types. Slot constants reflect the parent-first merge
//! order the registry produces at finalize.

use crate::model::architype::Architype;
use crate::reflection::builder::TypeBuilder;
use crate::reflection::descriptor::{type_ids, TypeDescriptor, TypeId};
use crate::reflection::handlers;
use crate::reflection::property::Property;
use crate::reflection::registry::TypeRegistry;

/// Domain type ids.
pub mod types {
    use crate::reflection::descriptor::TypeId;

    pub const SMART_OBJECT: TypeId = TypeId(32);
    pub const GAME_OBJECT: TypeId = TypeId(33);
    pub const COMPONENT: TypeId = TypeId(34);
    pub const GAME_OBJECT_COMPONENT: TypeId = TypeId(35);
    pub const MESH_COMPONENT: TypeId = TypeId(36);
    pub const MESH: TypeId = TypeId(37);
    pub const TEXTURE: TypeId = TypeId(38);
    pub const MATERIAL: TypeId = TypeId(39);
    pub const SHADER_EFFECT: TypeId = TypeId(40);
}

/// Value-vector slots after finalize.
pub mod slots {
    pub const GAME_OBJECT_COMPONENTS: usize = 0;

    pub const COMPONENT_ENABLED: usize = 0;
    pub const TRANSFORM_POSITION: usize = 1;
    pub const TRANSFORM_ROTATION: usize = 2;
    pub const TRANSFORM_SCALE: usize = 3;
    pub const MESH_COMPONENT_MESH: usize = 4;
    pub const MESH_COMPONENT_MATERIAL: usize = 5;

    pub const MESH_SOURCE: usize = 0;

    pub const TEXTURE_SOURCE: usize = 0;
    pub const TEXTURE_SRGB: usize = 1;

    pub const MATERIAL_BASE_TEXTURE: usize = 0;
    pub const MATERIAL_SHADER_EFFECT: usize = 1;
    pub const MATERIAL_BASE_COLOR: usize = 2;

    pub const SHADER_VERTEX_STAGE: usize = 0;
    pub const SHADER_FRAGMENT_STAGE: usize = 1;
    pub const SHADER_ENABLE_ALPHA: usize = 2;
}

const MODULE: &str = "base";

fn vec3_prop(name: &str) -> Property {
    Property::new(name, TypeDescriptor::value(type_ids::VEC3))
        .category("transform")
        .serializable()
        .with_default()
}

/// Register every standard type. The caller finalizes the registry.
pub fn register_base_types(registry: &mut TypeRegistry) {
    handlers::register_scalar_types(registry);

    TypeBuilder::new(types::SMART_OBJECT, MODULE, "smart_object", Architype::SmartObject)
        .handlers(handlers::object_ref_handlers())
        .register(registry);

    TypeBuilder::new(types::GAME_OBJECT, MODULE, "game_object", Architype::GameObject)
        .parent(types::SMART_OBJECT)
        .property(
            Property::new("components", TypeDescriptor::ref_collection(types::COMPONENT))
                .category("meta")
                .serializable()
                .with_default(),
        )
        .register(registry);

    TypeBuilder::new(types::COMPONENT, MODULE, "component", Architype::Component)
        .parent(types::SMART_OBJECT)
        .handlers(handlers::component_ref_handlers())
        .property(
            Property::new("enabled", TypeDescriptor::value(type_ids::BOOL))
                .category("meta")
                .serializable()
                .with_default(),
        )
        .register(registry);

    TypeBuilder::new(
        types::GAME_OBJECT_COMPONENT,
        MODULE,
        "game_object_component",
        Architype::Component,
    )
    .parent(types::COMPONENT)
    .property(vec3_prop("position"))
    .property(vec3_prop("rotation"))
    .property(vec3_prop("scale"))
    .register(registry);

    TypeBuilder::new(types::MESH_COMPONENT, MODULE, "mesh_component", Architype::Component)
        .parent(types::GAME_OBJECT_COMPONENT)
        .property(
            Property::new("mesh", TypeDescriptor::reference(types::MESH))
                .category("render")
                .serializable()
                .with_default()
                .render_subobject(),
        )
        .property(
            Property::new("material", TypeDescriptor::reference(types::MATERIAL))
                .category("render")
                .serializable()
                .with_default()
                .render_subobject(),
        )
        .register(registry);

    TypeBuilder::new(types::MESH, MODULE, "mesh", Architype::Mesh)
        .parent(types::SMART_OBJECT)
        .property(
            Property::new("source", TypeDescriptor::value(type_ids::STRING))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .register(registry);

    TypeBuilder::new(types::TEXTURE, MODULE, "texture", Architype::Texture)
        .parent(types::SMART_OBJECT)
        .property(
            Property::new("source", TypeDescriptor::value(type_ids::STRING))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .property(
            Property::new("srgb", TypeDescriptor::value(type_ids::BOOL))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .register(registry);

    TypeBuilder::new(types::MATERIAL, MODULE, "material", Architype::Material)
        .parent(types::SMART_OBJECT)
        .property(
            Property::new("base_texture", TypeDescriptor::reference(types::TEXTURE))
                .category("render")
                .serializable()
                .with_default()
                .render_subobject(),
        )
        .property(
            Property::new("shader_effect", TypeDescriptor::reference(types::SHADER_EFFECT))
                .category("render")
                .serializable()
                .with_default()
                .render_subobject(),
        )
        .property(
            Property::new("base_color", TypeDescriptor::value(type_ids::VEC3))
                .category("render")
                .serializable()
                .with_default(),
        )
        .register(registry);

    TypeBuilder::new(types::SHADER_EFFECT, MODULE, "shader_effect", Architype::ShaderEffect)
        .parent(types::SMART_OBJECT)
        .property(
            Property::new("vertex_stage", TypeDescriptor::value(type_ids::STRING))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .property(
            Property::new("fragment_stage", TypeDescriptor::value(type_ids::STRING))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .property(
            Property::new("enable_alpha", TypeDescriptor::value(type_ids::BOOL))
                .category("asset")
                .serializable()
                .with_default(),
        )
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_properties_come_first() {
        let mut registry = TypeRegistry::new();
        register_base_types(&mut registry);
        registry.finalize();

        let mc = registry.get(types::MESH_COMPONENT).unwrap();
        let names: Vec<_> = mc.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["enabled", "position", "rotation", "scale", "mesh", "material"]
        );
        assert_eq!(mc.properties[slots::MESH_COMPONENT_MESH].slot, slots::MESH_COMPONENT_MESH);
    }

    #[test]
    fn serializable_types_have_complete_handler_sets() {
        let mut registry = TypeRegistry::new();
        register_base_types(&mut registry);
        registry.finalize();

        for type_id in [
            types::GAME_OBJECT,
            types::MESH_COMPONENT,
            types::MATERIAL,
            types::SHADER_EFFECT,
        ] {
            let rt = registry.get(type_id).unwrap();
            for p in rt.serialization_properties.iter() {
                assert!(p.handlers.serialize.is_some(), "{}", p.name);
                assert!(p.handlers.deserialize.is_some(), "{}", p.name);
                assert!(p.handlers.copy.is_some(), "{}", p.name);
                assert!(p.handlers.compare.is_some(), "{}", p.name);
            }
        }
    }

    #[test]
    fn component_inherits_ref_handlers_down_the_tree() {
        let mut registry = TypeRegistry::new();
        register_base_types(&mut registry);
        registry.finalize();

        // mesh_component declared no handlers of its own; after finalize it
        // resolves the component set from its nearest ancestor.
        let mc = registry.get(types::MESH_COMPONENT).unwrap();
        assert!(mc.handlers.serialize.is_some());
        assert!(mc.handlers.copy.is_some());
    }
}
