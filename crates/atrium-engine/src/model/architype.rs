//! Object categories used to partition caches.

use std::fmt;

/// Coarse category of a smart object. Every reflection type belongs to
/// exactly one architype; caches keep one partition per variant plus a
/// catch-all over all objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architype {
    SmartObject,
    GameObject,
    Component,
    Mesh,
    Texture,
    ShaderEffect,
    Material,
}

impl Architype {
    pub const ALL: [Architype; 7] = [
        Architype::SmartObject,
        Architype::GameObject,
        Architype::Component,
        Architype::Mesh,
        Architype::Texture,
        Architype::ShaderEffect,
        Architype::Material,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Architype::SmartObject => "smart_object",
            Architype::GameObject => "game_object",
            Architype::Component => "component",
            Architype::Mesh => "mesh",
            Architype::Texture => "texture",
            Architype::ShaderEffect => "shader_effect",
            Architype::Material => "material",
        }
    }
}

impl fmt::Display for Architype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
