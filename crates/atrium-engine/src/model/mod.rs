//! The object model: arena, caches, constructor and containers.

pub mod architype;
pub mod arena;
pub mod caches;
pub mod constructor;
pub mod container;
pub mod level;
pub mod load_context;
pub mod mapping;
pub mod object;
pub mod package;
pub mod state;
pub mod value;

pub use architype::Architype;
pub use arena::{ObjectArena, ObjectHandle};
pub use caches::{Cache, CacheSet};
pub use container::Container;
pub use level::{Level, LevelManager, LevelState, SpawnParameters};
pub use load_context::{ConstructionMode, ObjectLoadContext};
pub use mapping::{LevelManifest, MappingEntry, ObjectMapping, PackageManifest};
pub use object::{ObjectFlags, ObjectState, Owner, SmartObject};
pub use package::{Package, PackageManager, PackageState};
pub use state::EngineState;
pub use value::PropertyValue;
