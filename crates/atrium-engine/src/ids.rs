//! Object identity
//!
//! Every smart object, package, level and reflection type is addressed by an
//! [`ObjectId`]: an immutable, cheaply clonable string identity. Cloned
//! sub-object graphs stay uniquely addressable through composite child ids
//! (`"<owner>/<sub>"`), see [`ObjectId::child`].

use std::fmt;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Identity of an object, container or reflection type.
///
/// Wraps an `Arc<str>` so that ids can be held by caches, mappings and
/// prototype back-references without copying the underlying text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Arc<str>);

impl ObjectId {
    /// Create an id from anything string-like.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The textual form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty (never valid for a registered object).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Composite identity for a sub-object cloned under a new owner:
    /// `"<self>/<sub>"`.
    pub fn child(&self, sub: &ObjectId) -> ObjectId {
        ObjectId::new(format!("{}/{}", self.0, sub.0))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ObjectId::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_ids_compose() {
        let owner = ObjectId::new("go_b");
        let sub = ObjectId::new("root");
        assert_eq!(owner.child(&sub).as_str(), "go_b/root");
    }

    #[test]
    fn ids_compare_by_text() {
        assert_eq!(ObjectId::new("mesh_cube"), ObjectId::from("mesh_cube"));
        assert_ne!(ObjectId::new("mesh_cube"), ObjectId::new("mesh_sphere"));
    }
}
