//! Document storage and resource resolution.
//!
//! Objects and container manifests are generic hierarchical documents
//! ([`Document`], a `serde_json` value). All filesystem traffic goes through
//! the [`Storage`] seam so tests and tooling can substitute their own
//! backends, and container ids are turned into concrete paths by a
//! [`ResourceResolver`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::ids::ObjectId;
use crate::{ModelError, ModelResult};

/// Generic hierarchical container for object and manifest data.
pub type Document = serde_json::Value;

/// Reserved document keys.
pub mod keys {
    /// Reflection type name of a fully saved object.
    pub const TYPE_ID: &str = "type_id";
    /// Prototype id of a partially saved (inherited) object.
    pub const CLASS_ID: &str = "class_id";
    /// Object identity.
    pub const ID: &str = "id";
    /// Element placement index inside a serialized collection.
    pub const ORDER_IDX: &str = "order_idx";
    /// Collection element payload.
    pub const VALUE: &str = "value";
    /// Prototype id of a serialized sub-object reference.
    pub const OBJECT_CLASS: &str = "object_class";
    /// Package list of a level manifest.
    pub const PACKAGES: &str = "packages";
}

/// Insert `value` under `key`, assuming `doc` is a JSON object.
pub fn doc_insert(doc: &mut Document, key: &str, value: Document) -> ModelResult<()> {
    doc.as_object_mut()
        .ok_or_else(|| ModelError::SerializationError("expected an object document".into()))?
        .insert(key.to_owned(), value);
    Ok(())
}

/// Read the mandatory id-valued field `key` from `doc`.
pub fn doc_id(doc: &Document, key: &str) -> ModelResult<ObjectId> {
    doc.get(key)
        .and_then(Document::as_str)
        .map(ObjectId::new)
        .ok_or_else(|| ModelError::SerializationError(format!("missing field `{key}`")))
}

/// Read the optional id-valued field `key` from `doc`.
pub fn doc_opt_id(doc: &Document, key: &str) -> Option<ObjectId> {
    doc.get(key).and_then(Document::as_str).map(ObjectId::new)
}

/// Categories a [`ResourceResolver`] can resolve ids within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCategory {
    Packages,
    Levels,
}

/// Maps container ids to concrete filesystem paths.
pub trait ResourceResolver: fmt::Debug {
    fn resolve(&self, category: ResourceCategory, id: &ObjectId) -> PathBuf;
}

/// Resolver rooted at a content directory: `<root>/packages/<id>.apkg`,
/// `<root>/levels/<id>.alvl`.
#[derive(Debug)]
pub struct DirResolver {
    root: PathBuf,
}

impl DirResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceResolver for DirResolver {
    fn resolve(&self, category: ResourceCategory, id: &ObjectId) -> PathBuf {
        match category {
            ResourceCategory::Packages => {
                self.root.join("packages").join(format!("{id}.apkg"))
            }
            ResourceCategory::Levels => self.root.join("levels").join(format!("{id}.alvl")),
        }
    }
}

/// Blocking document I/O seam.
pub trait Storage: fmt::Debug {
    /// Read and decode the document at `path`.
    ///
    /// A missing file maps to [`ModelError::PathNotFound`], a malformed one
    /// to [`ModelError::SerializationError`].
    fn read_container(&self, path: &Path) -> ModelResult<Document>;

    /// Encode and write `doc` at `path`, creating parent directories.
    fn write_container(&self, path: &Path, doc: &Document) -> ModelResult<()>;
}

/// Filesystem-backed JSON storage.
#[derive(Debug, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read_container(&self, path: &Path) -> ModelResult<Document> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ModelError::PathNotFound(path.to_path_buf()),
            _ => ModelError::SerializationError(format!("{}: {e}", path.display())),
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ModelError::SerializationError(format!("{}: {e}", path.display())))
    }

    fn write_container(&self, path: &Path, doc: &Document) -> ModelResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ModelError::SerializationError(format!("{}: {e}", parent.display())))?;
        }
        let text = serde_json::to_string_pretty(doc)
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;
        fs::write(path, text)
            .map_err(|e| ModelError::SerializationError(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fs_storage_round_trips_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("obj.json");
        let doc = json!({ "id": "mesh_cube", "type_id": "mesh" });

        FsStorage.write_container(&path, &doc).unwrap();
        assert_eq!(FsStorage.read_container(&path).unwrap(), doc);
    }

    #[test]
    fn missing_file_is_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsStorage
            .read_container(&dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, ModelError::PathNotFound(_)));
    }

    #[test]
    fn dir_resolver_shapes_paths() {
        let r = DirResolver::new("/content");
        let p = r.resolve(ResourceCategory::Packages, &ObjectId::new("base"));
        assert_eq!(p, PathBuf::from("/content/packages/base.apkg"));
        let l = r.resolve(ResourceCategory::Levels, &ObjectId::new("intro"));
        assert_eq!(l, PathBuf::from("/content/levels/intro.alvl"));
    }
}
