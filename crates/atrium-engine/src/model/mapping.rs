//! Object mappings and container manifests.
//!
//! A container's manifest records which object ids it provides and the
//! relative path each one is stored at, split into a class section and an
//! instance section. Sections are ordered lists of single-pair maps so the
//! load order is the manifest order.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;
use crate::{ModelError, ModelResult};

/// `package.acfg` contents.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub class_obj_mapping: Vec<BTreeMap<ObjectId, PathBuf>>,
    #[serde(default)]
    pub instance_obj_mapping: Vec<BTreeMap<ObjectId, PathBuf>>,
}

/// `root.cfg` contents.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LevelManifest {
    #[serde(default)]
    pub packages: Vec<ObjectId>,
    #[serde(default)]
    pub instance_obj_mapping: Vec<BTreeMap<ObjectId, PathBuf>>,
}

/// One mapping record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub is_class: bool,
    pub rel_path: PathBuf,
}

/// Id → storage location of every object a container provides.
#[derive(Debug, Default)]
pub struct ObjectMapping {
    items: FxHashMap<ObjectId, MappingEntry>,
    class_order: Vec<ObjectId>,
    instance_order: Vec<ObjectId>,
}

impl ObjectMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_package_manifest(manifest: &PackageManifest) -> ModelResult<Self> {
        let mut mapping = Self::new();
        mapping.extend(&manifest.class_obj_mapping, true)?;
        mapping.extend(&manifest.instance_obj_mapping, false)?;
        Ok(mapping)
    }

    pub fn from_level_manifest(manifest: &LevelManifest) -> ModelResult<Self> {
        let mut mapping = Self::new();
        mapping.extend(&manifest.instance_obj_mapping, false)?;
        Ok(mapping)
    }

    fn extend(
        &mut self,
        section: &[BTreeMap<ObjectId, PathBuf>],
        is_class: bool,
    ) -> ModelResult<()> {
        for pair in section {
            let (id, rel_path) = pair.iter().next().ok_or_else(|| {
                ModelError::SerializationError("empty mapping entry".into())
            })?;
            if pair.len() > 1 {
                return Err(ModelError::SerializationError(format!(
                    "mapping entry `{id}` carries {} pairs, expected one",
                    pair.len()
                )));
            }
            self.insert(id.clone(), is_class, rel_path.clone())?;
        }
        Ok(())
    }

    pub fn insert(&mut self, id: ObjectId, is_class: bool, rel_path: PathBuf) -> ModelResult<()> {
        if self.items.contains_key(&id) {
            return Err(ModelError::SerializationError(format!(
                "duplicate mapping entry: {id}"
            )));
        }
        if is_class {
            self.class_order.push(id.clone());
        } else {
            self.instance_order.push(id.clone());
        }
        self.items.insert(id, MappingEntry { is_class, rel_path });
        Ok(())
    }

    pub fn get(&self, id: &ObjectId) -> Option<&MappingEntry> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.items.contains_key(id)
    }

    /// Class ids in manifest order.
    pub fn class_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.class_order.iter()
    }

    /// Instance ids in manifest order.
    pub fn instance_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.instance_order.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn section(&self, order: &[ObjectId]) -> Vec<BTreeMap<ObjectId, PathBuf>> {
        order
            .iter()
            .map(|id| {
                let mut pair = BTreeMap::new();
                pair.insert(id.clone(), self.items[id].rel_path.clone());
                pair
            })
            .collect()
    }

    pub fn to_package_manifest(&self) -> PackageManifest {
        PackageManifest {
            class_obj_mapping: self.section(&self.class_order),
            instance_obj_mapping: self.section(&self.instance_order),
        }
    }

    pub fn to_level_manifest(&self, packages: Vec<ObjectId>) -> LevelManifest {
        LevelManifest {
            packages,
            instance_obj_mapping: self.section(&self.instance_order),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn package_manifest_keeps_section_order() {
        let doc = json!({
            "class_obj_mapping": [
                { "shader_basic": "objects/shader_basic.json" },
                { "mat_default": "objects/mat_default.json" },
                { "mesh_cube": "objects/mesh_cube.json" }
            ]
        });
        let manifest: PackageManifest = serde_json::from_value(doc).unwrap();
        let mapping = ObjectMapping::from_package_manifest(&manifest).unwrap();

        let order: Vec<_> = mapping.class_ids().map(|id| id.as_str()).collect();
        assert_eq!(order, ["shader_basic", "mat_default", "mesh_cube"]);
        assert!(mapping.get(&ObjectId::new("mesh_cube")).unwrap().is_class);
    }

    #[test]
    fn multi_pair_mapping_entries_are_rejected() {
        let doc = json!({
            "class_obj_mapping": [
                { "mesh_cube": "objects/mesh_cube.json", "mesh_sphere": "objects/mesh_sphere.json" }
            ]
        });
        let manifest: PackageManifest = serde_json::from_value(doc).unwrap();
        assert!(ObjectMapping::from_package_manifest(&manifest).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut mapping = ObjectMapping::new();
        mapping
            .insert(ObjectId::new("a"), true, PathBuf::from("a.json"))
            .unwrap();
        assert!(mapping
            .insert(ObjectId::new("a"), false, PathBuf::from("b.json"))
            .is_err());
    }

    #[test]
    fn manifest_round_trip() {
        let mut mapping = ObjectMapping::new();
        mapping
            .insert(ObjectId::new("mesh_cube"), true, PathBuf::from("objects/mesh_cube.json"))
            .unwrap();
        let manifest = mapping.to_package_manifest();
        let text = serde_json::to_string(&manifest).unwrap();
        let back: PackageManifest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.class_obj_mapping.len(), 1);
    }
}
