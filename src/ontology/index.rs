//! Ontology index: bidirectional schema-id ⇄ name-path mapping.
//!
//! Built once per ontology version and held for the duration of an
//! upload/download session. Every node in the tree appears exactly once;
//! the `encoded_value` ordinal is assigned by depth-first pre-order
//! traversal (tools first, then top-level classifications, one shared
//! counter), so it is strictly increasing, unique, and deterministic for
//! a fixed ontology structure. COCO export uses it as a compact numeric
//! category id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::model::{FeatureType, NodeKind, Ontology, OntologyNode};
use crate::error::FlatlabelError;

/// Which way an exported index map is keyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexDirection {
    /// `feature_schema_id -> name_path`
    Forward,
    /// `name_path -> feature_schema_id`
    Inverse,
}

/// One indexed ontology node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub feature_type: FeatureType,
    pub kind: NodeKind,
    /// 1-based depth-first ordinal across the whole ontology.
    pub encoded_value: u32,
    pub name_path: String,
    pub feature_schema_id: String,
}

/// Bidirectional ontology lookup table.
///
/// Holds one [`IndexEntry`] per node, addressable by schema id or by full
/// name path, and iterable in traversal order.
#[derive(Clone, Debug, Default)]
pub struct OntologyIndex {
    divider: String,
    entries: Vec<IndexEntry>,
    by_schema: BTreeMap<String, usize>,
    by_path: BTreeMap<String, usize>,
}

impl OntologyIndex {
    /// Walks the ontology and builds the index.
    pub fn build(ontology: &Ontology, divider: &str) -> Self {
        let mut index = OntologyIndex {
            divider: divider.to_string(),
            ..Default::default()
        };
        // One running counter across both sublists: top-level
        // classifications continue from where the tools left off.
        let mut encoded_value: u32 = 0;
        index.map_layer(&ontology.tools, "", &mut encoded_value);
        index.map_layer(&ontology.classifications, "", &mut encoded_value);
        index
    }

    fn map_layer(&mut self, layer: &[OntologyNode], parent_path: &str, encoded_value: &mut u32) {
        for node in layer {
            *encoded_value += 1;
            let name_path = if parent_path.is_empty() {
                node.name.clone()
            } else {
                format!("{parent_path}{}{}", self.divider, node.name)
            };
            let slot = self.entries.len();
            self.entries.push(IndexEntry {
                name: node.name.clone(),
                feature_type: node.feature_type,
                kind: node.kind,
                encoded_value: *encoded_value,
                name_path: name_path.clone(),
                feature_schema_id: node.feature_schema_id.clone(),
            });
            self.by_schema
                .insert(node.feature_schema_id.clone(), slot);
            self.by_path.insert(name_path.clone(), slot);
            self.map_layer(&node.children, &name_path, encoded_value);
        }
    }

    /// The divider this index was built with.
    pub fn divider(&self) -> &str {
        &self.divider
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in depth-first traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn entry_by_schema(&self, feature_schema_id: &str) -> Option<&IndexEntry> {
        self.by_schema
            .get(feature_schema_id)
            .map(|&slot| &self.entries[slot])
    }

    pub fn entry_by_path(&self, name_path: &str) -> Option<&IndexEntry> {
        self.by_path.get(name_path).map(|&slot| &self.entries[slot])
    }

    /// Forward lookup: schema id to full name path.
    pub fn name_path(&self, feature_schema_id: &str) -> Option<&str> {
        self.entry_by_schema(feature_schema_id)
            .map(|entry| entry.name_path.as_str())
    }

    /// Inverse lookup: full name path to schema id.
    pub fn schema_id(&self, name_path: &str) -> Option<&str> {
        self.entry_by_path(name_path)
            .map(|entry| entry.feature_schema_id.as_str())
    }

    /// Like [`entry_by_path`](Self::entry_by_path) but a miss is a
    /// data-integrity error naming the path.
    pub fn require_path(&self, name_path: &str) -> Result<&IndexEntry, FlatlabelError> {
        self.entry_by_path(name_path)
            .ok_or_else(|| FlatlabelError::MissingIndexEntry {
                key: name_path.to_string(),
            })
    }

    /// Like [`entry_by_schema`](Self::entry_by_schema) but a miss is a
    /// data-integrity error naming the schema id.
    pub fn require_schema(&self, feature_schema_id: &str) -> Result<&IndexEntry, FlatlabelError> {
        self.entry_by_schema(feature_schema_id)
            .ok_or_else(|| FlatlabelError::MissingIndexEntry {
                key: feature_schema_id.to_string(),
            })
    }

    /// Exports the index in one of the four legacy map layouts.
    ///
    /// Compact maps pair schema ids with name paths (in the requested
    /// direction); detailed maps carry
    /// `{name, type, kind, encoded_value, name_path|schema_id}` values.
    pub fn to_map(
        &self,
        direction: IndexDirection,
        detailed: bool,
    ) -> BTreeMap<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|entry| {
                let key = match direction {
                    IndexDirection::Forward => entry.feature_schema_id.clone(),
                    IndexDirection::Inverse => entry.name_path.clone(),
                };
                let value = if detailed {
                    let mut detail = json!({
                        "name": entry.name,
                        "type": entry.feature_type.token(),
                        "kind": entry.kind.token(),
                        "encoded_value": entry.encoded_value,
                    });
                    let extra = match direction {
                        IndexDirection::Forward => ("name_path", entry.name_path.clone()),
                        IndexDirection::Inverse => {
                            ("schema_id", entry.feature_schema_id.clone())
                        }
                    };
                    detail[extra.0] = json!(extra.1);
                    detail
                } else {
                    match direction {
                        IndexDirection::Forward => json!(entry.name_path),
                        IndexDirection::Inverse => json!(entry.feature_schema_id),
                    }
                };
                (key, value)
            })
            .collect()
    }
}
