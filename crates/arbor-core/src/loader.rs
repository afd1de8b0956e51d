//! Normalization of backend hierarchy payloads into a [`TreeModel`].
//!
//! The backend returns folders in several shapes: a bare array, an object
//! wrapping the array under one of a few keys, nested projections whose
//! children live under `subfolders` or `subcarpetas`, or a flat collection
//! linked by `parentFolder`. This module is the only place that knows about
//! those variations.

use std::collections::{HashMap, HashSet};

use compact_str::CompactString;
use serde_json::{Map, Value};

use crate::error::{LoadError, LoadWarning, WarningKind};
use crate::node::{BackendId, Category, NodeId};
use crate::tree::{Seed, TreeModel};

/// Keys that may wrap the top-level folder array, in priority order.
const WRAPPER_KEYS: &[&str] = &["items", "subfolders", "subcarpetas", "folders"];

/// Keys that may hold nested children, in priority order.
const CHILDREN_KEYS: &[&str] = &["subfolders", "subcarpetas"];

const ID_KEYS: &[&str] = &["_id", "id"];
const PARENT_KEYS: &[&str] = &["parentFolder", "parent_folder", "parent"];
const NAME_KEYS: &[&str] = &["name", "nombre"];
const DESCRIPTION_KEYS: &[&str] = &["description", "descripcion"];

/// Result of a load: the model plus anything that was skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct LoadedHierarchy {
    pub model: TreeModel,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedHierarchy {
    /// Check if there were any warnings while loading.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Converts backend payloads into canonical trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyLoader {
    default_category: Category,
}

/// One backend record after key normalization.
#[derive(Debug)]
struct RawFolder<'a> {
    id: BackendId,
    parent: Option<BackendId>,
    seed: Seed,
    children: &'a [Value],
}

impl HierarchyLoader {
    /// Create a loader whose model defaults new folders to `default_category`.
    pub fn new(default_category: Category) -> Self {
        Self { default_category }
    }

    /// Parse a raw JSON body and load it.
    pub fn load_str(&self, body: &str) -> Result<LoadedHierarchy, LoadError> {
        let payload: Value =
            serde_json::from_str(body).map_err(|e| LoadError::MalformedHierarchy {
                reason: format!("invalid JSON: {e}"),
            })?;
        self.load(&payload)
    }

    /// Load a payload, falling back to an empty tree plus a warning when the
    /// shape is not recognized.
    pub fn load_or_empty(&self, payload: &Value) -> LoadedHierarchy {
        self.load(payload).unwrap_or_else(|error| {
            tracing::warn!(%error, "hierarchy payload rejected, using empty tree");
            LoadedHierarchy {
                model: TreeModel::with_default_category(self.default_category),
                warnings: vec![LoadWarning::malformed(&error)],
            }
        })
    }

    /// Load a payload into a model, preserving backend ids on every node.
    pub fn load(&self, payload: &Value) -> Result<LoadedHierarchy, LoadError> {
        let records = top_level_records(payload)?;
        let mut loaded = LoadedHierarchy {
            model: TreeModel::with_default_category(self.default_category),
            warnings: Vec::new(),
        };

        let nested = records.iter().any(|record| !nested_children(record).is_empty());
        if nested {
            self.build_nested(&records, &mut loaded)?;
        } else {
            self.build_flat(&records, &mut loaded)?;
        }

        if loaded.has_warnings() {
            tracing::warn!(
                count = loaded.warnings.len(),
                "hierarchy loaded with skipped records"
            );
        }
        tracing::debug!(
            folders = loaded.model.len(),
            nested,
            "hierarchy loaded"
        );
        Ok(loaded)
    }

    fn build_nested(
        &self,
        records: &[&Value],
        loaded: &mut LoadedHierarchy,
    ) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<(Option<NodeId>, &Value)> =
            records.iter().rev().map(|record| (None, *record)).collect();

        while let Some((parent, record)) = stack.pop() {
            let Some(raw) = self.normalize(record, &mut loaded.warnings) else {
                continue;
            };
            if !seen.insert(raw.id.clone()) {
                loaded.warnings.push(duplicate_warning(&raw.id));
                continue;
            }
            let id = loaded
                .model
                .attach(parent, raw.seed)
                .map_err(|e| internal(e.to_string()))?;
            stack.extend(raw.children.iter().rev().map(|child| (Some(id), child)));
        }
        Ok(())
    }

    fn build_flat(&self, records: &[&Value], loaded: &mut LoadedHierarchy) -> Result<(), LoadError> {
        let mut folders: Vec<RawFolder<'_>> = Vec::with_capacity(records.len());
        let mut seen = HashSet::new();
        for record in records {
            let Some(raw) = self.normalize(record, &mut loaded.warnings) else {
                continue;
            };
            if seen.insert(raw.id.clone()) {
                folders.push(raw);
            } else {
                loaded.warnings.push(duplicate_warning(&raw.id));
            }
        }

        let mut by_parent: HashMap<&BackendId, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (index, folder) in folders.iter().enumerate() {
            match &folder.parent {
                Some(parent) if seen.contains(parent) => {
                    by_parent.entry(parent).or_default().push(index)
                }
                _ => roots.push(index),
            }
        }

        let mut placed = vec![false; folders.len()];
        let mut stack: Vec<(Option<NodeId>, usize)> =
            roots.iter().rev().map(|index| (None, *index)).collect();
        while let Some((parent, index)) = stack.pop() {
            if std::mem::replace(&mut placed[index], true) {
                continue;
            }
            let folder = &folders[index];
            let id = loaded
                .model
                .attach(parent, folder.seed.clone())
                .map_err(|e| internal(e.to_string()))?;
            if let Some(children) = by_parent.get(&folder.id) {
                stack.extend(children.iter().rev().map(|child| (Some(id), *child)));
            }
        }

        for (folder, placed) in folders.iter().zip(&placed) {
            if !placed {
                loaded.warnings.push(LoadWarning::new(
                    format!(
                        "Folder '{}' ({}) is not reachable from any root",
                        folder.seed.name, folder.id
                    ),
                    WarningKind::Unreachable,
                ));
            }
        }
        Ok(())
    }

    fn normalize<'a>(
        &self,
        record: &'a Value,
        warnings: &mut Vec<LoadWarning>,
    ) -> Option<RawFolder<'a>> {
        let Some(object) = record.as_object() else {
            warnings.push(LoadWarning::new(
                format!("Skipped non-object folder record: {record}"),
                WarningKind::InvalidRecord,
            ));
            return None;
        };

        let Some(id) = first_key(object, ID_KEYS).and_then(BackendId::from_value) else {
            warnings.push(LoadWarning::new(
                "Skipped folder record without an id",
                WarningKind::InvalidRecord,
            ));
            return None;
        };

        let Some(name) = first_key(object, NAME_KEYS).and_then(Value::as_str) else {
            warnings.push(LoadWarning::new(
                format!("Skipped folder {id} without a name"),
                WarningKind::InvalidRecord,
            ));
            return None;
        };

        let category = match object.get("category").and_then(Value::as_str) {
            None => self.default_category,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warnings.push(LoadWarning::new(
                    format!("Folder {id} has unknown category '{raw}'"),
                    WarningKind::UnknownCategory,
                ));
                self.default_category
            }),
        };

        let (file_count, file_bytes) = match object.get("files").and_then(Value::as_array) {
            Some(files) => (
                files.len() as u64,
                files
                    .iter()
                    .filter_map(|file| file.get("size").and_then(Value::as_u64))
                    .sum(),
            ),
            None => (0, 0),
        };

        Some(RawFolder {
            parent: first_key(object, PARENT_KEYS).and_then(BackendId::from_value),
            children: nested_children(record),
            seed: Seed {
                name: CompactString::from(name),
                category,
                backend_id: Some(id.clone()),
                description: first_key(object, DESCRIPTION_KEYS)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                file_count,
                file_bytes,
            },
            id,
        })
    }
}

/// Locate the top-level folder records in a payload.
fn top_level_records(payload: &Value) -> Result<Vec<&Value>, LoadError> {
    match payload {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(object) => {
            let arrays: Vec<&Vec<Value>> = WRAPPER_KEYS
                .iter()
                .filter_map(|key| object.get(*key).and_then(Value::as_array))
                .collect();
            if let Some(items) = arrays.iter().find(|items| !items.is_empty()) {
                return Ok(items.iter().collect());
            }
            if !arrays.is_empty() {
                return Ok(Vec::new());
            }
            if first_key(object, ID_KEYS).is_some() {
                return Ok(vec![payload]);
            }
            Err(LoadError::MalformedHierarchy {
                reason: format!(
                    "object has none of the keys {}",
                    WRAPPER_KEYS.join(", ")
                ),
            })
        }
        other => Err(LoadError::MalformedHierarchy {
            reason: format!("expected an array or object, got {}", json_kind(other)),
        }),
    }
}

/// First non-empty nested children array of a record.
fn nested_children(record: &Value) -> &[Value] {
    CHILDREN_KEYS
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_array))
        .find(|children| !children.is_empty())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn first_key<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn duplicate_warning(id: &BackendId) -> LoadWarning {
    LoadWarning::new(
        format!("Folder id {id} appears more than once"),
        WarningKind::DuplicateId,
    )
}

fn internal(reason: String) -> LoadError {
    LoadError::MalformedHierarchy { reason }
}
