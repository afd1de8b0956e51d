//! The folder backend contract and its wire types.

use arbor_core::{BackendId, Category, TreeNode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a [`FolderBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The referenced folder does not exist.
    #[error("Folder {0} not found")]
    NotFound(BackendId),

    /// The folder still has subfolders and the backend refuses to orphan them.
    #[error("Folder {0} still has subfolders")]
    HasChildren(BackendId),

    /// The backend rejected the call for another reason.
    #[error("{0}")]
    Rejected(String),
}

/// A file attached to a folder, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(alias = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(
        rename = "uploadedAt",
        alias = "uploaded_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// A file known only by its id, as in unpopulated `files` arrays.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: String::new(),
            size: 0,
            uploaded_at: None,
        }
    }
}

/// One folder in the backend's flat collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    #[serde(alias = "_id", deserialize_with = "backend_id")]
    pub id: BackendId,
    pub name: String,
    /// Raw category value; unknown values are tolerated here and resolved by the loader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(
        rename = "parentFolder",
        alias = "parent_folder",
        default,
        deserialize_with = "parent_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_folder: Option<BackendId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "file_entries",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub files: Vec<FileRecord>,
    /// Echo of created descendants, only present on nested-create responses.
    #[serde(default, alias = "subcarpetas", skip_serializing_if = "Vec::is_empty")]
    pub subfolders: Vec<FolderRecord>,
}

impl FolderRecord {
    /// Create a bare record.
    pub fn new(id: impl Into<BackendId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            parent_folder: None,
            description: None,
            files: Vec::new(),
            subfolders: Vec::new(),
        }
    }

    /// Set the parent pointer.
    pub fn with_parent(mut self, parent: impl Into<BackendId>) -> Self {
        self.parent_folder = Some(parent.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Decode a create/update response, which may wrap the record in a
    /// `folder` or `data` key.
    pub fn from_response(body: Value) -> Result<Self, BackendError> {
        let body = match body {
            Value::Object(mut object) if !object.contains_key("name") => {
                match ["folder", "carpeta", "data"]
                    .iter()
                    .find_map(|key| object.remove(*key))
                {
                    Some(inner) => inner,
                    None => Value::Object(object),
                }
            }
            other => other,
        };
        Ok(serde_json::from_value(body)?)
    }
}

/// Folder id given as a string, a number or a populated `{ _id }` object.
fn backend_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BackendId, D::Error> {
    let value = Value::deserialize(deserializer)?;
    BackendId::from_value(&value)
        .ok_or_else(|| de::Error::custom(format!("expected a folder id, got {value}")))
}

/// Parent pointer in any id shape; `null` and unusable values mean no parent.
fn parent_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BackendId>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(BackendId::from_value(&value))
}

/// `files` entries, either populated records or bare file ids.
fn file_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FileRecord>, D::Error> {
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(_) => match serde_json::from_value::<FileRecord>(entry) {
                Ok(file) => Some(file),
                Err(error) => {
                    tracing::warn!(%error, "ignoring unreadable file entry");
                    None
                }
            },
            other => BackendId::from_value(&other).map(|id| FileRecord::from_id(id.0)),
        })
        .collect())
}

/// Body of `POST folder/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub category: Category,
    #[serde(rename = "parentFolder", skip_serializing_if = "Option::is_none")]
    pub parent_folder: Option<BackendId>,
}

/// Body of `PUT folder/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFolderRequest {
    pub name: String,
}

/// Body of `POST folder/create-nested`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedFolderRequest {
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subfolders: Vec<NestedFolderRequest>,
}

impl From<&TreeNode> for NestedFolderRequest {
    fn from(node: &TreeNode) -> Self {
        Self {
            name: node.name.to_string(),
            category: node.category,
            description: node.description.clone(),
            subfolders: node.children.iter().map(Self::from).collect(),
        }
    }
}

/// The flat, parent-pointer folder store that trees are reconciled against.
///
/// Calls made on behalf of one tree are always awaited one at a time, so
/// implementations do not need to order concurrent writes.
#[async_trait]
pub trait FolderBackend: Send + Sync {
    /// Fetch the whole hierarchy as a raw payload for the loader.
    async fn hierarchy(&self) -> Result<Value, BackendError>;

    /// Fetch the descendants of one folder as a raw payload for the loader.
    async fn subfolders(&self, folder: &BackendId) -> Result<Value, BackendError>;

    /// Create a single folder.
    async fn create_folder(
        &self,
        request: &CreateFolderRequest,
    ) -> Result<FolderRecord, BackendError>;

    /// Rename an existing folder. Any response body is ignored.
    async fn update_folder(
        &self,
        folder: &BackendId,
        request: &UpdateFolderRequest,
    ) -> Result<(), BackendError>;

    /// Delete a single folder.
    async fn delete_folder(&self, folder: &BackendId) -> Result<(), BackendError>;

    /// Create a brand-new tree in one call.
    async fn create_nested(
        &self,
        request: &NestedFolderRequest,
    ) -> Result<FolderRecord, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_accepts_both_id_keys() {
        let a: FolderRecord = serde_json::from_value(json!({ "_id": "x", "name": "A" })).unwrap();
        let b: FolderRecord = serde_json::from_value(json!({ "id": "x", "name": "A" })).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_response_unwraps() {
        let wrapped = json!({ "message": "ok", "folder": { "_id": "f1", "name": "Docs" } });
        let record = FolderRecord::from_response(wrapped).unwrap();
        assert_eq!(record.id.as_str(), "f1");

        let bare = FolderRecord::from_response(json!({ "id": "f2", "name": "Docs" })).unwrap();
        assert_eq!(bare.id.as_str(), "f2");

        assert!(FolderRecord::from_response(json!({ "ok": true })).is_err());
    }

    #[test]
    fn test_from_response_accepts_populated_parent() {
        let record = FolderRecord::from_response(json!({
            "_id": "f1", "name": "A", "parentFolder": { "_id": "p", "name": "P" }
        }))
        .unwrap();
        assert_eq!(record.id.as_str(), "f1");
        assert_eq!(record.parent_folder, Some(BackendId::from("p")));

        let orphan =
            FolderRecord::from_response(json!({ "_id": "f2", "name": "B", "parentFolder": null }))
                .unwrap();
        assert_eq!(orphan.parent_folder, None);
    }

    #[test]
    fn test_from_response_accepts_numeric_id() {
        let record = FolderRecord::from_response(json!({ "id": 7, "name": "A" })).unwrap();
        assert_eq!(record.id, BackendId::from("7"));

        assert!(FolderRecord::from_response(json!({ "id": [], "name": "A" })).is_err());
    }

    #[test]
    fn test_from_response_accepts_bare_file_ids() {
        let record = FolderRecord::from_response(json!({
            "_id": "f1",
            "name": "A",
            "files": ["65ab01", { "_id": "65ab02", "name": "b.pdf", "size": 3 }]
        }))
        .unwrap();
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0], FileRecord::from_id("65ab01"));
        assert_eq!(record.files[1].size, 3);
    }

    #[test]
    fn test_nested_echo_uses_lenient_ids() {
        let record = FolderRecord::from_response(json!({
            "folder": {
                "_id": "r", "name": "Work",
                "subcarpetas": [{ "_id": 12, "name": "Specs", "parentFolder": { "_id": "r" } }]
            }
        }))
        .unwrap();
        assert_eq!(record.subfolders[0].id, BackendId::from("12"));
        assert_eq!(record.subfolders[0].parent_folder, Some(BackendId::from("r")));
    }

    #[test]
    fn test_create_request_wire_names() {
        let request = CreateFolderRequest {
            name: "2024".into(),
            category: Category::Documents,
            parent_folder: Some(BackendId::from("p")),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "name": "2024", "category": "documents", "parentFolder": "p" })
        );

        let root = CreateFolderRequest {
            parent_folder: None,
            ..request
        };
        assert!(serde_json::to_value(&root).unwrap().get("parentFolder").is_none());
    }

    #[test]
    fn test_nested_request_from_tree() {
        let tree = TreeNode::new("Work", Category::Projects)
            .with_child(TreeNode::new("Specs", Category::Documents));
        let request = NestedFolderRequest::from(&tree);
        assert_eq!(request.subfolders.len(), 1);
        assert_eq!(request.subfolders[0].category, Category::Documents);
    }

    #[test]
    fn test_file_timestamps() {
        let file: FileRecord = serde_json::from_value(json!({
            "name": "a.pdf", "size": 12, "uploadedAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(file.uploaded_at.is_some());
    }
}
