//! Folder node types.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Surrogate identifier for a node within a [`TreeModel`](crate::TreeModel).
///
/// Assigned when the node enters the model and never reused, so it stays
/// valid across unrelated insertions and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a folder persisted on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(pub String);

impl BackendId {
    /// Create a backend id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id that may be a string, a number or a populated `{ _id }` reference.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::new(s.as_str())),
            Value::Number(n) => Some(Self::new(n.to_string())),
            Value::Object(object) => ["_id", "id"]
                .iter()
                .filter_map(|key| object.get(*key))
                .find(|value| !value.is_null())
                .and_then(Self::from_value),
            _ => None,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Domain classification of a folder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    #[default]
    General,
    Documents,
    Media,
    Projects,
    Archive,
    Personal,
}

/// Owned, recursive form of a folder subtree.
///
/// Used to seed nested creation dialogs, to graft prepared subtrees into a
/// model, and as the payload shape of the backend's bulk-create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Display name.
    pub name: CompactString,
    /// Domain classification.
    pub category: Category,
    /// Backend identity, once persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<BackendId>,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered children.
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create an unpersisted leaf.
    pub fn new(name: impl Into<CompactString>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            backend_id: None,
            description: None,
            children: Vec::new(),
        }
    }

    /// Attach a backend id.
    pub fn with_backend_id(mut self, id: impl Into<BackendId>) -> Self {
        self.backend_id = Some(id.into());
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Whether any node in this subtree carries a backend id.
    pub fn any_persisted(&self) -> bool {
        self.backend_id.is_some() || self.children.iter().any(TreeNode::any_persisted)
    }
}

/// Request to create a node in a [`TreeModel`](crate::TreeModel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFolder {
    /// Display name.
    pub name: CompactString,
    /// Explicit category; inherited from the parent or model default when absent.
    pub category: Option<Category>,
    /// Optional description.
    pub description: Option<String>,
}

impl NewFolder {
    /// A new folder with an inherited category.
    pub fn named(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Override the inherited category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A node stored in the model arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    /// Surrogate id.
    pub id: NodeId,

    /// Display name.
    pub name: CompactString,

    /// Domain classification.
    pub category: Category,

    /// Backend identity, present once persisted.
    pub backend_id: Option<BackendId>,

    /// Name last known to be stored on the backend.
    pub persisted_name: Option<CompactString>,

    /// Optional description.
    pub description: Option<String>,

    /// Parent node, `None` for root-level folders.
    pub parent: Option<NodeId>,

    /// Ordered children.
    pub children: Vec<NodeId>,

    /// Number of files the backend reported for this folder.
    pub file_count: u64,

    /// Total size of those files in bytes.
    pub file_bytes: u64,
}

impl FolderNode {
    /// Whether the folder exists on the backend.
    pub fn is_persisted(&self) -> bool {
        self.backend_id.is_some()
    }

    /// Whether the local name differs from the last persisted one.
    pub fn is_renamed(&self) -> bool {
        self.persisted_name
            .as_ref()
            .is_some_and(|persisted| *persisted != self.name)
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_from_value() {
        use serde_json::json;

        assert_eq!(BackendId::from_value(&json!("a1")), Some(BackendId::from("a1")));
        assert_eq!(BackendId::from_value(&json!(7)), Some(BackendId::from("7")));
        assert_eq!(
            BackendId::from_value(&json!({ "_id": "p", "name": "P" })),
            Some(BackendId::from("p"))
        );
        assert_eq!(BackendId::from_value(&json!("")), None);
        assert_eq!(BackendId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(7).to_string(), "#7");
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("Media".parse::<Category>().unwrap(), Category::Media);
        assert_eq!("ARCHIVE".parse::<Category>().unwrap(), Category::Archive);
        assert!("unknown".parse::<Category>().is_err());
        assert_eq!(Category::Projects.to_string(), "projects");
    }

    #[test]
    fn test_tree_node_counts() {
        let tree = TreeNode::new("A", Category::General)
            .with_child(TreeNode::new("B", Category::General).with_child(TreeNode::new(
                "C",
                Category::General,
            )))
            .with_child(TreeNode::new("D", Category::General));
        assert_eq!(tree.node_count(), 4);
        assert!(!tree.any_persisted());

        let persisted = TreeNode::new("A", Category::General)
            .with_child(TreeNode::new("B", Category::General).with_backend_id("b1"));
        assert!(persisted.any_persisted());
    }

    #[test]
    fn test_renamed_tracking() {
        let mut node = FolderNode {
            id: NodeId::new(1),
            name: "Docs".into(),
            category: Category::Documents,
            backend_id: Some("a".into()),
            persisted_name: Some("Docs".into()),
            description: None,
            parent: None,
            children: Vec::new(),
            file_count: 0,
            file_bytes: 0,
        };
        assert!(!node.is_renamed());
        node.name = "Papers".into();
        assert!(node.is_renamed());
    }
}
