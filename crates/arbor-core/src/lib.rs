//! Core types for arbor.
//!
//! This crate provides the in-memory folder hierarchy used throughout arbor:
//! the arena-backed [`TreeModel`], position-based [`PathAddress`] locators,
//! sibling name validation, the pre-order [`flatten`] used for bulk
//! selection, and the [`HierarchyLoader`] that normalizes backend payloads.

mod config;
mod error;
mod flatten;
mod loader;
mod node;
mod path;
mod tree;
mod validate;

pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{LoadError, LoadWarning, TreeError, WarningKind};
pub use flatten::{FlattenedNode, flatten, flatten_subtree};
pub use loader::{HierarchyLoader, LoadedHierarchy};
pub use node::{BackendId, Category, FolderNode, NewFolder, NodeId, TreeNode};
pub use path::PathAddress;
pub use tree::{TreeModel, TreeStats};
pub use validate::{is_duplicate, validate_folder_name};
