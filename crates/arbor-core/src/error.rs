//! Error types for tree editing and hierarchy loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::NodeId;

/// Errors raised by [`TreeModel`](crate::TreeModel) and [`PathAddress`](crate::PathAddress).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A serialized path contained a segment that is not a non-negative integer.
    #[error("Malformed path '{input}': segment '{segment}' is not an index")]
    MalformedPath { input: String, segment: String },

    /// A path index was out of range at some depth.
    #[error("No node at path '{path}'")]
    PathNotFound { path: String },

    /// An operation referenced a node id that is not in the model.
    #[error("Unknown node {0}")]
    NodeNotFound(NodeId),

    /// A sibling with the same name (case-insensitive) already exists.
    #[error("A folder named '{name}' already exists here")]
    DuplicateName { name: String },

    /// The name is not acceptable as a folder name.
    #[error("Invalid folder name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl TreeError {
    /// Whether the error should be shown to the user rather than treated as a bug signal.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::DuplicateName { .. } | Self::InvalidName { .. })
    }
}

/// Errors that can occur while loading a backend hierarchy payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The payload was neither an array nor an object with a known key.
    #[error("Malformed hierarchy payload: {reason}")]
    MalformedHierarchy { reason: String },
}

/// Kind of load warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// The whole payload was unusable and an empty tree was substituted.
    MalformedPayload,
    /// A record was skipped because it lacked an id or a name.
    InvalidRecord,
    /// A record id appeared more than once.
    DuplicateId,
    /// A record could not be reached from any root (parent cycle).
    Unreachable,
    /// A category value was not recognized.
    UnknownCategory,
}

/// Non-fatal problem encountered while loading a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadWarning {
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl LoadWarning {
    /// Create a new load warning.
    pub fn new(message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Warning for a payload replaced by an empty tree.
    pub fn malformed(error: &LoadError) -> Self {
        Self::new(
            format!("{error}; showing an empty folder list"),
            WarningKind::MalformedPayload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(TreeError::DuplicateName { name: "a".into() }.is_user_facing());
        assert!(
            !TreeError::PathNotFound {
                path: "0-1".into()
            }
            .is_user_facing()
        );
    }

    #[test]
    fn test_malformed_warning_message() {
        let err = LoadError::MalformedHierarchy {
            reason: "expected array".into(),
        };
        let warning = LoadWarning::malformed(&err);
        assert_eq!(warning.kind, WarningKind::MalformedPayload);
        assert!(warning.message.contains("expected array"));
    }
}
