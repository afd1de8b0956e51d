//! Position-based node addressing.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TreeError;

/// Separator between indices in the serialized form.
pub const PATH_SEPARATOR: &str = "-";

/// Sequence of sibling-array indices from the root array down to a node.
///
/// Paths are positions, not identities: they are only meaningful against the
/// model snapshot they were computed from. Use [`NodeId`](crate::NodeId) for
/// anything held across mutations and [`TreeModel::path_of`](crate::TreeModel::path_of)
/// to recompute a current path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathAddress(Vec<usize>);

impl PathAddress {
    /// The empty path, addressing the root array.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from indices.
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Serialize as a delimited string, e.g. `[2, 0, 1]` => `"2-0-1"`.
    pub fn encode(&self) -> String {
        self.0.iter().join(PATH_SEPARATOR)
    }

    /// Parse a delimited string. The empty string decodes to the root path.
    pub fn decode(input: &str) -> Result<Self, TreeError> {
        if input.is_empty() {
            return Ok(Self::root());
        }

        input
            .split(PATH_SEPARATOR)
            .map(|segment| {
                segment
                    .parse::<usize>()
                    .map_err(|_| TreeError::MalformedPath {
                        input: input.to_string(),
                        segment: segment.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Indices from the root down.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of levels below the root array.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Depth of the addressed node (root children are depth 0).
    pub fn depth(&self) -> Option<usize> {
        self.0.len().checked_sub(1)
    }

    /// Split into the parent path and the index within the parent's children.
    pub fn split_last(&self) -> Option<(PathAddress, usize)> {
        self.0
            .split_last()
            .map(|(last, parent)| (Self(parent.to_vec()), *last))
    }

    /// Path of the parent, `None` for the root path.
    pub fn parent(&self) -> Option<PathAddress> {
        self.split_last().map(|(parent, _)| parent)
    }

    /// Path of the child at `index`.
    pub fn child(&self, index: usize) -> PathAddress {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &PathAddress) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PathAddress {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl From<Vec<usize>> for PathAddress {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl<const N: usize> From<[usize; N]> for PathAddress {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl Serialize for PathAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PathAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let path = PathAddress::from([2, 0, 1]);
        assert_eq!(path.encode(), "2-0-1");
        assert_eq!(PathAddress::decode("2-0-1").unwrap(), path);
    }

    #[test]
    fn test_root_path() {
        assert_eq!(PathAddress::root().encode(), "");
        assert!(PathAddress::decode("").unwrap().is_empty());
        assert_eq!(PathAddress::root().depth(), None);
    }

    #[test]
    fn test_decode_rejects_bad_segments() {
        for input in ["a", "1-b", "1--2", "-1", "1-", " 1"] {
            let err = PathAddress::decode(input).unwrap_err();
            assert!(matches!(err, TreeError::MalformedPath { .. }), "{input}");
        }
    }

    #[test]
    fn test_split_and_child() {
        let path = PathAddress::from([3, 1]);
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent, PathAddress::from([3]));
        assert_eq!(last, 1);
        assert_eq!(parent.child(1), path);
        assert!(parent.is_ancestor_of(&path));
        assert!(!path.is_ancestor_of(&path));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&PathAddress::from([0, 4])).unwrap();
        assert_eq!(json, "\"0-4\"");
        let back: PathAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PathAddress::from([0, 4]));
    }
}
