//! Pre-order flattening for bulk selection and ordered deletion.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::node::{BackendId, NodeId};
use crate::path::PathAddress;
use crate::tree::TreeModel;

/// A node annotated with its depth and current path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedNode {
    pub id: NodeId,
    pub name: CompactString,
    pub backend_id: Option<BackendId>,
    /// Root folders are depth 0.
    pub depth: usize,
    pub path: PathAddress,
    pub child_count: usize,
}

/// Flatten the whole model in pre-order.
pub fn flatten(model: &TreeModel) -> Vec<FlattenedNode> {
    let start = model
        .roots()
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| (*id, PathAddress::root().child(index)))
        .collect();
    walk(model, start)
}

/// Flatten `id` and its descendants in pre-order, with absolute depths and paths.
pub fn flatten_subtree(model: &TreeModel, id: NodeId) -> Result<Vec<FlattenedNode>, TreeError> {
    let path = model.path_of(id)?;
    Ok(walk(model, vec![(id, path)]))
}

fn walk(model: &TreeModel, mut stack: Vec<(NodeId, PathAddress)>) -> Vec<FlattenedNode> {
    let mut out = Vec::with_capacity(model.len());
    while let Some((id, path)) = stack.pop() {
        let Some(node) = model.node(id) else {
            continue;
        };
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(index, child)| (*child, path.child(index))),
        );
        out.push(FlattenedNode {
            id,
            name: node.name.clone(),
            backend_id: node.backend_id.clone(),
            depth: path.depth().unwrap_or_default(),
            path,
            child_count: node.children.len(),
        });
    }
    out
}
