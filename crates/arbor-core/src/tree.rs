//! Arena-backed folder tree.

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::node::{BackendId, Category, FolderNode, NewFolder, NodeId, TreeNode};
use crate::path::PathAddress;
use crate::validate::{is_duplicate, validate_folder_name};

/// Summary statistics for a folder tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total number of folders.
    pub total_folders: usize,
    /// Folders that exist on the backend.
    pub persisted: usize,
    /// Folders created locally and not yet persisted.
    pub pending: usize,
    /// Persisted folders whose local name differs from the stored one.
    pub renamed: usize,
    /// Maximum depth reached (root folders are depth 0).
    pub max_depth: usize,
    /// Files reported by the backend across all folders.
    pub total_files: u64,
    /// Bytes of those files.
    pub total_file_bytes: u64,
}

impl TreeStats {
    /// Whether the tree has anything to reconcile.
    pub fn has_changes(&self) -> bool {
        self.pending > 0 || self.renamed > 0
    }
}

/// Fields for a node attached without validation, as read from the backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct Seed {
    pub name: CompactString,
    pub category: Category,
    pub backend_id: Option<BackendId>,
    pub description: Option<String>,
    pub file_count: u64,
    pub file_bytes: u64,
}

/// An editable folder hierarchy.
///
/// Nodes live in an arena keyed by [`NodeId`]; structure is expressed as
/// parent/children id references and an ordered root array. Every operation
/// validates before mutating, so a failed call leaves the model unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeModel {
    nodes: IndexMap<NodeId, FolderNode>,
    roots: Vec<NodeId>,
    next_id: u64,
    default_category: Category,
}

impl TreeModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty model whose new folders default to `category`.
    pub fn with_default_category(category: Category) -> Self {
        Self {
            default_category: category,
            ..Self::default()
        }
    }

    /// Build a model from owned subtrees, validating every sibling set.
    pub fn from_tree_nodes(
        roots: impl IntoIterator<Item = TreeNode>,
        default_category: Category,
    ) -> Result<Self, TreeError> {
        let mut model = Self::with_default_category(default_category);
        for root in roots {
            model.insert_subtree_under(None, root)?;
        }
        Ok(model)
    }

    /// Category applied to new folders with no explicit choice and no parent.
    pub fn default_category(&self) -> Category {
        self.default_category
    }

    /// Change the creation-time default category.
    pub fn set_default_category(&mut self, category: Category) {
        self.default_category = category;
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the model has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root-level folders in display order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&FolderNode> {
        self.nodes.get(&id)
    }

    /// Look up a node, failing with [`TreeError::NodeNotFound`].
    pub fn get(&self, id: NodeId) -> Result<&FolderNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut FolderNode, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    /// Ordered children of `parent`, or the root array for `None`.
    pub fn children_of(&self, parent: Option<NodeId>) -> Result<&[NodeId], TreeError> {
        match parent {
            None => Ok(&self.roots),
            Some(id) => Ok(&self.get(id)?.children),
        }
    }

    fn children_mut(&mut self, parent: Option<NodeId>) -> Result<&mut Vec<NodeId>, TreeError> {
        match parent {
            None => Ok(&mut self.roots),
            Some(id) => Ok(&mut self.get_mut(id)?.children),
        }
    }

    fn sibling_names(&self, parent: Option<NodeId>) -> Result<Vec<&str>, TreeError> {
        self.children_of(parent)?
            .iter()
            .map(|id| self.get(*id).map(|node| node.name.as_str()))
            .collect()
    }

    /// Node ids in pre-order (parents before children, siblings in order).
    pub fn iter_preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
            Some(id)
        })
    }

    /// `id` and all its descendants in pre-order.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.get(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.get(current)?.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Depth of a node, root folders being depth 0.
    pub fn depth_of(&self, id: NodeId) -> Result<usize, TreeError> {
        let mut depth = 0;
        let mut current = self.get(id)?.parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent)?.parent;
        }
        Ok(depth)
    }

    /// Walk from the root array through `children` at each index.
    pub fn resolve_array(&self, parent_path: &PathAddress) -> Result<&[NodeId], TreeError> {
        let mut current: &[NodeId] = &self.roots;
        for index in parent_path.indices() {
            let id = current
                .get(*index)
                .ok_or_else(|| path_not_found(parent_path))?;
            current = &self.get(*id)?.children;
        }
        Ok(current)
    }

    /// Resolve a path to the node it currently addresses.
    pub fn resolve_node(&self, path: &PathAddress) -> Result<NodeId, TreeError> {
        let (parent_path, index) = path.split_last().ok_or_else(|| path_not_found(path))?;
        self.resolve_array(&parent_path)?
            .get(index)
            .copied()
            .ok_or_else(|| path_not_found(path))
    }

    /// Resolve a parent path to a parent id, the empty path meaning the root array.
    fn resolve_parent(&self, parent_path: &PathAddress) -> Result<Option<NodeId>, TreeError> {
        if parent_path.is_empty() {
            Ok(None)
        } else {
            self.resolve_node(parent_path).map(Some)
        }
    }

    /// Current position of a node.
    pub fn path_of(&self, id: NodeId) -> Result<PathAddress, TreeError> {
        let mut indices = Vec::new();
        let mut current = id;
        loop {
            let parent = self.get(current)?.parent;
            let index = self
                .children_of(parent)?
                .iter()
                .position(|child| *child == current)
                .ok_or(TreeError::NodeNotFound(current))?;
            indices.push(index);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        indices.reverse();
        Ok(PathAddress::new(indices))
    }

    fn check_new_name(
        &self,
        parent: Option<NodeId>,
        name: &str,
        exclude: Option<usize>,
    ) -> Result<(), TreeError> {
        validate_folder_name(name).map_err(|reason| TreeError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        if is_duplicate(name, self.sibling_names(parent)?, exclude) {
            return Err(TreeError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn inherited_category(&self, parent: Option<NodeId>) -> Result<Category, TreeError> {
        match parent {
            Some(id) => Ok(self.get(id)?.category),
            None => Ok(self.default_category),
        }
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn attach(&mut self, parent: Option<NodeId>, seed: Seed) -> Result<NodeId, TreeError> {
        self.children_of(parent)?;
        let id = self.allocate_id();
        let persisted_name = seed.backend_id.as_ref().map(|_| seed.name.clone());
        self.nodes.insert(
            id,
            FolderNode {
                id,
                name: seed.name,
                category: seed.category,
                backend_id: seed.backend_id,
                persisted_name,
                description: seed.description,
                parent,
                children: Vec::new(),
                file_count: seed.file_count,
                file_bytes: seed.file_bytes,
            },
        );
        self.children_mut(parent)?.push(id);
        Ok(id)
    }

    /// Append a new folder under the node at `parent_path` (empty path = root array).
    pub fn insert_child(
        &mut self,
        parent_path: &PathAddress,
        folder: NewFolder,
    ) -> Result<NodeId, TreeError> {
        let parent = self.resolve_parent(parent_path)?;
        self.insert_under(parent, folder)
    }

    /// Append a new folder under `parent` (`None` = root array).
    pub fn insert_under(
        &mut self,
        parent: Option<NodeId>,
        folder: NewFolder,
    ) -> Result<NodeId, TreeError> {
        self.check_new_name(parent, &folder.name, None)?;
        let category = match folder.category {
            Some(category) => category,
            None => self.inherited_category(parent)?,
        };
        self.attach(
            parent,
            Seed {
                name: folder.name,
                category,
                description: folder.description,
                ..Seed::default()
            },
        )
    }

    /// Graft an owned subtree under the node at `parent_path`.
    pub fn insert_subtree(
        &mut self,
        parent_path: &PathAddress,
        subtree: TreeNode,
    ) -> Result<NodeId, TreeError> {
        let parent = self.resolve_parent(parent_path)?;
        self.insert_subtree_under(parent, subtree)
    }

    /// Graft an owned subtree under `parent`, validating every sibling set first.
    pub fn insert_subtree_under(
        &mut self,
        parent: Option<NodeId>,
        subtree: TreeNode,
    ) -> Result<NodeId, TreeError> {
        self.check_new_name(parent, &subtree.name, None)?;
        validate_subtree(&subtree)?;

        let mut pending = vec![(parent, subtree)];
        let mut top = None;
        while let Some((parent, node)) = pending.pop() {
            let TreeNode {
                name,
                category,
                backend_id,
                description,
                children,
            } = node;
            let id = self.attach(
                parent,
                Seed {
                    name,
                    category,
                    backend_id,
                    description,
                    ..Seed::default()
                },
            )?;
            top.get_or_insert(id);
            pending.extend(children.into_iter().rev().map(|child| (Some(id), child)));
        }
        top.ok_or(TreeError::NodeNotFound(NodeId::new(self.next_id)))
    }

    /// Rename the node at `path`.
    pub fn rename_node(&mut self, path: &PathAddress, new_name: &str) -> Result<(), TreeError> {
        let id = self.resolve_node(path)?;
        self.rename(id, new_name)
    }

    /// Rename a node, checking against its siblings but not itself.
    ///
    /// Keeping the current name is always accepted, even if the loaded
    /// siblings already clash with it.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        let node = self.get(id)?;
        if node.name == new_name {
            return Ok(());
        }
        let parent = node.parent;
        let own_index = self.children_of(parent)?.iter().position(|c| *c == id);
        self.check_new_name(parent, new_name, own_index)?;
        self.get_mut(id)?.name = new_name.into();
        Ok(())
    }

    /// Override the category of a single node.
    pub fn set_category(&mut self, id: NodeId, category: Category) -> Result<(), TreeError> {
        self.get_mut(id)?.category = category;
        Ok(())
    }

    /// Record that a node now exists on the backend under `backend_id`.
    pub fn mark_persisted(&mut self, id: NodeId, backend_id: BackendId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        node.backend_id = Some(backend_id);
        node.persisted_name = Some(node.name.clone());
        Ok(())
    }

    /// Record that a node's current name has been stored on the backend.
    pub fn mark_name_persisted(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        node.persisted_name = Some(node.name.clone());
        Ok(())
    }

    /// Remove the node at `path` and its subtree, returning the removed subtree.
    pub fn remove_node(&mut self, path: &PathAddress) -> Result<TreeNode, TreeError> {
        let id = self.resolve_node(path)?;
        self.remove(id)
    }

    /// Remove a node and its subtree. Purely structural: no backend bookkeeping.
    pub fn remove(&mut self, id: NodeId) -> Result<TreeNode, TreeError> {
        let removed = self.subtree(id)?;
        let ids = self.descendants(id)?;
        let parent = self.get(id)?.parent;
        self.children_mut(parent)?.retain(|child| *child != id);
        for id in ids {
            self.nodes.swap_remove(&id);
        }
        Ok(removed)
    }

    /// Remove a single node, lifting its children into its former position.
    ///
    /// Lifted children are not revalidated against their new siblings.
    pub fn dissolve(&mut self, id: NodeId) -> Result<FolderNode, TreeError> {
        let node = self.get(id)?.clone();
        let siblings = self.children_of(node.parent)?;
        let position = siblings
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::NodeNotFound(id))?;

        for child in &node.children {
            let child_name = &self.get(*child)?.name;
            if is_duplicate(child_name, self.sibling_names(node.parent)?, Some(position)) {
                tracing::warn!(
                    folder = %child_name,
                    "lifted folder now shares its name with a sibling"
                );
            }
        }

        for child in &node.children {
            self.get_mut(*child)?.parent = node.parent;
        }
        self.children_mut(node.parent)?
            .splice(position..=position, node.children.iter().copied());
        self.nodes.swap_remove(&id);
        Ok(node)
    }

    /// Owned copy of the node at `path` and its descendants.
    pub fn get_subtree(&self, path: &PathAddress) -> Result<TreeNode, TreeError> {
        self.subtree(self.resolve_node(path)?)
    }

    /// Owned copy of a node and its descendants.
    pub fn subtree(&self, id: NodeId) -> Result<TreeNode, TreeError> {
        let node = self.get(id)?;
        let children = node
            .children
            .iter()
            .map(|child| self.subtree(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TreeNode {
            name: node.name.clone(),
            category: node.category,
            backend_id: node.backend_id.clone(),
            description: node.description.clone(),
            children,
        })
    }

    /// Owned copies of every root subtree.
    pub fn to_tree_nodes(&self) -> Result<Vec<TreeNode>, TreeError> {
        self.roots.iter().map(|id| self.subtree(*id)).collect()
    }

    /// Find a node by its backend id.
    pub fn find_by_backend_id(&self, backend_id: &BackendId) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|node| node.backend_id.as_ref() == Some(backend_id))
            .map(|node| node.id)
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            stats.total_folders += 1;
            stats.max_depth = stats.max_depth.max(depth);
            stats.total_files += node.file_count;
            stats.total_file_bytes += node.file_bytes;
            if node.is_persisted() {
                stats.persisted += 1;
            } else {
                stats.pending += 1;
            }
            if node.is_renamed() {
                stats.renamed += 1;
            }
            stack.extend(node.children.iter().map(|child| (*child, depth + 1)));
        }
        stats
    }
}

fn path_not_found(path: &PathAddress) -> TreeError {
    TreeError::PathNotFound {
        path: path.encode(),
    }
}

fn validate_subtree(node: &TreeNode) -> Result<(), TreeError> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        for (index, child) in current.children.iter().enumerate() {
            validate_folder_name(&child.name).map_err(|reason| TreeError::InvalidName {
                name: child.name.to_string(),
                reason,
            })?;
            let earlier = current.children[..index].iter().map(|c| c.name.as_str());
            if is_duplicate(&child.name, earlier, None) {
                return Err(TreeError::DuplicateName {
                    name: child.name.to_string(),
                });
            }
            stack.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs_model() -> TreeModel {
        let mut model = TreeModel::with_default_category(Category::Documents);
        let docs = model.insert_under(None, NewFolder::named("Docs")).unwrap();
        model.insert_under(Some(docs), NewFolder::named("2024")).unwrap();
        model.insert_under(Some(docs), NewFolder::named("2023")).unwrap();
        model
    }

    #[test]
    fn test_insert_and_resolve_by_path() {
        let mut model = docs_model();
        let id = model
            .insert_child(&PathAddress::from([0]), NewFolder::named("2022"))
            .unwrap();
        assert_eq!(model.resolve_node(&PathAddress::from([0, 2])).unwrap(), id);
        assert_eq!(model.path_of(id).unwrap(), PathAddress::from([0, 2]));
    }

    #[test]
    fn test_duplicate_insert_leaves_model_unchanged() {
        let mut model = docs_model();
        let err = model
            .insert_child(&PathAddress::from([0]), NewFolder::named("2024"))
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateName { .. }));
        assert_eq!(model.resolve_array(&PathAddress::from([0])).unwrap().len(), 2);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_same_name_allowed_in_different_parents() {
        let mut model = docs_model();
        model.insert_child(&PathAddress::root(), NewFolder::named("2024")).unwrap();
        assert_eq!(model.roots().len(), 2);
    }

    #[test]
    fn test_rename_against_self_and_siblings() {
        let mut model = docs_model();
        let path = PathAddress::from([0, 0]);
        model.rename_node(&path, "2024").unwrap();
        model.rename_node(&path, "FY2024").unwrap();
        let err = model.rename_node(&path, "2023").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateName { .. }));
        let id = model.resolve_node(&path).unwrap();
        assert_eq!(model.get(id).unwrap().name, "FY2024");
    }

    #[test]
    fn test_rename_to_current_name_with_loaded_clash() {
        let seed = |name: &str, id: &str| Seed {
            name: name.into(),
            backend_id: Some(id.into()),
            ..Seed::default()
        };
        let mut model = TreeModel::new();
        let upper = model.attach(None, seed("A", "a1")).unwrap();
        let lower = model.attach(None, seed("a", "a2")).unwrap();

        model.rename(upper, "A").unwrap();
        model.rename(lower, "a").unwrap();
        assert!(matches!(
            model.rename(lower, "A").unwrap_err(),
            TreeError::DuplicateName { .. }
        ));
        assert_eq!(model.get(lower).unwrap().name, "a");
    }

    #[test]
    fn test_category_inheritance() {
        let mut model = TreeModel::with_default_category(Category::Projects);
        let root = model.insert_under(None, NewFolder::named("Work")).unwrap();
        assert_eq!(model.get(root).unwrap().category, Category::Projects);

        model.set_category(root, Category::Media).unwrap();
        let child = model.insert_under(Some(root), NewFolder::named("Clips")).unwrap();
        assert_eq!(model.get(child).unwrap().category, Category::Media);

        let explicit = model
            .insert_under(Some(root), NewFolder::named("Notes").with_category(Category::Personal))
            .unwrap();
        assert_eq!(model.get(explicit).unwrap().category, Category::Personal);
    }

    #[test]
    fn test_stale_path_is_not_found() {
        let mut model = docs_model();
        let stale = PathAddress::from([0, 1]);
        model.remove_node(&PathAddress::from([0, 0])).unwrap();
        assert!(model.resolve_node(&stale).is_err());
        let err = model.resolve_array(&PathAddress::from([5])).unwrap_err();
        assert_eq!(err, TreeError::PathNotFound { path: "5".into() });
    }

    #[test]
    fn test_node_ids_survive_sibling_removal() {
        let mut model = docs_model();
        let last = model.resolve_node(&PathAddress::from([0, 1])).unwrap();
        model.remove_node(&PathAddress::from([0, 0])).unwrap();
        assert_eq!(model.path_of(last).unwrap(), PathAddress::from([0, 0]));
        model.rename(last, "Older").unwrap();
        assert_eq!(model.get(last).unwrap().name, "Older");
    }

    #[test]
    fn test_remove_returns_subtree() {
        let mut model = docs_model();
        let removed = model.remove_node(&PathAddress::from([0])).unwrap();
        assert_eq!(removed.name, "Docs");
        assert_eq!(removed.node_count(), 3);
        assert!(model.is_empty());
        assert!(model.roots().is_empty());
    }

    #[test]
    fn test_subtree_graft_validates_before_mutating() {
        let mut model = docs_model();
        let bad = TreeNode::new("Archive", Category::Archive)
            .with_child(TreeNode::new("a", Category::Archive))
            .with_child(TreeNode::new("A", Category::Archive));
        let err = model.insert_subtree(&PathAddress::root(), bad).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateName { .. }));
        assert_eq!(model.len(), 3);

        let seed = model.get_subtree(&PathAddress::from([0])).unwrap();
        let mut copy = seed.clone();
        copy.name = "Docs copy".into();
        let id = model.insert_subtree(&PathAddress::root(), copy).unwrap();
        assert_eq!(model.subtree(id).unwrap().children, seed.children);
        assert_eq!(model.len(), 6);
    }

    #[test]
    fn test_dissolve_lifts_children_in_place() {
        let mut model = TreeModel::new();
        let a = model.insert_under(None, NewFolder::named("A")).unwrap();
        let b = model.insert_under(None, NewFolder::named("B")).unwrap();
        let c = model.insert_under(None, NewFolder::named("C")).unwrap();
        let b1 = model.insert_under(Some(b), NewFolder::named("B1")).unwrap();
        let b2 = model.insert_under(Some(b), NewFolder::named("B2")).unwrap();

        model.dissolve(b).unwrap();
        assert_eq!(model.roots(), &[a, b1, b2, c]);
        assert_eq!(model.get(b1).unwrap().parent, None);
        assert!(model.node(b).is_none());
    }

    #[test]
    fn test_preorder_and_stats() {
        let mut model = docs_model();
        let docs = model.roots()[0];
        model.mark_persisted(docs, "d1".into()).unwrap();
        model.rename(docs, "Documents").unwrap();

        let names: Vec<_> = model
            .iter_preorder()
            .map(|id| model.get(id).unwrap().name.to_string())
            .collect();
        assert_eq!(names, ["Documents", "2024", "2023"]);

        let stats = model.stats();
        assert_eq!(stats.total_folders, 3);
        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.renamed, 1);
        assert_eq!(stats.max_depth, 1);
        assert!(stats.has_changes());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut model = TreeModel::new();
        let err = model.insert_under(None, NewFolder::named("a/b")).unwrap_err();
        assert!(matches!(err, TreeError::InvalidName { .. }));
        assert!(model.is_empty());
    }
}
