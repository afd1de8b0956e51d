//! Cascading deletion.

use std::collections::HashSet;
use std::sync::Arc;

use arbor_core::{BackendId, NodeId, TreeError, TreeModel, flatten, flatten_subtree};
use compact_str::CompactString;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::OPERATION_CHANNEL_SIZE;
use crate::backend::{BackendError, FolderBackend};
use crate::progress::{OperationComplete, OperationError, OperationProgress, OperationType};

/// Which folders a deletion removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePolicy {
    /// The folder and its entire subtree.
    Subtree(NodeId),
    /// Only the folder; its children move up to the folder's parent.
    NodeOnly(NodeId),
    /// An explicit selection, each deleted on its own.
    Selected(Vec<NodeId>),
}

/// One folder scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTarget {
    pub id: NodeId,
    pub name: CompactString,
    /// `None` for folders that only exist locally.
    pub backend_id: Option<BackendId>,
    pub depth: usize,
}

/// Summary of an executed plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Targets removed, in execution order.
    pub deleted: Vec<NodeId>,
    /// How many of them needed a backend call.
    pub remote: usize,
}

impl DeletionReport {
    /// Convert into a completion summary.
    pub fn into_complete(self) -> OperationComplete {
        OperationComplete {
            operation_type: OperationType::Delete,
            succeeded: self.deleted.len(),
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }
}

/// Errors raised while executing a deletion.
#[derive(Debug, Error)]
pub enum DeletionError {
    /// A delete call failed. Targets before it were deleted.
    #[error("Could not delete folder '{name}': {source}")]
    Backend {
        node: NodeId,
        name: String,
        report: DeletionReport,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl DeletionError {
    /// Targets that were deleted before the failure.
    pub fn deleted(&self) -> &[NodeId] {
        match self {
            Self::Backend { report, .. } => &report.deleted,
            Self::Tree(_) => &[],
        }
    }

    /// Convert into a completion summary.
    pub fn to_complete(&self) -> OperationComplete {
        let errors = match self {
            Self::Backend { node, name, source, .. } => {
                vec![OperationError::new(*node, name.clone(), source.to_string())]
            }
            Self::Tree(_) => Vec::new(),
        };
        OperationComplete {
            operation_type: OperationType::Delete,
            succeeded: self.deleted().len(),
            failed: 1,
            skipped: 0,
            errors,
        }
    }
}

/// Result sent through the channel during a background deletion.
#[derive(Debug)]
pub enum DeletionEvent {
    /// Progress update.
    Progress(OperationProgress),
    /// The deletion finished.
    Complete(Result<DeletionReport, DeletionError>),
}

/// Deletion targets in execution order: deepest first, so children are
/// always deleted before their parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    policy: DeletePolicy,
    targets: Vec<DeletionTarget>,
}

impl DeletionPlan {
    /// Plan a deletion against the current model.
    pub fn build(model: &TreeModel, policy: DeletePolicy) -> Result<Self, TreeError> {
        let flat = match &policy {
            DeletePolicy::Subtree(id) => flatten_subtree(model, *id)?,
            DeletePolicy::NodeOnly(id) => {
                let mut flat = flatten_subtree(model, *id)?;
                flat.truncate(1);
                flat
            }
            DeletePolicy::Selected(ids) => {
                for id in ids {
                    model.get(*id)?;
                }
                let selected: HashSet<NodeId> = ids.iter().copied().collect();
                flatten(model)
                    .into_iter()
                    .filter(|node| selected.contains(&node.id))
                    .collect()
            }
        };

        let targets = flat
            .into_iter()
            .rev()
            .map(|node| DeletionTarget {
                id: node.id,
                name: node.name,
                backend_id: node.backend_id,
                depth: node.depth,
            })
            .collect();
        Ok(Self { policy, targets })
    }

    pub fn policy(&self) -> &DeletePolicy {
        &self.policy
    }

    /// Targets in execution order.
    pub fn targets(&self) -> &[DeletionTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of targets that exist on the backend.
    pub fn remote_count(&self) -> usize {
        self.targets
            .iter()
            .filter(|target| target.backend_id.is_some())
            .count()
    }

    /// Delete every target in order, stopping at the first failure.
    ///
    /// Folders that were never persisted need no backend call.
    pub async fn execute<B: FolderBackend + ?Sized>(
        &self,
        backend: &B,
    ) -> Result<DeletionReport, DeletionError> {
        self.execute_with(backend, None).await
    }

    async fn execute_with<B: FolderBackend + ?Sized>(
        &self,
        backend: &B,
        tx: Option<&mpsc::Sender<DeletionEvent>>,
    ) -> Result<DeletionReport, DeletionError> {
        let mut report = DeletionReport::default();
        let mut progress = OperationProgress::new(OperationType::Delete, self.targets.len());

        for target in &self.targets {
            if let Some(tx) = tx {
                progress.set_current(Some(target.name.to_string()));
                let _ = tx.send(DeletionEvent::Progress(progress.clone())).await;
            }

            if let Some(backend_id) = &target.backend_id {
                tracing::debug!(folder = %target.name, id = %backend_id, "deleting folder");
                if let Err(source) = backend.delete_folder(backend_id).await {
                    return Err(DeletionError::Backend {
                        node: target.id,
                        name: target.name.to_string(),
                        report,
                        source,
                    });
                }
                report.remote += 1;
            }
            report.deleted.push(target.id);
            progress.complete_item();
        }

        tracing::info!(
            deleted = report.deleted.len(),
            remote = report.remote,
            "deletion complete"
        );
        Ok(report)
    }

    /// Mirror deleted targets onto the model.
    ///
    /// `NodeOnly` lifts the folder's children into its place; other policies
    /// remove the folder with whatever remains beneath it locally.
    pub fn apply_to_model(&self, model: &mut TreeModel, deleted: &[NodeId]) -> Result<(), TreeError> {
        for id in deleted {
            if model.node(*id).is_none() {
                continue;
            }
            match self.policy {
                DeletePolicy::NodeOnly(_) => {
                    model.dissolve(*id)?;
                }
                DeletePolicy::Subtree(_) | DeletePolicy::Selected(_) => {
                    model.remove(*id)?;
                }
            }
        }
        Ok(())
    }
}

/// Start background deletion of a plan.
///
/// Returns a receiver for progress updates, ending with
/// [`DeletionEvent::Complete`].
pub fn start_deletion<B>(backend: Arc<B>, plan: DeletionPlan) -> mpsc::Receiver<DeletionEvent>
where
    B: FolderBackend + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let result = plan.execute_with(backend.as_ref(), Some(&tx)).await;
        let _ = tx.send(DeletionEvent::Complete(result)).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BackendCall, MemoryBackend};
    use arbor_core::NewFolder;

    /// `A > [B > C, D]`, with only `A` and `B` persisted.
    fn model() -> (TreeModel, [NodeId; 4]) {
        let mut model = TreeModel::new();
        let a = model.insert_under(None, NewFolder::named("A")).unwrap();
        let b = model.insert_under(Some(a), NewFolder::named("B")).unwrap();
        let c = model.insert_under(Some(b), NewFolder::named("C")).unwrap();
        let d = model.insert_under(Some(a), NewFolder::named("D")).unwrap();
        model.mark_persisted(a, BackendId::from("a")).unwrap();
        model.mark_persisted(b, BackendId::from("b")).unwrap();
        (model, [a, b, c, d])
    }

    fn names(plan: &DeletionPlan) -> Vec<&str> {
        plan.targets().iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_subtree_is_deepest_first() {
        let (model, [a, ..]) = model();
        let plan = DeletionPlan::build(&model, DeletePolicy::Subtree(a)).unwrap();
        assert_eq!(names(&plan), ["D", "C", "B", "A"]);
        assert_eq!(plan.remote_count(), 2);
    }

    #[test]
    fn test_node_only_targets_one() {
        let (model, [_, b, ..]) = model();
        let plan = DeletionPlan::build(&model, DeletePolicy::NodeOnly(b)).unwrap();
        assert_eq!(names(&plan), ["B"]);
    }

    #[test]
    fn test_selected_in_reverse_preorder() {
        let (model, [a, _, c, d]) = model();
        let plan = DeletionPlan::build(&model, DeletePolicy::Selected(vec![a, d, c])).unwrap();
        assert_eq!(names(&plan), ["D", "C", "A"]);

        let err = DeletionPlan::build(&model, DeletePolicy::Selected(vec![NodeId::new(99)]));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_local_targets_skip_backend() {
        let (mut model, [_, _, c, _]) = model();
        let backend = MemoryBackend::new();
        let plan = DeletionPlan::build(&model, DeletePolicy::Subtree(c)).unwrap();

        let report = plan.execute(&backend).await.unwrap();
        assert_eq!(report.remote, 0);
        assert!(backend.calls().await.is_empty());

        plan.apply_to_model(&mut model, &report.deleted).unwrap();
        assert_eq!(model.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_stops_execution() {
        let (model, [a, ..]) = model();
        let backend = MemoryBackend::with_records(vec![
            crate::FolderRecord::new("a", "A"),
            crate::FolderRecord::new("b", "B").with_parent("a"),
        ]);
        backend
            .fail_when(|call| *call == BackendCall::Delete(BackendId::from("b")))
            .await;

        let plan = DeletionPlan::build(&model, DeletePolicy::Subtree(a)).unwrap();
        let err = plan.execute(&backend).await.unwrap_err();
        assert_eq!(err.deleted().len(), 2);
        assert_eq!(err.to_complete().summary(), "Deleted 2 folders, 1 failed");
        assert_eq!(backend.records().await.len(), 2);
    }
}
