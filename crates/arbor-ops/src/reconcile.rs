//! Reconciliation of an edited tree against the flat backend.

use std::sync::Arc;

use arbor_core::{BackendId, ClientConfig, NodeId, TreeError, TreeModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::OPERATION_CHANNEL_SIZE;
use crate::backend::{
    BackendError, CreateFolderRequest, FolderBackend, NestedFolderRequest, UpdateFolderRequest,
};
use crate::progress::{OperationComplete, OperationError, OperationProgress, OperationType};

/// Options controlling a reconciliation walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Skip the update call for persisted folders whose name is unchanged.
    pub skip_unchanged_updates: bool,
}

impl From<&ClientConfig> for ReconcileOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            skip_unchanged_updates: config.skip_unchanged_updates,
        }
    }
}

/// Counts of the backend calls a walk made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ReconcileReport {
    /// Number of folders visited.
    pub fn visited(&self) -> usize {
        self.created + self.updated + self.skipped
    }

    /// Convert into a completion summary.
    pub fn into_complete(self, operation_type: OperationType) -> OperationComplete {
        OperationComplete {
            operation_type,
            succeeded: self.created + self.updated,
            failed: 0,
            skipped: self.skipped,
            errors: Vec::new(),
        }
    }
}

/// Errors raised while saving a tree.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A create or update call failed. Folders processed before it stay
    /// persisted and keep their backend ids in the model.
    #[error("Could not save folder '{name}': {source}")]
    Backend {
        node: NodeId,
        name: String,
        report: ReconcileReport,
        #[source]
        source: BackendError,
    },

    /// The bulk-create shortcut does not apply to this model.
    #[error("Nested creation not possible: {reason}")]
    NestedRejected { reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ReconcileError {
    /// Progress made before the failure, if any.
    pub fn partial_report(&self) -> Option<&ReconcileReport> {
        match self {
            Self::Backend { report, .. } => Some(report),
            _ => None,
        }
    }

    /// Convert into a completion summary.
    pub fn to_complete(&self) -> OperationComplete {
        let report = self.partial_report().cloned().unwrap_or_default();
        let errors = match self {
            Self::Backend { node, name, source, .. } => {
                vec![OperationError::new(*node, name.clone(), source.to_string())]
            }
            _ => Vec::new(),
        };
        OperationComplete {
            operation_type: OperationType::Reconcile,
            succeeded: report.created + report.updated,
            failed: 1,
            skipped: report.skipped,
            errors,
        }
    }
}

/// Result sent through the channel during a background reconciliation.
#[derive(Debug)]
pub enum ReconcileEvent {
    /// Progress update.
    Progress(OperationProgress),
    /// The walk finished. The model carries every backend id assigned, even on failure.
    Complete {
        model: Box<TreeModel>,
        result: Result<ReconcileReport, ReconcileError>,
    },
}

/// Makes the backend's flat collection match a [`TreeModel`].
///
/// The walk is pre-order: a folder is created or updated before any of its
/// children are visited, so a child is never created before its parent's
/// backend id is known. Calls are awaited one at a time and the walk stops
/// at the first failure without rolling anything back.
pub struct Reconciler<'a, B: FolderBackend + ?Sized> {
    backend: &'a B,
    options: ReconcileOptions,
}

impl<'a, B: FolderBackend + ?Sized> Reconciler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Reconcile every root of `model`.
    ///
    /// `parent` is the backend folder the roots live under: the folder being
    /// edited, or `None` for new top-level folders.
    pub async fn run(
        &self,
        model: &mut TreeModel,
        parent: Option<&BackendId>,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.walk(model, parent, None).await
    }

    async fn walk(
        &self,
        model: &mut TreeModel,
        parent: Option<&BackendId>,
        tx: Option<&mpsc::Sender<ReconcileEvent>>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        let mut progress = OperationProgress::new(OperationType::Reconcile, model.len());
        let mut stack: Vec<(NodeId, Option<BackendId>)> = model
            .roots()
            .iter()
            .rev()
            .map(|id| (*id, parent.cloned()))
            .collect();

        while let Some((id, parent_backend)) = stack.pop() {
            let (name, category, existing, renamed) = {
                let node = model.get(id)?;
                (
                    node.name.to_string(),
                    node.category,
                    node.backend_id.clone(),
                    node.is_renamed(),
                )
            };

            if let Some(tx) = tx {
                progress.set_current(Some(name.clone()));
                let _ = tx.send(ReconcileEvent::Progress(progress.clone())).await;
            }

            let fail = |report: &ReconcileReport, source: BackendError| ReconcileError::Backend {
                node: id,
                name: name.clone(),
                report: report.clone(),
                source,
            };

            let backend_id = match existing {
                None => {
                    let request = CreateFolderRequest {
                        name: name.clone(),
                        category,
                        parent_folder: parent_backend,
                    };
                    tracing::debug!(folder = %name, parent = ?request.parent_folder, "creating folder");
                    let record = self
                        .backend
                        .create_folder(&request)
                        .await
                        .map_err(|source| fail(&report, source))?;
                    model.mark_persisted(id, record.id.clone())?;
                    report.created += 1;
                    record.id
                }
                Some(backend_id) if self.options.skip_unchanged_updates && !renamed => {
                    report.skipped += 1;
                    backend_id
                }
                Some(backend_id) => {
                    tracing::debug!(folder = %name, id = %backend_id, "updating folder");
                    self.backend
                        .update_folder(&backend_id, &UpdateFolderRequest { name: name.clone() })
                        .await
                        .map_err(|source| fail(&report, source))?;
                    model.mark_name_persisted(id)?;
                    report.updated += 1;
                    backend_id
                }
            };
            progress.complete_item();

            let children = &model.get(id)?.children;
            stack.extend(
                children
                    .iter()
                    .rev()
                    .map(|child| (*child, Some(backend_id.clone()))),
            );
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "reconciled tree"
        );
        Ok(report)
    }
}

/// Start a reconciliation on a background task.
///
/// Progress is streamed over the returned channel; the final
/// [`ReconcileEvent::Complete`] hands the model back so a failed save can be
/// retried on the same instance.
pub fn start_reconcile<B>(
    backend: Arc<B>,
    model: TreeModel,
    parent: Option<BackendId>,
    options: ReconcileOptions,
) -> mpsc::Receiver<ReconcileEvent>
where
    B: FolderBackend + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let mut model = model;
        let result = Reconciler::new(backend.as_ref())
            .with_options(options)
            .walk(&mut model, parent.as_ref(), Some(&tx))
            .await;
        let _ = tx
            .send(ReconcileEvent::Complete {
                model: Box::new(model),
                result,
            })
            .await;
    });

    rx
}

/// Create a brand-new single-root tree with one bulk call.
///
/// Only applies when nothing in `model` is persisted yet. Backend ids echoed
/// in the response are written back onto matching nodes; descendants the
/// backend did not echo stay unpersisted and will be created by a later
/// [`Reconciler::run`].
pub async fn create_nested<B: FolderBackend + ?Sized>(
    backend: &B,
    model: &mut TreeModel,
) -> Result<ReconcileReport, ReconcileError> {
    let root = match model.roots() {
        [root] => *root,
        roots => {
            return Err(ReconcileError::NestedRejected {
                reason: format!("expected a single root folder, found {}", roots.len()),
            });
        }
    };
    if model.stats().persisted > 0 {
        return Err(ReconcileError::NestedRejected {
            reason: "some folders already exist on the backend".to_string(),
        });
    }

    let tree = model.subtree(root)?;
    let request = NestedFolderRequest::from(&tree);
    tracing::debug!(folder = %request.name, folders = tree.node_count(), "creating nested tree");

    let record = backend
        .create_nested(&request)
        .await
        .map_err(|source| ReconcileError::Backend {
            node: root,
            name: request.name.clone(),
            report: ReconcileReport::default(),
            source,
        })?;

    let mut report = ReconcileReport::default();
    let mut stack = vec![(root, record)];
    while let Some((id, record)) = stack.pop() {
        model.mark_persisted(id, record.id)?;
        report.created += 1;

        let children = model.get(id)?.children.clone();
        for echoed in record.subfolders {
            let matched = children.iter().copied().find(|child| {
                model
                    .node(*child)
                    .is_some_and(|node| !node.is_persisted() && node.name == echoed.name.as_str())
            });
            match matched {
                Some(child) => stack.push((child, echoed)),
                None => tracing::warn!(folder = %echoed.name, "backend echoed an unknown subfolder"),
            }
        }
    }

    let pending = model.stats().pending;
    if pending > 0 {
        tracing::warn!(pending, "nested create response did not cover every folder");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FolderRecord;
    use crate::memory::{BackendCall, MemoryBackend};
    use arbor_core::{NewFolder, PathAddress};

    fn three_level() -> TreeModel {
        let mut model = TreeModel::new();
        let a = model.insert_under(None, NewFolder::named("A")).unwrap();
        let b = model.insert_under(Some(a), NewFolder::named("B")).unwrap();
        model.insert_under(Some(b), NewFolder::named("C")).unwrap();
        model.insert_under(Some(a), NewFolder::named("D")).unwrap();
        model
    }

    #[tokio::test]
    async fn test_parents_created_first() {
        let backend = MemoryBackend::new();
        let mut model = three_level();

        let report = Reconciler::new(&backend).run(&mut model, None).await.unwrap();
        assert_eq!(report.created, 4);

        let names: Vec<_> = backend
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Create { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["A", "B", "C", "D"]);

        for record in backend.records().await {
            if record.name == "A" {
                assert!(record.parent_folder.is_none());
            } else {
                assert!(record.parent_folder.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_root_parent_is_edited_folder() {
        let backend = MemoryBackend::with_records(vec![FolderRecord::new("edit", "Edited")]);
        let mut model = TreeModel::new();
        model
            .insert_child(&PathAddress::root(), NewFolder::named("Child"))
            .unwrap();

        Reconciler::new(&backend)
            .run(&mut model, Some(&BackendId::from("edit")))
            .await
            .unwrap();

        let child = backend
            .records()
            .await
            .into_iter()
            .find(|r| r.name == "Child")
            .unwrap();
        assert_eq!(child.parent_folder, Some(BackendId::from("edit")));
    }

    #[tokio::test]
    async fn test_skip_unchanged_updates() {
        let backend = MemoryBackend::new();
        let mut model = three_level();
        Reconciler::new(&backend).run(&mut model, None).await.unwrap();

        let a = model.roots()[0];
        model.rename(a, "Alpha").unwrap();
        let options = ReconcileOptions {
            skip_unchanged_updates: true,
        };
        let report = Reconciler::new(&backend)
            .with_options(options)
            .run(&mut model, None)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 3);
        assert!(!model.get(a).unwrap().is_renamed());
    }

    #[tokio::test]
    async fn test_create_nested_marks_echoed_ids() {
        let backend = MemoryBackend::new();
        let mut model = three_level();

        let report = create_nested(&backend, &mut model).await.unwrap();
        assert_eq!(report.created, 4);
        assert_eq!(model.stats().pending, 0);
        assert_eq!(backend.records().await.len(), 4);
    }

    #[tokio::test]
    async fn test_create_nested_rejects_persisted_models() {
        let backend = MemoryBackend::new();
        let mut model = three_level();
        Reconciler::new(&backend).run(&mut model, None).await.unwrap();

        let err = create_nested(&backend, &mut model).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NestedRejected { .. }));

        let mut two_roots = TreeModel::new();
        two_roots.insert_under(None, NewFolder::named("X")).unwrap();
        two_roots.insert_under(None, NewFolder::named("Y")).unwrap();
        assert!(create_nested(&backend, &mut two_roots).await.is_err());
    }
}
