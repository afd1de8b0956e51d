//! In-memory backend for tests and offline use.

use arbor_core::BackendId;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::backend::{
    BackendError, CreateFolderRequest, FolderBackend, FolderRecord, NestedFolderRequest,
    UpdateFolderRequest,
};

/// What deleting a folder that still has subfolders does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnDeleteWithChildren {
    /// Refuse with [`BackendError::HasChildren`].
    #[default]
    Reject,
    /// Move the subfolders to the deleted folder's parent.
    Reparent,
}

/// A call received by a [`MemoryBackend`], recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Hierarchy,
    Subfolders(BackendId),
    Create {
        name: String,
        parent: Option<BackendId>,
    },
    Update {
        id: BackendId,
        name: String,
    },
    Delete(BackendId),
    CreateNested {
        name: String,
    },
}

type FailurePredicate = Box<dyn Fn(&BackendCall) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    folders: Vec<FolderRecord>,
    calls: Vec<BackendCall>,
    next_id: u64,
    fail_when: Option<FailurePredicate>,
}

impl State {
    fn record(&mut self, call: BackendCall) -> Result<(), BackendError> {
        let fails = self.fail_when.as_ref().is_some_and(|predicate| predicate(&call));
        let message = format!("injected failure on {call:?}");
        self.calls.push(call);
        if fails {
            return Err(BackendError::Rejected(message));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> BackendId {
        self.next_id += 1;
        BackendId::new(format!("mem-{}", self.next_id))
    }

    fn position(&self, id: &BackendId) -> Result<usize, BackendError> {
        self.folders
            .iter()
            .position(|folder| folder.id == *id)
            .ok_or_else(|| BackendError::NotFound(id.clone()))
    }

    fn insert_nested(
        &mut self,
        request: &NestedFolderRequest,
        parent: Option<BackendId>,
    ) -> FolderRecord {
        let mut record = FolderRecord::new(self.allocate_id(), request.name.clone())
            .with_category(request.category);
        record.parent_folder = parent;
        record.description = request.description.clone();
        self.folders.push(record.clone());

        let id = record.id.clone();
        record.subfolders = request
            .subfolders
            .iter()
            .map(|child| self.insert_nested(child, Some(id.clone())))
            .collect();
        record
    }
}

/// A flat folder store held in memory.
///
/// Keeps a log of every call and can be told to fail selected calls, which
/// makes it suitable for exercising partial-failure paths.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    on_delete_with_children: OnDeleteWithChildren,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing folders.
    pub fn with_records(folders: Vec<FolderRecord>) -> Self {
        Self {
            state: Mutex::new(State {
                folders,
                ..State::default()
            }),
            ..Self::default()
        }
    }

    /// Choose how deleting a folder with subfolders behaves.
    pub fn on_delete_with_children(mut self, behaviour: OnDeleteWithChildren) -> Self {
        self.on_delete_with_children = behaviour;
        self
    }

    /// Fail every call matching `predicate` until cleared.
    pub async fn fail_when(&self, predicate: impl Fn(&BackendCall) -> bool + Send + Sync + 'static) {
        self.state.lock().await.fail_when = Some(Box::new(predicate));
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.state.lock().await.fail_when = None;
    }

    /// Snapshot of the call log.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    /// Clear the call log.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Snapshot of the stored folders.
    pub async fn records(&self) -> Vec<FolderRecord> {
        self.state.lock().await.folders.clone()
    }
}

#[async_trait]
impl FolderBackend for MemoryBackend {
    async fn hierarchy(&self) -> Result<Value, BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::Hierarchy)?;
        Ok(json!({ "items": serde_json::to_value(&state.folders)? }))
    }

    async fn subfolders(&self, folder: &BackendId) -> Result<Value, BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::Subfolders(folder.clone()))?;
        state.position(folder)?;

        let mut found = Vec::new();
        let mut frontier = vec![folder.clone()];
        while let Some(parent) = frontier.pop() {
            for record in &state.folders {
                if record.parent_folder.as_ref() == Some(&parent) {
                    frontier.push(record.id.clone());
                    found.push(record.clone());
                }
            }
        }
        Ok(json!({ "subfolders": serde_json::to_value(&found)? }))
    }

    async fn create_folder(
        &self,
        request: &CreateFolderRequest,
    ) -> Result<FolderRecord, BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::Create {
            name: request.name.clone(),
            parent: request.parent_folder.clone(),
        })?;
        if let Some(parent) = &request.parent_folder {
            state.position(parent)?;
        }

        let mut record = FolderRecord::new(state.allocate_id(), request.name.clone())
            .with_category(request.category);
        record.parent_folder = request.parent_folder.clone();
        state.folders.push(record.clone());
        Ok(record)
    }

    async fn update_folder(
        &self,
        folder: &BackendId,
        request: &UpdateFolderRequest,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::Update {
            id: folder.clone(),
            name: request.name.clone(),
        })?;
        let index = state.position(folder)?;
        state.folders[index].name = request.name.clone();
        Ok(())
    }

    async fn delete_folder(&self, folder: &BackendId) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::Delete(folder.clone()))?;
        let index = state.position(folder)?;
        let parent = state.folders[index].parent_folder.clone();

        let has_children = state
            .folders
            .iter()
            .any(|record| record.parent_folder.as_ref() == Some(folder));
        if has_children {
            match self.on_delete_with_children {
                OnDeleteWithChildren::Reject => {
                    return Err(BackendError::HasChildren(folder.clone()));
                }
                OnDeleteWithChildren::Reparent => {
                    for record in &mut state.folders {
                        if record.parent_folder.as_ref() == Some(folder) {
                            record.parent_folder = parent.clone();
                        }
                    }
                }
            }
        }

        state.folders.remove(index);
        Ok(())
    }

    async fn create_nested(
        &self,
        request: &NestedFolderRequest,
    ) -> Result<FolderRecord, BackendError> {
        let mut state = self.state.lock().await;
        state.record(BackendCall::CreateNested {
            name: request.name.clone(),
        })?;
        Ok(state.insert_nested(request, None))
    }
}
