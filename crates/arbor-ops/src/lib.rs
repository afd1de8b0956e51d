//! Backend operations for arbor.
//!
//! This crate talks to the flat folder backend: it defines the backend
//! contract, reconciles an edited [`TreeModel`](arbor_core::TreeModel) against
//! it, and executes cascading deletions. Long-running operations report
//! progress over channels.

mod backend;
mod delete;
mod http;
mod memory;
mod progress;
mod reconcile;

pub use backend::{
    BackendError, CreateFolderRequest, FileRecord, FolderBackend, FolderRecord,
    NestedFolderRequest, UpdateFolderRequest,
};
pub use delete::{
    DeletePolicy, DeletionError, DeletionEvent, DeletionPlan, DeletionReport, DeletionTarget,
    start_deletion,
};
pub use http::HttpBackend;
pub use memory::{BackendCall, MemoryBackend, OnDeleteWithChildren};
pub use progress::{OperationComplete, OperationError, OperationProgress, OperationType};
pub use reconcile::{
    ReconcileError, ReconcileEvent, ReconcileOptions, ReconcileReport, Reconciler, create_nested,
    start_reconcile,
};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
