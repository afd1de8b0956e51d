//! Progress reporting types for backend operations.

use std::fmt;

use arbor_core::NodeId;
use serde::{Deserialize, Serialize};

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Reconcile,
    CreateNested,
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconcile => write!(f, "Save"),
            Self::CreateNested => write!(f, "Create tree"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// An error tied to a single folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub node: NodeId,
    pub folder: String,
    pub message: String,
}

impl OperationError {
    pub fn new(node: NodeId, folder: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node,
            folder: folder.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.folder, self.message)
    }
}

/// Progress information for an ongoing operation.
#[derive(Debug, Clone)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of folders completed.
    pub items_completed: usize,
    /// Total number of folders to process.
    pub items_total: usize,
    /// The folder currently being processed.
    pub current: Option<String>,
    /// Errors encountered so far.
    pub errors: Vec<OperationError>,
}

impl OperationProgress {
    /// Create a new progress tracker for an operation.
    pub fn new(operation_type: OperationType, items_total: usize) -> Self {
        Self {
            operation_type,
            items_completed: 0,
            items_total,
            current: None,
            errors: Vec::new(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.items_total > 0 {
            (self.items_completed as f64 / self.items_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check if the operation has any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Add an error to the progress.
    pub fn add_error(&mut self, error: OperationError) {
        self.errors.push(error);
    }

    /// Update the folder currently being processed.
    pub fn set_current(&mut self, folder: Option<String>) {
        self.current = folder;
    }

    /// Increment the completed count.
    pub fn complete_item(&mut self) {
        self.items_completed += 1;
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone)]
pub struct OperationComplete {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of folders successfully processed.
    pub succeeded: usize,
    /// Number of folders that failed.
    pub failed: usize,
    /// Folders that needed no backend call.
    pub skipped: usize,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
}

impl OperationComplete {
    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.operation_type {
            OperationType::Reconcile => "Saved",
            OperationType::CreateNested => "Created",
            OperationType::Delete => "Deleted",
        };

        let mut summary = format!("{} {} folders", action, self.succeeded);
        if self.skipped > 0 {
            summary.push_str(&format!(", {} unchanged", self.skipped));
        }
        if self.failed > 0 {
            summary.push_str(&format!(", {} failed", self.failed));
        }
        summary
    }
}
