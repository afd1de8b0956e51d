//! UI components and widgets.

mod tree;

pub use tree::{FolderStatus, TreeState, TreeView, VisibleItem, visible_items};

/// Format a byte size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
