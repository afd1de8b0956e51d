//! Terminal tree browser for arbor.
//!
//! Renders a [`TreeModel`](arbor_core::TreeModel) as an expandable tree and
//! lets the user mark folders for cascading deletion.
//!
//! # Keyboard Navigation
//!
//! - `j`/`k` - Move down/up
//! - `h`/`l` - Collapse/expand folders
//! - `Space` - Mark the current folder
//! - `s` - Mark the current folder and its subtree
//! - `d`/`Enter` - Delete marked folders
//! - `Esc` - Clear marks
//! - `q` - Quit

mod app;
mod event;
mod theme;
mod ui;

pub use app::{AppResult, BrowseOutcome, Browser};
pub use event::KeyAction;
pub use theme::{Theme, ThemeVariant};
pub use ui::{FolderStatus, TreeState, TreeView, VisibleItem, format_size, visible_items};

/// Browse a model in the terminal until the user quits or confirms a selection.
pub fn run(model: arbor_core::TreeModel, title: &str) -> AppResult<BrowseOutcome> {
    let terminal = ratatui::init();
    let result = Browser::new(model, title).run(terminal);
    ratatui::restore();
    result
}
