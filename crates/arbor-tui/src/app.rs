//! Interactive browser for picking folders to delete.

use std::collections::HashSet;

use arbor_core::{NodeId, TreeModel, flatten_subtree};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::event::KeyAction;
use crate::theme::Theme;
use crate::ui::{TreeState, TreeView, visible_items};

/// Result type for the browser.
pub type AppResult<T> = color_eyre::Result<T>;

/// Rows moved by page up/down.
const PAGE_SIZE: usize = 10;

/// How a browsing session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseOutcome {
    /// The user left without choosing anything.
    Quit,
    /// The user confirmed these folders for deletion, in pre-order.
    Delete(Vec<NodeId>),
}

/// Browser state over a loaded model.
pub struct Browser {
    model: TreeModel,
    state: TreeState,
    marked: HashSet<NodeId>,
    theme: Theme,
    title: String,
}

impl Browser {
    pub fn new(model: TreeModel, title: impl Into<String>) -> Self {
        let state = TreeState::new(&model);
        Self {
            model,
            state,
            marked: HashSet::new(),
            theme: Theme::default(),
            title: title.into(),
        }
    }

    pub fn model(&self) -> &TreeModel {
        &self.model
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn marked(&self) -> &HashSet<NodeId> {
        &self.marked
    }

    fn selected_id(&self) -> Option<NodeId> {
        visible_items(&self.model, &self.state)
            .get(self.state.selected)
            .map(|item| item.id)
    }

    /// Marked folders in pre-order.
    fn marked_in_order(&self) -> Vec<NodeId> {
        self.model
            .iter_preorder()
            .filter(|id| self.marked.contains(id))
            .collect()
    }

    /// Apply one action. Returns the outcome once the session should end.
    pub fn handle_action(&mut self, action: KeyAction) -> Option<BrowseOutcome> {
        let visible = visible_items(&self.model, &self.state).len();
        match action {
            KeyAction::MoveUp => self.state.move_up(1),
            KeyAction::MoveDown => self.state.move_down(1, visible),
            KeyAction::PageUp => self.state.move_up(PAGE_SIZE),
            KeyAction::PageDown => self.state.move_down(PAGE_SIZE, visible),
            KeyAction::JumpToTop => self.state.jump_to_top(),
            KeyAction::JumpToBottom => self.state.jump_to_bottom(visible),
            KeyAction::Expand => {
                if let Some(id) = self.selected_id() {
                    self.state.expand(id);
                }
            }
            KeyAction::Collapse => {
                if let Some(id) = self.selected_id() {
                    self.state.collapse(id);
                }
            }
            KeyAction::ToggleExpand => {
                if let Some(id) = self.selected_id() {
                    self.state.toggle_expand(id);
                }
            }
            KeyAction::ToggleMark => {
                if let Some(id) = self.selected_id() {
                    if !self.marked.remove(&id) {
                        self.marked.insert(id);
                    }
                }
            }
            KeyAction::MarkSubtree => {
                if let Some(id) = self.selected_id() {
                    match flatten_subtree(&self.model, id) {
                        Ok(flat) => self.marked.extend(flat.into_iter().map(|node| node.id)),
                        Err(e) => tracing::warn!("cannot mark subtree: {e}"),
                    }
                }
            }
            KeyAction::ClearMarks => self.marked.clear(),
            KeyAction::ToggleTheme => self.theme = self.theme.toggle(),
            KeyAction::Confirm => {
                if !self.marked.is_empty() {
                    return Some(BrowseOutcome::Delete(self.marked_in_order()));
                }
            }
            KeyAction::Quit => return Some(BrowseOutcome::Quit),
            KeyAction::None => {}
        }

        let visible = visible_items(&self.model, &self.state).len();
        self.state.selected = self.state.selected.min(visible.saturating_sub(1));
        None
    }

    /// Draw the browser.
    pub fn render(&mut self, frame: &mut Frame) {
        let [main, footer] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border)
            .title(Span::styled(format!(" {} ", self.title), self.theme.title));
        let view = TreeView::new(&self.model, &self.theme, &self.marked).block(block);
        frame.render_stateful_widget(view, main, &mut self.state);

        let stats = self.model.stats();
        let mut spans = Vec::new();
        for (key, desc) in [
            ("space", "mark"),
            ("s", "mark subtree"),
            ("d", "delete marked"),
            ("esc", "clear"),
            ("q", "quit"),
        ] {
            spans.push(Span::styled(format!(" {key} "), self.theme.help_key));
            spans.push(Span::raw(format!("{desc} ")));
        }
        spans.push(Span::raw(format!(
            "│ {} folders, {} marked, {} unsaved",
            stats.total_folders,
            self.marked.len(),
            stats.pending
        )));
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(self.theme.footer),
            footer,
        );
    }

    /// Run the event loop until the user quits or confirms.
    pub fn run(mut self, mut terminal: DefaultTerminal) -> AppResult<BrowseOutcome> {
        loop {
            terminal.draw(|frame| self.render(frame))?;
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(outcome) = self.handle_action(KeyAction::from_key_event(key)) {
                    return Ok(outcome);
                }
            }
        }
    }
}
