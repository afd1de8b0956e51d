//! Folder tree widget.

use std::collections::HashSet;

use arbor_core::{Category, NodeId, TreeModel};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, StatefulWidget, Widget};

use crate::theme::Theme;
use crate::ui::format_size;

/// State for the tree view.
///
/// Expansion is keyed by node id, so it survives edits elsewhere in the tree.
#[derive(Debug, Default, Clone)]
pub struct TreeState {
    /// Currently selected index in the flattened view.
    pub selected: usize,
    /// Scroll offset.
    pub offset: usize,
    /// Set of expanded folders.
    pub expanded: HashSet<NodeId>,
}

impl TreeState {
    /// Create state with every root folder expanded.
    pub fn new(model: &TreeModel) -> Self {
        Self {
            selected: 0,
            offset: 0,
            expanded: model.roots().iter().copied().collect(),
        }
    }

    /// Toggle expansion of a folder.
    pub fn toggle_expand(&mut self, id: NodeId) {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
    }

    pub fn expand(&mut self, id: NodeId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.expanded.remove(&id);
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    /// Move selection up.
    pub fn move_up(&mut self, count: usize) {
        self.selected = self.selected.saturating_sub(count);
    }

    /// Move selection down.
    pub fn move_down(&mut self, count: usize, max: usize) {
        self.selected = (self.selected + count).min(max.saturating_sub(1));
    }

    /// Jump to top.
    pub fn jump_to_top(&mut self) {
        self.selected = 0;
    }

    /// Jump to bottom.
    pub fn jump_to_bottom(&mut self, max: usize) {
        self.selected = max.saturating_sub(1);
    }

    /// Ensure selected item is visible, adjusting offset if needed.
    pub fn ensure_visible(&mut self, viewport_height: usize) {
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + viewport_height {
            self.offset = self.selected - viewport_height + 1;
        }
    }
}

/// Save state of a folder relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Pending,
    Renamed,
    Saved,
}

/// A flattened visible row in the tree.
#[derive(Debug, Clone)]
pub struct VisibleItem {
    pub id: NodeId,
    pub name: String,
    pub category: Category,
    pub status: FolderStatus,
    pub file_bytes: u64,
    pub has_children: bool,
    pub expanded: bool,
    pub depth: usize,
    pub is_last_sibling: bool,
    pub parent_last_siblings: Vec<bool>,
}

/// Flatten the model to the rows currently visible under `state`.
pub fn visible_items(model: &TreeModel, state: &TreeState) -> Vec<VisibleItem> {
    let mut items = Vec::new();
    let roots = model.roots();
    for (i, id) in roots.iter().enumerate() {
        flatten_node(model, *id, 0, i == roots.len() - 1, Vec::new(), state, &mut items);
    }
    items
}

fn flatten_node(
    model: &TreeModel,
    id: NodeId,
    depth: usize,
    is_last: bool,
    parent_last_siblings: Vec<bool>,
    state: &TreeState,
    items: &mut Vec<VisibleItem>,
) {
    let Some(node) = model.node(id) else {
        return;
    };
    let expanded = state.is_expanded(id);
    let status = if !node.is_persisted() {
        FolderStatus::Pending
    } else if node.is_renamed() {
        FolderStatus::Renamed
    } else {
        FolderStatus::Saved
    };

    items.push(VisibleItem {
        id,
        name: node.name.to_string(),
        category: node.category,
        status,
        file_bytes: node.file_bytes,
        has_children: !node.children.is_empty(),
        expanded,
        depth,
        is_last_sibling: is_last,
        parent_last_siblings: parent_last_siblings.clone(),
    });

    if expanded {
        let child_count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            let mut child_parent_lasts = parent_last_siblings.clone();
            if depth > 0 {
                child_parent_lasts.push(is_last);
            }
            flatten_node(
                model,
                *child,
                depth + 1,
                i == child_count - 1,
                child_parent_lasts,
                state,
                items,
            );
        }
    }
}

/// Tree view widget.
pub struct TreeView<'a> {
    model: &'a TreeModel,
    theme: &'a Theme,
    marked: &'a HashSet<NodeId>,
    block: Option<Block<'a>>,
}

impl<'a> TreeView<'a> {
    /// Create a new tree view.
    pub fn new(model: &'a TreeModel, theme: &'a Theme, marked: &'a HashSet<NodeId>) -> Self {
        Self {
            model,
            theme,
            marked,
            block: None,
        }
    }

    /// Set the block (border) for the widget.
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl StatefulWidget for TreeView<'_> {
    type State = TreeState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        if inner_area.height == 0 || inner_area.width == 0 {
            return;
        }

        let items = visible_items(self.model, state);
        let viewport_height = inner_area.height as usize;
        state.ensure_visible(viewport_height);

        let start = state.offset;
        let end = (start + viewport_height).min(items.len());
        let size_text_width: u16 = 10;
        let tag_width: u16 = 11;

        for (row_idx, item_idx) in (start..end).enumerate() {
            let item = &items[item_idx];
            let y = inner_area.y + row_idx as u16;
            let is_selected = item_idx == state.selected;
            let is_marked = self.marked.contains(&item.id);

            let mut prefix = String::new();
            for &parent_is_last in &item.parent_last_siblings {
                prefix.push_str(if parent_is_last { "  " } else { "│ " });
            }
            if item.depth > 0 {
                prefix.push_str(if item.is_last_sibling { "└─" } else { "├─" });
            }

            let (checkbox, checkbox_style) = if is_marked {
                ("● ", self.theme.marked)
            } else {
                ("  ", Style::default().fg(self.theme.muted))
            };

            let expand_indicator = match (item.has_children, item.expanded) {
                (true, true) => "▼ ",
                (true, false) => "▶ ",
                (false, _) => "  ",
            };

            let (base_style, suffix) = match item.status {
                FolderStatus::Pending => (self.theme.pending, " +"),
                FolderStatus::Renamed => (self.theme.renamed, " ~"),
                FolderStatus::Saved => (self.theme.folder, ""),
            };

            let prefix_width = prefix.chars().count() + checkbox.chars().count() + 2;
            let available_for_name = (inner_area.width as usize)
                .saturating_sub(prefix_width)
                .saturating_sub(suffix.len())
                .saturating_sub((size_text_width + tag_width + 2) as usize);

            let name = truncate(&item.name, available_for_name);
            let name_padding = " ".repeat(available_for_name.saturating_sub(name.chars().count()));
            let tag = format!("{:>10} ", item.category.to_string());
            let size_text = if item.file_bytes > 0 {
                format!("{:>10}", format_size(item.file_bytes))
            } else {
                " ".repeat(size_text_width as usize)
            };

            let line = Line::from(vec![
                Span::styled(prefix, self.theme.tree_lines),
                Span::styled(checkbox, checkbox_style),
                Span::styled(expand_indicator, Style::default().fg(self.theme.muted)),
                Span::styled(name, base_style),
                Span::styled(suffix, base_style),
                Span::raw(name_padding),
                Span::raw(" "),
                Span::styled(
                    tag,
                    Style::default().fg(self.theme.category_color(item.category)),
                ),
                Span::styled(size_text, Style::default().fg(self.theme.muted)),
            ]);

            let line = if is_selected {
                line.style(self.theme.selected)
            } else if is_marked {
                line.style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                line
            };

            let line_area = Rect::new(inner_area.x, y, inner_area.width, 1);
            Widget::render(line, line_area, buf);
        }
    }
}

fn truncate(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        name.to_string()
    } else if max_chars == 0 {
        String::new()
    } else {
        let kept: String = name.chars().take(max_chars - 1).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{BackendId, NewFolder};

    /// `Docs > [2024 > Q1, 2023]`, `Music`.
    fn model() -> (TreeModel, Vec<NodeId>) {
        let mut model = TreeModel::new();
        let docs = model.insert_under(None, NewFolder::named("Docs")).unwrap();
        let y2024 = model.insert_under(Some(docs), NewFolder::named("2024")).unwrap();
        let q1 = model.insert_under(Some(y2024), NewFolder::named("Q1")).unwrap();
        let y2023 = model.insert_under(Some(docs), NewFolder::named("2023")).unwrap();
        let music = model.insert_under(None, NewFolder::named("Music")).unwrap();
        (model, vec![docs, y2024, q1, y2023, music])
    }

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol())
            .collect::<String>()
    }

    #[test]
    fn test_roots_expanded_by_default() {
        let (model, ids) = model();
        let state = TreeState::new(&model);
        let items = visible_items(&model, &state);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Docs", "2024", "2023", "Music"]);
        assert!(items[1].has_children && !items[1].expanded);
        assert!(items[2].parent_last_siblings.is_empty());
        assert!(state.is_expanded(ids[0]));
    }

    #[test]
    fn test_expand_by_id_survives_inserts() {
        let (mut model, ids) = model();
        let mut state = TreeState::new(&model);
        state.expand(ids[1]);
        model.insert_under(Some(ids[0]), NewFolder::named("2022")).unwrap();

        let names: Vec<_> = visible_items(&model, &state)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, ["Docs", "2024", "Q1", "2023", "2022", "Music"]);
        let q1 = &visible_items(&model, &state)[2];
        assert_eq!(q1.parent_last_siblings, [false]);

        state.toggle_expand(ids[0]);
        assert_eq!(visible_items(&model, &state).len(), 2);
    }

    #[test]
    fn test_status_from_persistence() {
        let (mut model, ids) = model();
        model.mark_persisted(ids[0], BackendId::from("d")).unwrap();
        model.mark_persisted(ids[4], BackendId::from("m")).unwrap();
        model.rename(ids[4], "Songs").unwrap();

        let state = TreeState::new(&model);
        let items = visible_items(&model, &state);
        assert_eq!(items[0].status, FolderStatus::Saved);
        assert_eq!(items[1].status, FolderStatus::Pending);
        assert_eq!(items[3].status, FolderStatus::Renamed);
    }

    #[test]
    fn test_render_draws_tree_lines() {
        let (model, ids) = model();
        let theme = Theme::default();
        let marked: HashSet<NodeId> = [ids[3]].into_iter().collect();
        let mut state = TreeState::new(&model);
        let mut buf = Buffer::empty(Rect::new(0, 0, 50, 4));

        TreeView::new(&model, &theme, &marked).render(buf.area, &mut buf, &mut state);

        assert!(row(&buf, 0).starts_with("  ▼ Docs +"));
        assert!(row(&buf, 1).starts_with("├─  ▶ 2024 +"));
        assert!(row(&buf, 2).starts_with("└─●   2023 +"));
        assert!(row(&buf, 3).contains("Music"));
    }

    #[test]
    fn test_render_scrolls_to_selection() {
        let (model, _) = model();
        let theme = Theme::default();
        let marked = HashSet::new();
        let mut state = TreeState::new(&model);
        state.jump_to_bottom(4);
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 2));

        TreeView::new(&model, &theme, &marked).render(buf.area, &mut buf, &mut state);

        assert_eq!(state.offset, 2);
        assert!(row(&buf, 1).contains("Music"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Über", 10), "Über");
        assert_eq!(truncate("Übersicht", 4), "Übe…");
        assert_eq!(truncate("abc", 0), "");
    }
}
