//! Key handling for the browser.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Key action that can be performed in the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    // Navigation
    MoveUp,
    MoveDown,
    JumpToTop,
    JumpToBottom,
    PageUp,
    PageDown,

    // Tree operations
    Expand,
    Collapse,
    ToggleExpand,

    // Selection
    /// Toggle mark on the current folder (Space).
    ToggleMark,
    /// Mark the current folder and everything beneath it.
    MarkSubtree,
    ClearMarks,

    /// Finish with the marked folders as the deletion selection.
    Confirm,
    ToggleTheme,
    Quit,

    None,
}

impl KeyAction {
    /// Convert a key event to an action.
    pub fn from_key_event(event: KeyEvent) -> Self {
        match (event.code, event.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) => KeyAction::Quit,
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,
            (KeyCode::Esc, _) => KeyAction::ClearMarks,

            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => KeyAction::MoveDown,
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => KeyAction::MoveUp,
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => KeyAction::Collapse,
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, _) => KeyAction::Expand,
            (KeyCode::Tab, _) => KeyAction::ToggleExpand,

            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => KeyAction::JumpToTop,
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => KeyAction::JumpToBottom,
            (KeyCode::PageUp, _) => KeyAction::PageUp,
            (KeyCode::PageDown, _) => KeyAction::PageDown,
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => KeyAction::PageUp,
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => KeyAction::PageDown,

            (KeyCode::Char(' '), _) => KeyAction::ToggleMark,
            (KeyCode::Char('s'), KeyModifiers::NONE) => KeyAction::MarkSubtree,
            (KeyCode::Char('d'), KeyModifiers::NONE) | (KeyCode::Enter, _) => KeyAction::Confirm,
            (KeyCode::Char('T'), _) => KeyAction::ToggleTheme,

            _ => KeyAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_vim_and_arrow_keys_agree() {
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('j'))), KeyAction::MoveDown);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Down)), KeyAction::MoveDown);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('h'))), KeyAction::Collapse);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Left)), KeyAction::Collapse);
    }

    #[test]
    fn test_control_d_pages_instead_of_confirming() {
        let event = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(KeyAction::from_key_event(event), KeyAction::PageDown);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('d'))), KeyAction::Confirm);
    }
}
