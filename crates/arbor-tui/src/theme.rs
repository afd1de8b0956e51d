//! Color theme for the TUI.
//!
//! Dark and light variants share a semantic palette based on Tailwind CSS
//! colors.

use arbor_core::Category;
use ratatui::style::{Color, Modifier, Style};

/// Theme variant (dark or light).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeVariant {
    #[default]
    Dark,
    Light,
}

/// Color theme for the TUI.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Current theme variant.
    pub variant: ThemeVariant,

    pub muted: Color,
    pub selected: Style,

    // Status colors
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,

    // UI elements
    pub border: Style,
    pub title: Style,
    pub footer: Style,
    pub help_key: Style,

    // Tree elements
    pub tree_lines: Style,
    pub folder: Style,
    /// Folders not yet on the backend.
    pub pending: Style,
    /// Persisted folders with an unsaved name change.
    pub renamed: Style,
    pub marked: Style,
}

impl Theme {
    /// Dark theme using a slate-based palette.
    pub fn dark() -> Self {
        let slate_50 = Color::Rgb(248, 250, 252);
        let slate_400 = Color::Rgb(148, 163, 184);
        let slate_500 = Color::Rgb(100, 116, 139);
        let slate_600 = Color::Rgb(71, 85, 105);
        let slate_700 = Color::Rgb(51, 65, 85);
        let slate_800 = Color::Rgb(30, 41, 59);

        let blue_400 = Color::Rgb(96, 165, 250);
        let blue_500 = Color::Rgb(59, 130, 246);
        let green_500 = Color::Rgb(34, 197, 94);
        let yellow_500 = Color::Rgb(234, 179, 8);
        let red_500 = Color::Rgb(239, 68, 68);
        let amber_500 = Color::Rgb(245, 158, 11);

        Self {
            variant: ThemeVariant::Dark,
            muted: slate_500,
            selected: Style::new().bg(slate_700).fg(slate_50).add_modifier(Modifier::BOLD),

            success: green_500,
            warning: yellow_500,
            error: red_500,
            info: blue_400,

            border: Style::new().fg(slate_600),
            title: Style::new().fg(blue_400).add_modifier(Modifier::BOLD),
            footer: Style::new().bg(slate_800).fg(slate_400),
            help_key: Style::new().fg(blue_400).add_modifier(Modifier::BOLD),

            tree_lines: Style::new().fg(slate_600),
            folder: Style::new().fg(blue_500).add_modifier(Modifier::BOLD),
            pending: Style::new().fg(green_500).add_modifier(Modifier::ITALIC),
            renamed: Style::new().fg(yellow_500),
            marked: Style::new().fg(amber_500).add_modifier(Modifier::BOLD),
        }
    }

    /// Light theme using a slate-based palette.
    pub fn light() -> Self {
        let slate_100 = Color::Rgb(241, 245, 249);
        let slate_200 = Color::Rgb(226, 232, 240);
        let slate_400 = Color::Rgb(148, 163, 184);
        let slate_500 = Color::Rgb(100, 116, 139);
        let slate_600 = Color::Rgb(71, 85, 105);
        let slate_900 = Color::Rgb(15, 23, 42);

        let blue_600 = Color::Rgb(37, 99, 235);
        let blue_700 = Color::Rgb(29, 78, 216);
        let green_600 = Color::Rgb(22, 163, 74);
        let yellow_600 = Color::Rgb(202, 138, 4);
        let red_600 = Color::Rgb(220, 38, 38);
        let amber_600 = Color::Rgb(217, 119, 6);

        Self {
            variant: ThemeVariant::Light,
            muted: slate_500,
            selected: Style::new().bg(slate_200).fg(slate_900).add_modifier(Modifier::BOLD),

            success: green_600,
            warning: yellow_600,
            error: red_600,
            info: blue_600,

            border: Style::new().fg(slate_400),
            title: Style::new().fg(blue_700).add_modifier(Modifier::BOLD),
            footer: Style::new().bg(slate_100).fg(slate_600),
            help_key: Style::new().fg(blue_700).add_modifier(Modifier::BOLD),

            tree_lines: Style::new().fg(slate_400),
            folder: Style::new().fg(blue_700).add_modifier(Modifier::BOLD),
            pending: Style::new().fg(green_600).add_modifier(Modifier::ITALIC),
            renamed: Style::new().fg(yellow_600),
            marked: Style::new().fg(amber_600).add_modifier(Modifier::BOLD),
        }
    }

    /// Toggle between dark and light themes.
    pub fn toggle(&self) -> Self {
        match self.variant {
            ThemeVariant::Dark => Self::light(),
            ThemeVariant::Light => Self::dark(),
        }
    }

    /// Color for a category tag.
    pub fn category_color(&self, category: Category) -> Color {
        match category {
            Category::General => self.muted,
            Category::Documents => self.info,
            Category::Media => self.success,
            Category::Projects => self.warning,
            Category::Archive => self.error,
            Category::Personal => Color::Magenta,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
