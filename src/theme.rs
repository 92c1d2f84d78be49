//! Centralized theme and styling for the TUI
//!
//! Single source of truth for the colors, styles and layout constants used
//! by the terminal presenter. Dialog code never hardcodes a color.

use ratatui::style::{Color, Modifier, Style};

// =============================================================================
// COLOR PALETTE
// =============================================================================

/// Core color palette
pub struct Colors;

impl Colors {
    /// Dialog background
    pub const BG_PRIMARY: Color = Color::Rgb(20, 20, 30);

    /// Background of destructive-action dialogs
    pub const BG_DANGER: Color = Color::Rgb(30, 20, 20);

    pub const FG_PRIMARY: Color = Color::White;
    pub const FG_SECONDARY: Color = Color::Gray;
    pub const FG_MUTED: Color = Color::DarkGray;

    /// Borders, titles, highlights
    pub const PRIMARY: Color = Color::Cyan;

    /// Checked items, emphasis
    pub const SECONDARY: Color = Color::Yellow;

    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    pub const BORDER_ACTIVE: Color = Color::Cyan;
    pub const BORDER_INACTIVE: Color = Color::DarkGray;

    /// Text on the highlighted row
    pub const SELECTED_FG: Color = Color::Black;
}

// =============================================================================
// PRE-BUILT STYLES
// =============================================================================

/// Pre-built styles for common UI elements
pub struct Styles;

impl Styles {
    pub fn text() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }

    pub fn text_secondary() -> Style {
        Style::default().fg(Colors::FG_SECONDARY)
    }

    /// Dialog titles
    pub fn title() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_active() -> Style {
        Style::default().fg(Colors::BORDER_ACTIVE)
    }

    pub fn border_inactive() -> Style {
        Style::default().fg(Colors::BORDER_INACTIVE)
    }

    pub fn panel_bg() -> Style {
        Style::default().bg(Colors::BG_PRIMARY)
    }

    pub fn panel_bg_danger() -> Style {
        Style::default().bg(Colors::BG_DANGER)
    }

    /// Highlighted list row
    pub fn selected() -> Style {
        Style::default()
            .fg(Colors::SELECTED_FG)
            .bg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Checked checklist entry
    pub fn checked() -> Style {
        Style::default()
            .fg(Colors::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn button_active() -> Style {
        Style::default()
            .fg(Colors::SELECTED_FG)
            .bg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn button_inactive() -> Style {
        Style::default().fg(Colors::FG_SECONDARY)
    }
}

// =============================================================================
// THEME CONTEXT
// =============================================================================

/// Severity of an informational dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Danger,
}

/// Semantic style lookups
pub struct Theme;

impl Theme {
    /// Border color for a severity level
    pub fn severity_color(severity: Severity) -> Color {
        match severity {
            Severity::Info => Colors::PRIMARY,
            Severity::Warning => Colors::WARNING,
            Severity::Danger => Colors::ERROR,
        }
    }

    /// Body text style for a severity level
    pub fn severity_style(severity: Severity) -> Style {
        match severity {
            Severity::Info => Style::default().fg(Colors::FG_PRIMARY),
            Severity::Warning => Style::default().fg(Colors::WARNING),
            Severity::Danger => Style::default()
                .fg(Colors::ERROR)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// Style for a backend log line, keyed on its leading marker
    pub fn log_line_style(line: &str) -> Style {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("error") || lower.contains("failed") {
            Style::default().fg(Colors::ERROR)
        } else if lower.starts_with("warn") {
            Style::default().fg(Colors::WARNING)
        } else if lower.starts_with("==>") || lower.starts_with("***") {
            Style::default()
                .fg(Colors::SUCCESS)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Colors::FG_PRIMARY)
        }
    }
}

// =============================================================================
// UI CONSTANTS
// =============================================================================

/// Layout constants
pub struct UiConstants;

impl UiConstants {
    /// Dialog width as a percentage of the terminal
    pub const DIALOG_WIDTH_PCT: u16 = 70;

    pub const DIALOG_MAX_WIDTH: u16 = 90;

    pub const DIALOG_MIN_WIDTH: u16 = 40;

    /// Log viewer size as a percentage of the terminal
    pub const LOG_VIEW_PCT: u16 = 90;

    /// Lines of backend output retained for display
    pub const LOG_TAIL_LINES: usize = 500;

    /// Input poll interval in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 100;
}

/// Common UI text strings
pub struct UiText;

impl UiText {
    pub const HINT_LIST: &'static str = "[↑/↓] Move  [Enter] Select  [Esc] Back";
    pub const HINT_CHECKLIST: &'static str =
        "[↑/↓] Move  [Space] Toggle  [Enter] Accept  [Esc] Back";
    pub const HINT_CONFIRM: &'static str = "[←/→] Choose  [y/n] Answer  [Enter] Accept  [Esc] No";
    pub const HINT_INPUT: &'static str = "[Enter] Accept  [Esc] Cancel";
    pub const HINT_FORM: &'static str = "[Tab/↑/↓] Field  [Enter] Accept  [Esc] Cancel";
    pub const HINT_MESSAGE: &'static str = "[Enter] Continue";
    pub const HINT_LOG_RUNNING: &'static str = "Installation running, it cannot be interrupted";
    pub const HINT_LOG_DONE: &'static str = "Finished  [Enter] Continue";
    pub const BTN_YES: &'static str = "[ Yes ]";
    pub const BTN_NO: &'static str = "[ No ]";
}
