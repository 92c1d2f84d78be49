//! Dialog state, key handling and rendering
//!
//! Each dialog owns its state and turns key presses into an `Outcome`.
//! Key handling is pure so it is tested without a terminal; rendering only
//! reads the state.

use crate::presenter::{FormField, MenuItem};
use crate::theme::{Colors, Severity, Styles, Theme, UiConstants, UiText};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Result of feeding one key to a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Keep the dialog open
    Pending,
    Submit(T),
    Cancel,
}

/// A modal dialog driven by the presenter's event loop.
pub trait Dialog {
    type Output;

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<Self::Output>;

    fn render(&self, f: &mut Frame, area: Rect);
}

// ============================================================================
// Layout helpers
// ============================================================================

/// Rectangle centered in `area`, sized by the dialog width constants and
/// `height` rows (clamped to the area).
pub fn dialog_rect(area: Rect, height: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(UiConstants::DIALOG_WIDTH_PCT) / 100) as u16;
    let width = width
        .clamp(UiConstants::DIALOG_MIN_WIDTH, UiConstants::DIALOG_MAX_WIDTH)
        .min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Draw the dialog frame and return the inner area.
fn frame_block(f: &mut Frame, rect: Rect, title: &str, border: Style, bg: Style) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(format!(" {} ", title), Styles::title()))
        .style(bg);
    let inner = block.inner(rect);
    f.render_widget(Clear, rect);
    f.render_widget(block, rect);
    inner
}

/// Split an inner dialog area into prompt, body and hint rows.
fn split_body(inner: Rect, prompt_lines: u16) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(prompt_lines),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);
    (chunks[0], chunks[1], chunks[2])
}

fn render_hint(f: &mut Frame, area: Rect, hint: &str) {
    f.render_widget(
        Paragraph::new(hint)
            .style(Styles::text_muted())
            .alignment(Alignment::Center),
        area,
    );
}

fn prompt_height(prompt: &str) -> u16 {
    if prompt.is_empty() {
        0
    } else {
        prompt.lines().count() as u16 + 1
    }
}

fn is_cancel(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

// ============================================================================
// Single choice
// ============================================================================

/// Menu with one highlighted entry.
#[derive(Debug, Clone)]
pub struct ListDialog {
    pub title: String,
    pub prompt: String,
    pub items: Vec<MenuItem>,
    pub selected: usize,
}

impl ListDialog {
    pub fn new(title: &str, prompt: &str, items: &[MenuItem], default: Option<&str>) -> Self {
        let selected = default
            .and_then(|id| items.iter().position(|item| item.id == id))
            .unwrap_or(0);
        Self {
            title: title.to_string(),
            prompt: prompt.to_string(),
            items: items.to_vec(),
            selected,
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }
}

impl Dialog for ListDialog {
    type Output = String;

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<String> {
        if is_cancel(&key) {
            return Outcome::Cancel;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.items.len().saturating_sub(1),
            KeyCode::Enter => {
                if let Some(item) = self.items.get(self.selected) {
                    return Outcome::Submit(item.id.clone());
                }
            }
            _ => {}
        }
        Outcome::Pending
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        let prompt_rows = prompt_height(&self.prompt);
        let rows = self.items.len() as u16 + prompt_rows + 3;
        let rect = dialog_rect(area, rows);
        let inner = frame_block(f, rect, &self.title, Styles::border_active(), Styles::panel_bg());
        let (prompt, body, hint) = split_body(inner, prompt_rows);

        f.render_widget(
            Paragraph::new(self.prompt.as_str()).style(Styles::text()),
            prompt,
        );

        let label_width = self
            .items
            .iter()
            .map(|item| item.label.chars().count())
            .max()
            .unwrap_or(0);
        let items: Vec<ListItem> = self
            .items
            .iter()
            .map(|item| {
                let mut spans = vec![Span::styled(
                    format!(" {:<width$}", item.label, width = label_width),
                    Styles::text(),
                )];
                if !item.description.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", item.description),
                        Styles::text_secondary(),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items).highlight_style(Styles::selected());
        let mut state = ListState::default().with_selected(Some(self.selected));
        f.render_stateful_widget(list, body, &mut state);

        render_hint(f, hint, UiText::HINT_LIST);
    }
}

// ============================================================================
// Checklist
// ============================================================================

/// Menu where any number of entries can be checked.
#[derive(Debug, Clone)]
pub struct ChecklistDialog {
    pub title: String,
    pub prompt: String,
    pub items: Vec<MenuItem>,
    pub checked: Vec<bool>,
    pub cursor: usize,
}

impl ChecklistDialog {
    pub fn new(title: &str, prompt: &str, items: &[MenuItem], checked: &[String]) -> Self {
        Self {
            title: title.to_string(),
            prompt: prompt.to_string(),
            checked: items.iter().map(|item| checked.contains(&item.id)).collect(),
            items: items.to_vec(),
            cursor: 0,
        }
    }

    pub fn toggle(&mut self) {
        if let Some(flag) = self.checked.get_mut(self.cursor) {
            *flag = !*flag;
        }
    }

    /// Checked ids in item order.
    pub fn selection(&self) -> Vec<String> {
        self.items
            .iter()
            .zip(&self.checked)
            .filter(|(_, checked)| **checked)
            .map(|(item, _)| item.id.clone())
            .collect()
    }
}

impl Dialog for ChecklistDialog {
    type Output = Vec<String>;

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<Vec<String>> {
        if is_cancel(&key) {
            return Outcome::Cancel;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => self.toggle(),
            KeyCode::Enter => return Outcome::Submit(self.selection()),
            _ => {}
        }
        Outcome::Pending
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        let prompt_rows = prompt_height(&self.prompt);
        let rows = self.items.len().max(1) as u16 + prompt_rows + 3;
        let rect = dialog_rect(area, rows);
        let inner = frame_block(f, rect, &self.title, Styles::border_active(), Styles::panel_bg());
        let (prompt, body, hint) = split_body(inner, prompt_rows);

        f.render_widget(
            Paragraph::new(self.prompt.as_str()).style(Styles::text()),
            prompt,
        );

        if self.items.is_empty() {
            f.render_widget(
                Paragraph::new("  Nothing to select").style(Style::default().fg(Colors::WARNING)),
                body,
            );
        } else {
            let items: Vec<ListItem> = self
                .items
                .iter()
                .zip(&self.checked)
                .map(|(item, checked)| {
                    let (marker, style) = if *checked {
                        ("[x]", Styles::checked())
                    } else {
                        ("[ ]", Styles::text())
                    };
                    ListItem::new(format!(" {} {}", marker, item.label)).style(style)
                })
                .collect();
            let list = List::new(items).highlight_style(Styles::selected());
            let mut state = ListState::default().with_selected(Some(self.cursor));
            f.render_stateful_widget(list, body, &mut state);
        }

        render_hint(f, hint, UiText::HINT_CHECKLIST);
    }
}

// ============================================================================
// Yes / no
// ============================================================================

#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    pub title: String,
    pub message: String,
    /// Currently focused button
    pub yes: bool,
    pub severity: Severity,
}

impl ConfirmDialog {
    pub fn new(title: &str, message: &str, default_yes: bool) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            yes: default_yes,
            severity: if default_yes {
                Severity::Info
            } else {
                Severity::Danger
            },
        }
    }
}

impl Dialog for ConfirmDialog {
    type Output = bool;

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<bool> {
        if is_cancel(&key) {
            return Outcome::Cancel;
        }
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                self.yes = !self.yes
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => return Outcome::Submit(true),
            KeyCode::Char('n') | KeyCode::Char('N') => return Outcome::Submit(false),
            KeyCode::Enter => return Outcome::Submit(self.yes),
            _ => {}
        }
        Outcome::Pending
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        let body_rows = self.message.lines().count() as u16;
        let rect = dialog_rect(area, body_rows + 6);
        let bg = match self.severity {
            Severity::Danger => Styles::panel_bg_danger(),
            _ => Styles::panel_bg(),
        };
        let border = Style::default().fg(Theme::severity_color(self.severity));
        let inner = frame_block(f, rect, &self.title, border, bg);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        f.render_widget(
            Paragraph::new(self.message.as_str())
                .style(Theme::severity_style(self.severity))
                .wrap(Wrap { trim: false }),
            chunks[0],
        );

        let (yes_style, no_style) = if self.yes {
            (Styles::button_active(), Styles::button_inactive())
        } else {
            (Styles::button_inactive(), Styles::button_active())
        };
        let buttons = Line::from(vec![
            Span::styled(UiText::BTN_YES, yes_style),
            Span::raw("    "),
            Span::styled(UiText::BTN_NO, no_style),
        ]);
        f.render_widget(
            Paragraph::new(buttons).alignment(Alignment::Center),
            chunks[1],
        );
        render_hint(f, chunks[2], UiText::HINT_CONFIRM);
    }
}

// ============================================================================
// Text fields
// ============================================================================

/// One or more editable text fields. A single-field form is the text
/// input dialog.
#[derive(Debug, Clone)]
pub struct FormDialog {
    pub title: String,
    pub prompt: String,
    pub fields: Vec<FormField>,
    pub values: Vec<String>,
    pub focus: usize,
}

impl FormDialog {
    pub fn new(title: &str, prompt: &str, fields: &[FormField]) -> Self {
        Self {
            title: title.to_string(),
            prompt: prompt.to_string(),
            values: fields.iter().map(|field| field.value.clone()).collect(),
            fields: fields.to_vec(),
            focus: 0,
        }
    }

    pub fn single(title: &str, prompt: &str, initial: &str) -> Self {
        Self::new(title, prompt, &[FormField::new("", initial)])
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    fn current_value_mut(&mut self) -> Option<&mut String> {
        self.values.get_mut(self.focus)
    }
}

impl Dialog for FormDialog {
    type Output = Vec<String>;

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<Vec<String>> {
        if is_cancel(&key) {
            return Outcome::Cancel;
        }
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.previous_field(),
            KeyCode::Enter => return Outcome::Submit(self.values.clone()),
            KeyCode::Backspace => {
                if let Some(value) = self.current_value_mut() {
                    value.pop();
                }
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(value) = self.current_value_mut() {
                    value.clear();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(value) = self.current_value_mut() {
                    value.push(c);
                }
            }
            _ => {}
        }
        Outcome::Pending
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        let prompt_rows = prompt_height(&self.prompt);
        let rows = self.fields.len() as u16 * 3 + prompt_rows + 4;
        let rect = dialog_rect(area, rows);
        let inner = frame_block(f, rect, &self.title, Styles::border_active(), Styles::panel_bg());
        let (prompt, body, hint) = split_body(inner, prompt_rows);

        f.render_widget(
            Paragraph::new(self.prompt.as_str()).style(Styles::text()),
            prompt,
        );

        let mut constraints: Vec<Constraint> =
            self.fields.iter().map(|_| Constraint::Length(3)).collect();
        constraints.push(Constraint::Min(0));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(body);

        for (i, (field, value)) in self.fields.iter().zip(&self.values).enumerate() {
            let focused = i == self.focus;
            let border = if focused {
                Styles::border_active()
            } else {
                Styles::border_inactive()
            };
            let mut block = Block::default().borders(Borders::ALL).border_style(border);
            if !field.label.is_empty() {
                block = block.title(format!(" {} ", field.label));
            }
            if focused && !field.help.is_empty() {
                block = block.title_bottom(Line::from(Span::styled(
                    format!(" {} ", field.help),
                    Styles::text_muted(),
                )));
            }
            let cursor = if focused { "_" } else { "" };
            f.render_widget(
                Paragraph::new(format!("{}{}", value, cursor))
                    .style(Styles::text())
                    .block(block),
                rows[i],
            );
        }

        let hint_text = if self.fields.len() > 1 {
            UiText::HINT_FORM
        } else {
            UiText::HINT_INPUT
        };
        render_hint(f, hint, hint_text);
    }
}

// ============================================================================
// Message box
// ============================================================================

#[derive(Debug, Clone)]
pub struct MessageDialog {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub scroll: u16,
}

impl MessageDialog {
    pub fn new(title: &str, message: &str, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            severity,
            scroll: 0,
        }
    }
}

impl Dialog for MessageDialog {
    type Output = ();

    fn handle_key(&mut self, key: KeyEvent) -> Outcome<()> {
        if is_cancel(&key) {
            return Outcome::Cancel;
        }
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('q') => Outcome::Submit(()),
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll = self.scroll.saturating_sub(1);
                Outcome::Pending
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = self.message.lines().count().saturating_sub(1) as u16;
                self.scroll = (self.scroll + 1).min(max);
                Outcome::Pending
            }
            _ => Outcome::Pending,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        let rows = self.message.lines().count() as u16 + 4;
        let rect = dialog_rect(area, rows);
        let border = Style::default().fg(Theme::severity_color(self.severity));
        let inner = frame_block(f, rect, &self.title, border, Styles::panel_bg());
        let (_, body, hint) = split_body(inner, 0);

        f.render_widget(
            Paragraph::new(Text::from(self.message.as_str()))
                .style(Theme::severity_style(self.severity))
                .wrap(Wrap { trim: false })
                .scroll((self.scroll, 0)),
            body,
        );
        render_hint(f, hint, UiText::HINT_MESSAGE);
    }
}
