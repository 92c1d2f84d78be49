//! Terminal presenter
//!
//! `TuiPresenter` implements `Presenter` with ratatui on a crossterm
//! backend. Each call runs a small modal event loop until the dialog is
//! submitted or cancelled:
//! - `dialogs` - dialog state, key handling and rendering
//! - `log_view` - the backend log tail shown while installing

pub mod dialogs;
pub mod log_view;

use crate::error::{Result, WizardError};
use crate::presenter::{ExitPoll, FormField, MenuItem, Presenter};
use crate::theme::{Severity, Styles, UiConstants};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use dialogs::{
    ChecklistDialog, ConfirmDialog, Dialog, FormDialog, ListDialog, MessageDialog, Outcome,
};
use log_view::LogTail;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io::{stdout, Stdout};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Banner shown above every dialog.
const BANNER: &str = "ZFSBootMenu Installer";

fn terminal_error(e: std::io::Error) -> WizardError {
    WizardError::terminal(e.to_string())
}

/// Full-screen ratatui presenter.
pub struct TuiPresenter {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Shown in the banner, e.g. `DRY RUN`
    subtitle: String,
    active: bool,
}

impl TuiPresenter {
    /// Enter raw mode and the alternate screen.
    pub fn new(subtitle: impl Into<String>) -> Result<Self> {
        enable_raw_mode().map_err(terminal_error)?;
        if let Err(e) = crossterm::execute!(stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(terminal_error(e));
        }
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout())).map_err(terminal_error)?;
        terminal.hide_cursor().map_err(terminal_error)?;
        terminal.clear().map_err(terminal_error)?;
        info!("Terminal presenter started");
        Ok(Self {
            terminal,
            subtitle: subtitle.into(),
            active: true,
        })
    }

    fn poll_interval() -> Duration {
        Duration::from_millis(UiConstants::POLL_INTERVAL_MS)
    }

    fn draw_with(&mut self, render: impl FnOnce(&mut Frame, Rect)) -> Result<()> {
        let subtitle = self.subtitle.clone();
        self.terminal
            .draw(|f| {
                let body = render_backdrop(f, &subtitle);
                render(f, body);
            })
            .map_err(terminal_error)?;
        Ok(())
    }

    /// Modal loop: draw, wait for a key press, feed it to the dialog.
    fn run_dialog<D: Dialog>(&mut self, dialog: &mut D) -> Result<Option<D::Output>> {
        loop {
            self.draw_with(|f, area| dialog.render(f, area))?;

            if !event::poll(Self::poll_interval()).map_err(terminal_error)? {
                continue;
            }
            match event::read().map_err(terminal_error)? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match dialog.handle_key(key) {
                        Outcome::Pending => {}
                        Outcome::Submit(value) => return Ok(Some(value)),
                        Outcome::Cancel => return Ok(None),
                    }
                }
                Event::Resize(width, height) => debug!("Terminal resized to {}x{}", width, height),
                _ => {}
            }
        }
    }

    fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode().map_err(terminal_error)?;
        crossterm::execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(terminal_error)?;
        self.terminal.show_cursor().map_err(terminal_error)?;
        info!("Terminal restored");
        Ok(())
    }
}

impl Drop for TuiPresenter {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Banner across the top; returns the area left for dialogs.
fn render_backdrop(f: &mut Frame, subtitle: &str) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(f.area());

    let mut spans = vec![Span::styled(BANNER, Styles::title())];
    if !subtitle.is_empty() {
        spans.push(Span::styled(format!("  [{}]", subtitle), Styles::text_secondary()));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM).border_style(Styles::border_inactive())),
        chunks[0],
    );
    chunks[1]
}

impl Presenter for TuiPresenter {
    fn choose(
        &mut self,
        title: &str,
        prompt: &str,
        items: &[MenuItem],
        default: Option<&str>,
    ) -> Result<Option<String>> {
        self.run_dialog(&mut ListDialog::new(title, prompt, items, default))
    }

    fn multi_choose(
        &mut self,
        title: &str,
        prompt: &str,
        items: &[MenuItem],
        checked: &[String],
    ) -> Result<Option<Vec<String>>> {
        self.run_dialog(&mut ChecklistDialog::new(title, prompt, items, checked))
    }

    fn confirm(&mut self, title: &str, message: &str, default_yes: bool) -> Result<bool> {
        Ok(self
            .run_dialog(&mut ConfirmDialog::new(title, message, default_yes))?
            .unwrap_or(false))
    }

    fn text_input(&mut self, title: &str, prompt: &str, initial: &str) -> Result<Option<String>> {
        let values = self.run_dialog(&mut FormDialog::single(title, prompt, initial))?;
        Ok(values.and_then(|v| v.into_iter().next()))
    }

    fn form(
        &mut self,
        title: &str,
        prompt: &str,
        fields: &[FormField],
    ) -> Result<Option<Vec<String>>> {
        self.run_dialog(&mut FormDialog::new(title, prompt, fields))
    }

    fn show_message(&mut self, title: &str, message: &str, severity: Severity) -> Result<()> {
        self.run_dialog(&mut MessageDialog::new(title, message, severity))?;
        Ok(())
    }

    fn follow_log(
        &mut self,
        title: &str,
        log_path: &Path,
        from: u64,
        finished: &mut ExitPoll<'_>,
    ) -> Result<()> {
        let mut tail = LogTail::new(log_path).starting_at(from);

        // Keys are drained and ignored until the process is gone
        loop {
            let done = finished()?;
            tail.refresh()?;
            self.draw_with(|f, area| tail.render(f, area, title, done))?;
            if done {
                break;
            }
            if event::poll(Self::poll_interval()).map_err(terminal_error)? {
                let _ = event::read().map_err(terminal_error)?;
            }
        }

        loop {
            if event::poll(Self::poll_interval()).map_err(terminal_error)? {
                if let Event::Key(key) = event::read().map_err(terminal_error)? {
                    if key.kind == KeyEventKind::Press
                        && matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q'))
                    {
                        return Ok(());
                    }
                }
            }
            self.draw_with(|f, area| tail.render(f, area, title, true))?;
        }
    }

    fn teardown(&mut self) -> Result<()> {
        self.restore()
    }
}
