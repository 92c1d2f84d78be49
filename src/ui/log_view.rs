//! Backend log viewer
//!
//! `LogTail` follows a file that another process appends to, keeping only
//! the most recent lines. The file is the record; this is just a window.

use crate::theme::{Styles, Theme, UiConstants, UiText};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Incremental reader over an append-only log file.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    /// Trailing bytes of an unterminated last line
    partial: Vec<u8>,
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, UiConstants::LOG_TAIL_LINES)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            partial: Vec::new(),
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Start following at byte `offset`, so earlier runs appended to the
    /// same log are not shown.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Read whatever was appended since the last call. Returns the number of
    /// complete lines added. A missing file is not an error.
    pub fn refresh(&mut self) -> io::Result<usize> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            // Truncated underneath us; start over
            self.offset = 0;
            self.partial.clear();
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        let read = file.read_to_end(&mut buf)?;
        self.offset += read as u64;

        self.partial.extend_from_slice(&buf);
        let mut added = 0;
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1])
                .trim_end_matches('\r')
                .to_string();
            self.push(text);
            added += 1;
        }
        Ok(added)
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Retained lines plus the unterminated tail, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn partial_line(&self) -> Option<String> {
        (!self.partial.is_empty()).then(|| String::from_utf8_lossy(&self.partial).to_string())
    }

    /// Render the last lines that fit, with a status footer.
    pub fn render(&self, f: &mut Frame, area: Rect, title: &str, finished: bool) {
        let width = (u32::from(area.width) * u32::from(UiConstants::LOG_VIEW_PCT) / 100) as u16;
        let height = (u32::from(area.height) * u32::from(UiConstants::LOG_VIEW_PCT) / 100) as u16;
        let rect = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border_active())
            .title(Span::styled(format!(" {} ", title), Styles::title()))
            .title_bottom(Line::from(Span::styled(
                format!(" {} ", self.path.display()),
                Styles::text_muted(),
            )))
            .style(Styles::panel_bg());
        let inner = block.inner(rect);
        f.render_widget(Clear, rect);
        f.render_widget(block, rect);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let visible = chunks[0].height as usize;
        let partial = self.partial_line();
        let all: Vec<&str> = self.lines().chain(partial.as_deref()).collect();
        let start = all.len().saturating_sub(visible);
        let text: Vec<Line> = all[start..]
            .iter()
            .map(|line| Line::from(Span::styled(line.to_string(), Theme::log_line_style(line))))
            .collect();
        f.render_widget(Paragraph::new(text), chunks[0]);

        let hint = if finished {
            UiText::HINT_LOG_DONE
        } else {
            UiText::HINT_LOG_RUNNING
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Styles::text_muted())
                .alignment(Alignment::Center),
            chunks[1],
        );
    }
}
