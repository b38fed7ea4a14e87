//! UI pane drawing module for tern.
//!
//! Draws the three columns: the parent directory, the working directory and the preview
//! of the file under the cursor, which is either another directory listing or the head
//! of a regular file.
//!
//! Used internally by ui::render

use crate::core::{Dir, FileEntry, Reg, sanitize_to_exact_width};

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
};

use std::collections::HashSet;
use std::path::PathBuf;

const MARKER: &str = "*";

/// Styles used for rendering items in a pane
pub struct PaneStyles {
    pub item: Style,
    pub dir: Style,
    pub exec: Style,
    pub symlink: Style,
    pub cursor: Style,
    pub marker: Style,
}

impl Default for PaneStyles {
    fn default() -> Self {
        PaneStyles {
            item: Style::default(),
            dir: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            exec: Style::default().fg(Color::Green),
            symlink: Style::default().fg(Color::Cyan),
            cursor: Style::default().add_modifier(Modifier::REVERSED),
            marker: Style::default().fg(Color::Magenta),
        }
    }
}

impl PaneStyles {
    pub fn get_style(&self, entry: &FileEntry) -> Style {
        if entry.is_dir() {
            self.dir
        } else if entry.is_symlink() {
            self.symlink
        } else if entry.is_executable() {
            self.exec
        } else {
            self.item
        }
    }
}

/// Draws a directory listing with its cursor.
///
/// `active` is true for the working directory. Other listings show the cursor dimmed.
pub fn draw_dir(
    frame: &mut Frame,
    area: Rect,
    dir: Option<&Dir>,
    markers: &HashSet<PathBuf>,
    styles: &PaneStyles,
    active: bool,
) {
    let Some(dir) = dir else {
        return;
    };

    let notice = if dir.is_loading() && dir.files().is_empty() {
        Some("loading...")
    } else if let Some(err) = dir.error() {
        Some(err)
    } else if dir.files().is_empty() {
        Some("empty")
    } else {
        None
    };
    if let Some(text) = notice {
        let line = Line::from(Span::styled(
            text.to_string(),
            Style::default().add_modifier(Modifier::DIM),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = dir
        .files()
        .iter()
        .map(|entry| {
            let marked = markers.contains(&dir.path().join(entry.name()));
            let lead = if marked {
                Span::styled(MARKER, styles.marker)
            } else {
                Span::raw(" ")
            };
            let name = sanitize_to_exact_width(&entry.name_str(), width);
            ListItem::new(Line::from(vec![
                lead,
                Span::styled(name, styles.get_style(entry)),
                Span::raw(" "),
            ]))
        })
        .collect();

    let cursor = if active {
        styles.cursor
    } else {
        styles.cursor.add_modifier(Modifier::DIM)
    };
    let mut state = ListState::default()
        .with_offset(dir.ind().saturating_sub(dir.pos()))
        .with_selected(Some(dir.ind()));
    frame.render_stateful_widget(List::new(items).highlight_style(cursor), area, &mut state);
}

/// Draws the first lines of a regular file.
pub fn draw_reg(frame: &mut Frame, area: Rect, reg: Option<&Reg>) {
    let Some(reg) = reg else {
        return;
    };
    if reg.is_loading() {
        frame.render_widget(Paragraph::new("loading..."), area);
        return;
    }
    let width = area.width as usize;
    let lines: Vec<Line> = reg
        .lines()
        .iter()
        .take(area.height as usize)
        .map(|l| Line::raw(sanitize_to_exact_width(l, width)))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}
