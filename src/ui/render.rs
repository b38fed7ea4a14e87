//! UI renderer implementation.
//!
//! Contains the top-level `render` entry point used by the reactor and the layout that
//! splits the screen into the path line, the three panes and the status line.
//!
//! This module should stay "pure rendering": it reads the state and produces widgets,
//! without changing anything.

use crate::app::AppState;
use crate::app::cmdline::JOB_PREFIX;
use crate::app::reactor::CHROME_ROWS;
use crate::core::{format_file_size, format_file_time};
use crate::ui::panes::{self, PaneStyles};
use crate::utils::shorten_home_path;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Render function which renders the entire terminal UI for tern on each frame.
pub(crate) fn render(frame: &mut Frame, app: &AppState) {
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(CHROME_ROWS - 1),
    ])
    .split(frame.area());

    render_header(frame, app, rows[0]);
    render_panes(frame, app, rows[1]);
    render_status(frame, app, rows[2]);
}

fn render_header(frame: &mut Frame, app: &AppState, area: Rect) {
    let Some(wd) = app.nav().wd() else {
        return;
    };
    let mut spans = vec![Span::styled(
        shorten_home_path(wd),
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
    )];
    if let Some(file) = app.nav().curr_file() {
        if wd.parent().is_some() {
            spans.push(Span::raw("/"));
        }
        spans.push(Span::styled(
            file.name_str().into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_panes(frame: &mut Frame, app: &AppState, area: Rect) {
    let ratios: &[u16] = if app.opts().preview() {
        &[1, 2, 3]
    } else {
        &[1, 2]
    };
    let chunks = Layout::horizontal(ratios.iter().map(|&r| Constraint::Fill(r))).split(area);

    let nav = app.nav();
    let styles = PaneStyles::default();
    let markers = nav.markers();

    panes::draw_dir(frame, chunks[0], nav.parent_dir(), markers, &styles, false);
    panes::draw_dir(frame, chunks[1], nav.curr_dir(), markers, &styles, true);

    if chunks.len() < 3 {
        return;
    }
    let (Some(file), Some(path)) = (nav.curr_file(), nav.curr_path()) else {
        return;
    };
    if file.is_dir() {
        panes::draw_dir(frame, chunks[2], nav.dir(&path), markers, &styles, false);
    } else {
        panes::draw_reg(frame, chunks[2], nav.reg(&path));
    }
}

fn render_status(frame: &mut Frame, app: &AppState, area: Rect) {
    let [left, right] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(ruler_width(app))]).areas(area);

    frame.render_widget(Paragraph::new(status_line(app)), left);
    frame.render_widget(Paragraph::new(ruler(app)).right_aligned(), right);
}

/// The left part of the status line: the command line while it is open, otherwise the
/// last message or the file under the cursor.
fn status_line(app: &AppState) -> Line<'static> {
    let cmdline = app.cmdline();

    if cmdline.shows_job()
        && let Some(job) = app.job()
    {
        return Line::from(vec![
            Span::styled(
                format!("{} ", job.mode().prefix()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(job.output().to_string()),
            Span::raw("  "),
            Span::styled(
                format!("{JOB_PREFIX}{}", cmdline.buffer()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]);
    }

    if let Some(prefix) = cmdline.prefix() {
        return Line::from(vec![
            Span::raw(prefix.to_string()),
            Span::raw(cmdline.buffer().to_string()),
            Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
        ]);
    }

    if !cmdline.message().is_empty() {
        let style = if cmdline.is_err() {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        return Line::from(Span::styled(cmdline.message().to_string(), style));
    }

    match app.nav().curr_file() {
        Some(file) => Line::from(Span::styled(
            format!(
                "{}  {}",
                format_file_size(file.size()),
                format_file_time(file.modified())
            ),
            Style::default().fg(Color::DarkGray),
        )),
        None => Line::default(),
    }
}

/// The right part: running file operations, marked count and cursor position.
fn ruler(app: &AppState) -> String {
    let mut parts = Vec::new();

    let progress = app.progress();
    if progress.copy_total() > 0 {
        let pct = progress.copy_bytes().clamp(0, progress.copy_total()) * 100 / progress.copy_total();
        parts.push(format!(
            "[copy {pct}% of {}]",
            format_file_size(progress.copy_total().unsigned_abs())
        ));
    }
    if progress.move_total() > 0 {
        parts.push(format!("[move {}/{}]", progress.move_count(), progress.move_total()));
    }
    if progress.delete_total() > 0 {
        parts.push(format!(
            "[delete {}/{}]",
            progress.delete_count(),
            progress.delete_total()
        ));
    }

    let marked = app.nav().markers().len();
    if marked > 0 {
        parts.push(format!("{marked} marked"));
    }

    if let Some(dir) = app.nav().curr_dir()
        && !dir.files().is_empty()
    {
        parts.push(format!("{}/{}", dir.ind() + 1, dir.files().len()));
    }
    parts.join("  ")
}

fn ruler_width(app: &AppState) -> u16 {
    ruler(app).chars().count().min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Config;
    use crate::core::worker::{ProgressDelta, Workers};

    use crossbeam_channel::{bounded, unbounded};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn status_shows_error_and_ruler() -> Result<(), Box<dyn std::error::Error>> {
        let config = Config::default();
        let (quit_tx, _quit_rx) = bounded(1);
        let (expr_tx, _expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx.clone());
        let mut app = AppState::new(&config, workers, quit_tx, expr_tx);

        app.echoerr("something broke");
        app.progress.apply(ProgressDelta::MoveTotal(4));
        app.progress.apply(ProgressDelta::MoveCount(1));

        let mut terminal = Terminal::new(TestBackend::new(60, 6))?;
        terminal.draw(|f| render(f, &app))?;
        let text = screen_text(&terminal);
        assert!(text.contains("something broke"));
        assert!(text.contains("[move 1/4]"));
        Ok(())
    }

    #[test]
    fn open_cmdline_replaces_message() -> Result<(), Box<dyn std::error::Error>> {
        let config = Config::default();
        let (quit_tx, _quit_rx) = bounded(1);
        let (expr_tx, _expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx.clone());
        let mut app = AppState::new(&config, workers, quit_tx, expr_tx);

        app.echomsg("hello");
        app.cmdline.open('$');
        app.cmdline.insert("ls");

        let mut terminal = Terminal::new(TestBackend::new(40, 4))?;
        terminal.draw(|f| render(f, &app))?;
        let text = screen_text(&terminal);
        assert!(text.contains("$ls"));
        assert!(!text.contains("hello"));
        Ok(())
    }
}
