use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use vigil_core::Severity;
use vigil_stream::LogEntry;
use vigil_voice::Speaker;

use super::app::App;

/// Render the full console frame.
pub fn render<S: Speaker>(f: &mut Frame, app: &App<S>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // main area
            Constraint::Length(3), // command input
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20), // workspace files
            Constraint::Percentage(55), // transcript
            Constraint::Percentage(25), // metrics + approvals
        ])
        .split(rows[0]);

    render_files(f, app, columns[0]);
    render_transcript(f, app, columns[1]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(4)])
        .split(columns[2]);
    render_metrics(f, app, side[0]);
    render_approvals(f, app, side[1]);

    render_input(f, app, rows[1]);
    render_status_bar(f, app, rows[2]);

    if let Some(review) = &app.review {
        render_review_overlay(f, review, f.area());
    } else if app.gate.is_awaiting() {
        render_confirmation_modal(f, f.area());
    }
}

fn render_files<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let block = Block::default()
        .title(format!(" Workspace ({}) ", app.files.len()))
        .borders(Borders::ALL);
    if app.files.is_empty() {
        let msg = Paragraph::new("no files")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(msg, area);
        return;
    }
    let items: Vec<ListItem> = app
        .files
        .iter()
        .map(|name| ListItem::new(format!(" {name}")))
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn render_transcript<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let title = if app.transcript.is_streaming() {
        " Transcript (streaming...) "
    } else {
        " Transcript "
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    let mut lines: Vec<Line> = Vec::new();
    for entry in app.transcript.entries() {
        lines.extend(entry_lines(entry));
    }
    // Pin the view to the newest output.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(visible);
    let items: Vec<ListItem> = lines.into_iter().skip(skip).map(ListItem::new).collect();
    f.render_widget(List::new(items).block(block), area);
}

/// Format one transcript entry as display lines, role prefix on the first.
pub fn entry_lines(entry: &LogEntry) -> Vec<Line<'static>> {
    let (prefix, style) = match entry {
        LogEntry::User(_) => (
            "> USER: ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        LogEntry::Agent(_) => ("> AGENT: ", Style::default()),
        LogEntry::Info(_) => ("> SYSTEM: ", Style::default().fg(Color::DarkGray)),
    };
    let mut lines = Vec::new();
    for (i, text_line) in entry.text().lines().enumerate() {
        let rendered = if i == 0 {
            format!("{prefix}{text_line}")
        } else {
            format!("  {text_line}")
        };
        lines.push(Line::from(Span::styled(rendered, style)));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(prefix.to_string(), style)));
    }
    lines
}

fn render_metrics<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let block = Block::default().title(" System ").borders(Borders::ALL);
    let content = match &app.metrics {
        Some(status) => {
            let (label, style) = match status.severity() {
                Severity::Critical => (
                    "CRITICAL",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Severity::Nominal => ("NOMINAL", Style::default().fg(Color::Green)),
            };
            vec![
                Line::from(Span::styled(format!(" {label}"), style)),
                Line::from(format!(" {} connections", status.active_connections)),
            ]
        }
        None => vec![Line::from(Span::styled(
            " no data",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_approvals<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let block = Block::default()
        .title(format!(" Approvals ({}) ", app.queue.len()))
        .borders(Borders::ALL);
    if app.queue.is_empty() {
        let msg = Paragraph::new("none pending")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(msg, area);
        return;
    }
    let items: Vec<ListItem> = app
        .queue
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let kind = if request.is_reviewable() { "script" } else { "action" };
            let line = format!(" [{kind}] {}: {}", request.tool, request.description);
            let style = if i == app.selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(line, style)))
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn render_input<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let block = Block::default().title(" Command ").borders(Borders::ALL);
    let input = Paragraph::new(format!("> {}", app.input)).block(block);
    f.render_widget(input, area);
}

fn render_status_bar<S: Speaker>(f: &mut Frame, app: &App<S>, area: Rect) {
    let mut parts = vec![
        "Ctrl-A approve".to_string(),
        "Ctrl-D deny".to_string(),
        "Ctrl-S voice".to_string(),
        "Ctrl-C quit".to_string(),
    ];
    if app.dispatcher.muted() {
        parts.push("MUTED".to_string());
    }
    if !app.authenticated {
        parts.push("NOT LOGGED IN".to_string());
    }
    if let Some(error) = &app.poll_error {
        parts.push(format!("poll: {error}"));
    }
    let bar = Paragraph::new(format!(" {}", parts.join("  |  ")))
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(bar, area);
}

fn render_confirmation_modal(f: &mut Frame, area: Rect) {
    let rect = centered_rect(50, 7, area);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .title(" HIGH RISK ACTION ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(" The agent requests authorization to proceed."),
        Line::from(""),
        Line::from(Span::styled(
            " [y] approve    [n] dismiss",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ])
    .block(block);
    f.render_widget(body, rect);
}

fn render_review_overlay(f: &mut Frame, review: &super::app::ScriptReview, area: Rect) {
    let rect = centered_rect(70, area.height.saturating_sub(6), area);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .title(format!(" Review: {} ", review.tool))
        .title_bottom(" Ctrl-R approve edited    Esc cancel ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let body = Paragraph::new(review.buffer.as_str())
        .wrap(Wrap { trim: false })
        .block(block);
    f.render_widget(body, rect);
}

/// Center a `percent_x`-wide, `height`-tall rect inside `area`.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    // u16 multiplication overflows on very wide terminals.
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect {
        x,
        y,
        width,
        height: height.min(area.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_lines_prefix_roles() {
        let lines = entry_lines(&LogEntry::User("restart gateway".into()));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].spans[0].content.starts_with("> USER: "));

        let lines = entry_lines(&LogEntry::Info("stream error".into()));
        assert!(lines[0].spans[0].content.starts_with("> SYSTEM: "));
    }

    #[test]
    fn entry_lines_indent_continuations() {
        let lines = entry_lines(&LogEntry::Agent("first\nsecond".into()));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].spans[0].content.starts_with("> AGENT: first"));
        assert_eq!(lines[1].spans[0].content, "  second");
    }

    #[test]
    fn empty_entry_still_renders_prefix() {
        let lines = entry_lines(&LogEntry::Agent(String::new()));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[0].content, "> AGENT: ");
    }

    #[test]
    fn centered_rect_survives_very_wide_terminals() {
        let area = Rect::new(0, 0, 10_000, 50);
        let rect = centered_rect(70, 7, area);
        assert_eq!(rect.width, 7000);
        assert!(rect.x + rect.width <= area.width);
    }

    #[test]
    fn centered_rect_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(50, 7, area);
        assert_eq!(rect.width, 50);
        assert_eq!(rect.height, 7);
        assert!(rect.x + rect.width <= area.width);
        assert!(rect.y + rect.height <= area.height);
    }
}
