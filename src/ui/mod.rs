use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{Overlay, TextInput, ViewState};
use crate::store::FilterMode;

pub fn draw_app(frame: &mut Frame, state: &ViewState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    frame.render_widget(build_header(state), vertical[0]);
    frame.render_widget(build_filter_tabs(state), vertical[1]);

    let text_width = vertical[2].width.saturating_sub(8) as usize;
    let mut items = Vec::with_capacity(state.len());
    for note in state.rows() {
        let (marker, text_style) = if note.completed {
            (
                "[x] ",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::CROSSED_OUT),
            )
        } else {
            ("[ ] ", Style::default().add_modifier(Modifier::BOLD))
        };
        let text_line = Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(truncate_to_width(&note.text, text_width), text_style),
        ]);
        let date_line = Line::from(Span::styled(
            format!("    {}", note.date),
            Style::default().fg(Color::DarkGray),
        ));
        items.push(ListItem::new(vec![text_line, date_line]));
    }
    if items.is_empty() {
        let empty = if state.counts().all == 0 {
            "No notes yet. Press `a` to create one."
        } else {
            "No notes match this filter."
        };
        items.push(ListItem::new(empty));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title("Notes")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, vertical[2], list_state);

    let status = Paragraph::new(build_status_lines(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, vertical[3]);

    render_overlay(frame, state);
}

fn build_header(state: &ViewState) -> Paragraph<'static> {
    let mut spans = vec![Span::styled(
        "Offline Notes",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if !state.online {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            " ⚡ Offline mode ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if state.install_available {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "[i] Install",
            Style::default().fg(Color::Green),
        ));
    }
    let bell = if state.notifications_enabled {
        "[n] Notifications on"
    } else {
        "[n] Notifications off"
    };
    spans.push(Span::raw("  "));
    spans.push(Span::styled(bell, Style::default().fg(Color::Gray)));
    Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL))
}

fn build_filter_tabs(state: &ViewState) -> Tabs<'static> {
    let counts = state.counts();
    let titles: Vec<Line> = FilterMode::iter()
        .enumerate()
        .map(|(idx, mode)| {
            Line::from(format!(
                "{} {} ({})",
                idx + 1,
                mode.label(),
                counts.for_mode(mode)
            ))
        })
        .collect();
    let selected = FilterMode::iter()
        .position(|mode| mode == state.filter)
        .unwrap_or(0);
    Tabs::new(titles)
        .select(selected)
        .block(Block::default().title("Filter [f]").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
}

fn build_status_lines(state: &ViewState) -> Vec<Line<'static>> {
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, state.len())
    };
    let mut lines = vec![Line::from(vec![
        Span::raw("Showing: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | a add • e edit • space done • d delete • f filter • q quit"),
    ])];
    if let Some(message) = state.status_message() {
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines
}

fn render_overlay(frame: &mut Frame, state: &ViewState) {
    match state.overlay() {
        Some(Overlay::AddNote(input)) => {
            render_input(frame, "New Note", "Add a note", input);
        }
        Some(Overlay::EditNote { note_id, input }) => {
            render_input(frame, "Edit Note", &format!("Editing note #{note_id}"), input);
        }
        Some(Overlay::ConfirmDelete { text, .. }) => {
            render_dialog(
                frame,
                "Delete Note",
                Color::Red,
                vec![
                    Line::from("Delete this note?"),
                    Line::from(""),
                    Line::from(Span::styled(
                        text.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    hint_line("Enter/y to delete • Esc/n to cancel"),
                ],
            );
        }
        Some(Overlay::ConfirmInstall) => {
            render_dialog(
                frame,
                "Install",
                Color::Green,
                vec![
                    Line::from("Install Offline Notes on this device?"),
                    Line::from("This creates the data directories and a config file."),
                    Line::from(""),
                    hint_line("Enter/y to install • Esc/n to dismiss"),
                ],
            );
        }
        Some(Overlay::Alert(message)) => {
            render_dialog(
                frame,
                "Alert",
                Color::Red,
                vec![
                    Line::from(message.clone()),
                    Line::from(""),
                    hint_line("Enter to close"),
                ],
            );
        }
        None => {}
    }
}

fn render_input(frame: &mut Frame, title: &str, heading: &str, input: &TextInput) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            heading.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input.value().to_string()),
        Line::from(""),
        hint_line("Enter to save • Esc to cancel"),
    ])
    .block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(paragraph, area);

    let offset = input.before_cursor().width() as u16;
    let max_x = area.x + area.width.saturating_sub(2);
    let cursor_x = (area.x + 1 + offset).min(max_x);
    frame.set_cursor(cursor_x, area.y + 3);
}

fn render_dialog(frame: &mut Frame, title: &str, accent: Color, lines: Vec<Line<'static>>) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn hint_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::Gray),
    ))
}

/// Cuts `text` to at most `max_width` terminal columns, ending in `…` when
/// shortened.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w + 1 > max_width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
