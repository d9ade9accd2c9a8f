use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

const LINE_PREFIX_WIDTH: usize = 9; // "{:6} | " = 9 characters

// Help overlay dimensions (as percentage of screen)
const HELP_POPUP_WIDTH_PERCENT: f32 = 0.5;
const HELP_POPUP_HEIGHT_PERCENT: f32 = 0.6;

const SELECTED_BG: Color = Color::DarkGray;

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.area());

    render_record_list(f, chunks[0], app);
    render_status_bar(f, chunks[1], app);

    if app.show_help {
        render_help_overlay(f, f.area());
    }
}

fn render_record_list(f: &mut Frame, area: Rect, app: &mut App) {
    let w = app.window.lock().unwrap();
    let available_width = area.width.saturating_sub(2) as usize; // Account for borders
    let content_width = available_width.saturating_sub(LINE_PREFIX_WIDTH);
    let focus = w.focus();

    let prefix_style = Style::default().fg(Color::DarkGray);
    let mut items: Vec<ListItem> = Vec::with_capacity(w.len());
    for (rec, tree) in w.iter() {
        let prefix = format!("{:6} | ", rec.line + 1);
        if tree.is_expanded() {
            let mut lines = Vec::with_capacity(tree.lines().len());
            for (row, text) in tree.lines().iter().enumerate() {
                let lead = if row == 0 {
                    prefix.clone()
                } else {
                    " ".repeat(LINE_PREFIX_WIDTH)
                };
                lines.push(Line::from(vec![
                    Span::styled(lead, prefix_style),
                    Span::raw(truncate_to_width(text, content_width)),
                ]));
            }
            items.push(ListItem::new(Text::from(lines)));
        } else {
            items.push(ListItem::new(Line::from(vec![
                Span::styled(prefix, prefix_style),
                Span::raw(truncate_to_width(tree.preview(), content_width)),
            ])));
        }
    }

    let selected = if w.is_empty() { None } else { Some(focus) };
    drop(w);
    app.list_state.select(selected);

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(app.file_name.clone()),
        )
        .highlight_style(
            Style::default()
                .bg(SELECTED_BG)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let w = app.window.lock().unwrap();
    let mut spans = vec![Span::styled(
        format!(" {} ", app.file_name),
        Style::default().add_modifier(Modifier::BOLD),
    )];

    if let Some((rec, _)) = w.get(w.focus()) {
        spans.push(Span::raw(format!("| line {} ", rec.line + 1)));
    }
    if let (Some(first), Some(last)) = (w.head(), w.tail()) {
        spans.push(Span::styled(
            format!("| loaded {}..{} ", first.line + 1, last.line + 1),
            Style::default().fg(Color::DarkGray),
        ));
    }
    drop(w);

    if let Some(err) = &app.last_error {
        spans.push(Span::styled(
            format!("| {} ", err),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        "| h help | q quit",
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_help_overlay(f: &mut Frame, area: Rect) {
    let popup_width = (area.width as f32 * HELP_POPUP_WIDTH_PERCENT) as u16;
    let popup_height = (area.height as f32 * HELP_POPUP_HEIGHT_PERCENT) as u16;
    let popup_area = Rect {
        x: area.x + (area.width.saturating_sub(popup_width)) / 2,
        y: area.y + (area.height.saturating_sub(popup_height)) / 2,
        width: popup_width,
        height: popup_height,
    };

    let accent = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let help_lines = vec![
        Line::from(Span::styled("LazyView - Quick Reference", accent)),
        Line::from(""),
        Line::from(Span::styled("Navigation", accent)),
        Line::from("  j/k, ↑/↓      Move focus down/up"),
        Line::from("  PageUp/Down   Move focus by a page"),
        Line::from("  g / G         First / last loaded record"),
        Line::from(""),
        Line::from(Span::styled("Records", accent)),
        Line::from("  Space, Enter  Expand/collapse focused record"),
        Line::from("  →             Expand"),
        Line::from("  ←             Collapse"),
        Line::from(""),
        Line::from(Span::styled("Other", accent)),
        Line::from("  h, F1         This help"),
        Line::from("  q, F8, Esc    Quit"),
        Line::from(""),
        Line::from("Press any key to close"),
    ];

    let paragraph = Paragraph::new(help_lines)
        .block(Block::default().borders(Borders::ALL).title("Help"));

    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

/// Cut a line to the given display width (wide characters counted).
fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut width = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}
