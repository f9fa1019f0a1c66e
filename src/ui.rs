use crate::app::{ActiveInput, App, ConfirmTarget, FormKind, InputMode};
use crate::board::Column;
use crate::notify::Level;
use chrono::{DateTime, NaiveDateTime};
use crossterm::event::{self, Event as CEvent};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

/// Short date for a server datetime, falling back to the raw value.
pub fn format_due(raw: &str) -> String {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(input_mode: &InputMode) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match input_mode {
        InputMode::Normal => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" h/l ", ": Column "),
            key_hint(" j/k ", ": Card "),
            key_hint(" Space ", ": Pick Up "),
            key_hint(" a ", ": Add "),
            key_hint(" e ", ": Edit "),
            key_hint(" d ", ": Delete "),
            key_hint(" r ", ": Reload "),
            key_hint(" b/B ", ": Board "),
            key_hint(" N/R/X ", ": New/Rename/Delete Board "),
        ],
        InputMode::Dragging => vec![
            key_hint(" h/l ", ": Move Over Column "),
            key_hint(" Space/Enter ", ": Drop "),
            key_hint(" Esc ", ": Cancel "),
        ],
        InputMode::Editing => vec![
            key_hint(" i ", ": Insert "),
            key_hint(" Tab ", ": Switch Field "),
            key_hint(" h/l ", ": Column "),
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
        InputMode::Insert => vec![key_hint(" Esc ", ": Stop Typing ")],
        InputMode::Confirm(_) => vec![key_hint(" y ", ": Confirm "), key_hint(" any ", ": Cancel ")],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn toast_color(level: Level) -> Color {
    match level {
        Level::Info => Color::Blue,
        Level::Success => Color::Green,
        Level::Warning => Color::Yellow,
        Level::Danger => Color::Red,
    }
}

fn render_column(f: &mut Frame, app: &App, column: &Column, index: usize, area: Rect) {
    let focused = index == app.cursor_column;
    let border_style = if column.highlighted {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else if focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };
    let title = format!("{} ({})", column.status, column.cards.len());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    if column.cards.is_empty() {
        let list = List::new(vec![ListItem::new(Span::styled(
            "No tasks",
            Style::default().fg(Color::DarkGray),
        ))])
        .block(block);
        f.render_widget(list, area);
        return;
    }

    let items: Vec<ListItem> = column
        .cards
        .iter()
        .map(|card| {
            let mut spans = Vec::new();
            if card.dragging {
                spans.push(Span::styled("» ", Style::default().fg(Color::Magenta)));
            }
            let title_style = if card.dragging {
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            spans.push(Span::styled(card.task.title.clone(), title_style));
            if let Some(due) = &card.task.due_date {
                spans.push(Span::styled(
                    format!("  {}", format_due(due)),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut state = ListState::default();
    if focused {
        state.select(Some(app.cursor_row));
    }
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, area, &mut state);
}

fn render_detail(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Task Details");
    let card = app
        .selected_task_id()
        .and_then(|id| app.board.as_ref().and_then(|b| b.card(id)));

    let Some(card) = card else {
        f.render_widget(Paragraph::new("No task selected").block(block), area);
        return;
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let due = card
        .task
        .due_date
        .as_deref()
        .map(format_due)
        .unwrap_or_else(|| "No due date".to_string());
    let mut lines = vec![
        Line::from(vec![Span::styled("Status: ", bold), Span::raw(card.task.status.to_string())]),
        Line::from(vec![Span::styled("Due Date: ", bold), Span::raw(due)]),
    ];
    let state = format!("{:?}", app.drag.card_state(card.task.id));
    lines.push(Line::from(vec![Span::styled("Sync: ", bold), Span::raw(state)]));
    match card.task.description.as_deref() {
        Some(desc) if !desc.trim().is_empty() => lines.push(Line::from(desc.to_string())),
        _ => lines.push(Line::from(Span::raw("No description"))),
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_form(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.form {
        FormKind::NewTask => "New Task (#n column, due:YYYY-MM-DD)",
        FormKind::EditTask(_) => "Edit Task",
        FormKind::NewBoard => "New Board",
        FormKind::RenameBoard => "Rename Board",
    };
    let is_task_form = matches!(app.form, FormKind::NewTask | FormKind::EditTask(_));

    let popup_width = (area.width * 60 / 100).saturating_sub(2);
    let title_lines = calculate_wrapped_lines(&app.form_title, popup_width).max(1) as u16;
    let mut popup_height = title_lines + 2;
    if is_task_form {
        let description_lines =
            calculate_wrapped_lines(&app.form_description, popup_width).max(1) as u16;
        popup_height += description_lines + 3;
    }
    let popup_height = std::cmp::min(popup_height, area.height.saturating_sub(2));
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let mut lines = vec![Line::from(Span::styled(
        app.form_title.clone(),
        field_style(app.active_input == ActiveInput::Title),
    ))];
    if is_task_form {
        let column = app
            .board
            .as_ref()
            .and_then(|b| b.columns.get(app.form_column))
            .map(|c| c.status.to_string())
            .unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled("Column: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(column),
        ]));
        lines.push(Line::from(Span::styled(
            "Description:",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            app.form_description.clone(),
            field_style(app.active_input == ActiveInput::Description),
        )));
    }

    let popup_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));
    let input = Paragraph::new(lines)
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn render_confirm(f: &mut Frame, target: ConfirmTarget, area: Rect) {
    let question = match target {
        ConfirmTarget::Task(_) => "Delete this task? (y/N)",
        ConfirmTarget::Board => "Delete this board and all its tasks? (y/N)",
    };
    let popup_area = centered_rect_absolute(question.len() as u16 + 4, 3, area);
    let paragraph = Paragraph::new(question)
        .block(Block::default().borders(Borders::ALL).style(Style::default().fg(Color::Red)));
    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

fn render_toasts(f: &mut Frame, app: &App, area: Rect) {
    if app.toasts.is_empty() {
        return;
    }
    let width = std::cmp::min(48, area.width);
    let mut y = area.y;
    for toast in app.toasts.iter() {
        let lines = calculate_wrapped_lines(&toast.message, width.saturating_sub(2)).max(1) as u16;
        let height = lines + 2;
        if y + height > area.y + area.height {
            break;
        }
        let rect = Rect::new(area.x + area.width - width, y, width, height);
        let paragraph = Paragraph::new(toast.message.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(toast_color(toast.level))),
            );
        f.render_widget(Clear, rect);
        f.render_widget(paragraph, rect);
        y += height;
    }
}

fn draw(f: &mut Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(7),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let mut header = match &app.board {
        Some(board) => format!(
            " {} [{}/{}] {} tasks",
            board.name,
            app.board_index + 1,
            app.boards.len(),
            board.card_count()
        ),
        None => " No boards. Press N to create one.".to_string(),
    };
    if let Some(session) = app.drag.session() {
        header.push_str(&format!("  | moving from {}", session.origin));
    }
    f.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    if let Some(board) = &app.board {
        if !board.columns.is_empty() {
            let share = 100 / board.columns.len() as u16;
            let constraints: Vec<Constraint> = board
                .columns
                .iter()
                .map(|_| Constraint::Percentage(share))
                .collect();
            let areas = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(constraints)
                .split(chunks[1]);
            for (index, column) in board.columns.iter().enumerate() {
                render_column(f, app, column, index, areas[index]);
            }
        }
    }

    render_detail(f, app, chunks[2]);

    match app.input_mode {
        InputMode::Editing | InputMode::Insert => render_form(f, app, chunks[1]),
        InputMode::Confirm(target) => render_confirm(f, target, chunks[1]),
        _ => {}
    }

    render_toasts(f, app, chunks[1]);

    let legend = Paragraph::new(get_legend(&app.input_mode))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, chunks[3]);
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<App> {
    loop {
        app.drain_status_updates();
        app.toasts.prune(Instant::now());

        terminal.draw(|f| draw(f, &app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                let should_quit = app.handle_input(key).await?;
                if should_quit {
                    return Ok(app);
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    if max_width == 0 {
        return 0;
    }
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count();
        line_count += line_width.div_ceil(max_width as usize).max(1);
    }
    line_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_due_variants() {
        assert_eq!(format_due("2025-03-01T00:00:00"), "2025-03-01");
        assert_eq!(format_due("2025-03-01T10:30:00.123456"), "2025-03-01");
        assert_eq!(format_due("2025-03-01T10:30:00+03:00"), "2025-03-01");
        assert_eq!(format_due("soon"), "soon");
    }

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("", 10), 0);
        assert_eq!(calculate_wrapped_lines("abc", 10), 1);
        assert_eq!(calculate_wrapped_lines("abcdefghijkl", 10), 2);
        assert_eq!(calculate_wrapped_lines("a\n\nb", 10), 3);
    }

    #[test]
    fn test_wrapped_lines_past_u16_width() {
        let long = "x".repeat(70_000);
        assert_eq!(calculate_wrapped_lines(&long, 100), 700);
    }
}
