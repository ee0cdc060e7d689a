use nexus_core::{
    ChatMessage, ChatRole, HealthStatus, MessageKind, Modality, NoticeLevel, UploadView,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::markdown::render_markdown;

const SIDEBAR_WIDTH: u16 = 34;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = if app.controller.show_connection_warning() { 1 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // Header
            Constraint::Length(banner_height), // Connection warning
            Constraint::Min(0),                // Body
            Constraint::Length(1),             // Footer
        ])
        .split(area);

    render_header(app, frame, chunks[0]);
    if banner_height > 0 {
        render_connection_warning(app, frame, chunks[1]);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(chunks[2]);

    render_sidebar(app, frame, body[0]);
    render_chat(app, frame, body[1]);
    render_footer(app, frame, chunks[3]);

    if app.input_mode == InputMode::UploadPath {
        render_upload_prompt(app, frame, area);
    }
    if app.confirm_reset {
        render_reset_confirm(frame, area);
    }

    // Notices sit above everything else
    if app.controller.current_notice().is_some() {
        render_notice(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let dot_color = match app.controller.health() {
        HealthStatus::Checking => Color::Yellow,
        HealthStatus::Online => Color::Green,
        HealthStatus::Offline => Color::Red,
    };

    let header = Line::from(vec![
        Span::styled(" Nexus ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("● ", Style::default().fg(dot_color)),
        Span::styled(app.health_label(), Style::default().fg(Color::White)),
        Span::styled(
            format!("  {}", app.controller.client().base_url()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("  v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(
        Paragraph::new(header).style(Style::default().bg(Color::Black)),
        area,
    );
}

fn render_connection_warning(app: &App, frame: &mut Frame, area: Rect) {
    let text = format!(
        " ⚠ Cannot reach the backend at {}. Is the server running? ",
        app.controller.client().base_url()
    );
    let banner = Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD));
    frame.render_widget(banner, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    render_upload_box(app, frame, chunks[0]);
    render_file_list(app, frame, chunks[1]);
}

fn render_upload_box(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.controller.upload_view();
    let border_color = match view {
        UploadView::Idle => Color::DarkGray,
        UploadView::InProgress { .. } => Color::Yellow,
        UploadView::Completed { .. } => Color::Green,
        UploadView::Failed { .. } => Color::Red,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Upload ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(percent) = view.percent() else {
        let hint = Paragraph::new(vec![
            Line::from(vec![
                Span::styled("Ctrl+O", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::raw(" to add a file"),
            ]),
            Line::from(Span::styled(
                "PDF, DOCX, TXT, PNG, JPG, WEBP",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .wrap(Wrap { trim: true });
        frame.render_widget(hint, inner);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let name = Paragraph::new(view.file_name().unwrap_or_default().to_string())
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(name, rows[0]);

    let status_style = match view {
        UploadView::Failed { .. } => Style::default().fg(Color::Red),
        UploadView::Completed { .. } => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::Gray),
    };
    let status = Paragraph::new(view.status_text())
        .style(status_style)
        .wrap(Wrap { trim: true });
    frame.render_widget(status, rows[1]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(border_color).bg(Color::Black))
        .percent(percent)
        .label(format!("{}%", percent));
    frame.render_widget(gauge, rows[2]);
}

fn render_file_list(app: &App, frame: &mut Frame, area: Rect) {
    let session = app.controller.session();
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Documents · {} ", session.file_count_label()));
    if let Some(id) = session.session_id() {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" session {} ", id),
            Style::default().fg(Color::DarkGray),
        )));
    }

    if session.files().is_empty() {
        let empty = Paragraph::new("No documents yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = session
        .files()
        .iter()
        .map(|file| {
            let icon = match file.modality {
                Modality::Image => "🖼 ",
                _ => "📄 ",
            };
            let mut spans = vec![
                Span::raw(icon),
                Span::raw(file.name.clone()),
                Span::styled(" ✓", Style::default().fg(Color::Green)),
            ];
            if let Some(chunks) = file.chunks {
                spans.push(Span::styled(
                    format!(" ({} chunks)", chunks),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

/// Lines for the whole transcript. User text is shown verbatim; only
/// assistant text is interpreted as Markdown.
pub fn chat_lines(messages: &[ChatMessage], animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for message in messages {
        let (speaker, color) = match message.role {
            ChatRole::User => ("You", Color::Cyan),
            ChatRole::Assistant => ("Nexus", Color::Yellow),
        };
        lines.push(Line::from(vec![
            Span::styled(speaker, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("  {}", message.sent_at.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        match (message.role, message.kind) {
            (_, MessageKind::Typing) => {
                let dots = ".".repeat(animation_frame as usize % 3 + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                )));
            }
            (ChatRole::User, MessageKind::Text) => {
                lines.extend(message.content.lines().map(|l| Line::raw(l.to_string())));
            }
            (ChatRole::Assistant, MessageKind::Text) => {
                lines.extend(render_markdown(&message.content));
            }
        }

        lines.push(Line::default());
    }

    lines
}

/// A run of either whitespace or non-whitespace, possibly spanning styles.
struct Token {
    spans: Vec<Span<'static>>,
    width: usize,
    is_space: bool,
}

fn tokenize(line: &Line<'static>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for span in &line.spans {
        for ch in span.content.chars() {
            let is_space = ch.is_whitespace();
            let ch_width = Span::raw(ch.to_string()).width();
            let start_new = tokens.last().map_or(true, |t| t.is_space != is_space);
            if start_new {
                tokens.push(Token {
                    spans: Vec::new(),
                    width: 0,
                    is_space,
                });
            }
            let Some(token) = tokens.last_mut() else { continue };
            match token.spans.last_mut() {
                Some(last) if last.style == span.style => last.content.to_mut().push(ch),
                _ => token.spans.push(Span::styled(ch.to_string(), span.style)),
            }
            token.width += ch_width;
        }
    }
    tokens
}

/// Word-wrap one line into rows no wider than `width`, keeping span styles.
/// Words longer than a row are split across rows.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }

    let line_style = line.style;
    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;

    let mut flush = |current: &mut Vec<Span<'static>>, current_width: &mut usize| {
        rows.push(Line::from(std::mem::take(current)).style(line_style));
        *current_width = 0;
    };

    // Whitespace is held back until the next word lands on the same row
    let mut pending: Vec<Span<'static>> = Vec::new();
    let mut pending_width = 0;

    for token in tokenize(&line) {
        if token.is_space {
            pending.extend(token.spans);
            pending_width += token.width;
            continue;
        }

        if current_width + pending_width + token.width <= width {
            current.append(&mut pending);
            current.extend(token.spans);
            current_width += pending_width + token.width;
            pending_width = 0;
            continue;
        }

        if current_width > 0 {
            flush(&mut current, &mut current_width);
        }
        pending.clear();
        pending_width = 0;

        if token.width <= width {
            current.extend(token.spans);
            current_width = token.width;
            continue;
        }

        for span in token.spans {
            for ch in span.content.chars() {
                let ch_width = Span::raw(ch.to_string()).width();
                if current_width + ch_width > width && current_width > 0 {
                    flush(&mut current, &mut current_width);
                }
                match current.last_mut() {
                    Some(last) if last.style == span.style => last.content.to_mut().push(ch),
                    _ => current.push(Span::styled(ch.to_string(), span.style)),
                }
                current_width += ch_width;
            }
        }
    }

    if !current.is_empty() {
        flush(&mut current, &mut current_width);
    }
    rows
}

/// Pre-wrap so the row count is exact and scrolling can reach the last row.
fn wrap_lines(lines: Vec<Line<'static>>, width: u16) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .flat_map(|line| wrap_line(line, width as usize))
        .collect()
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    app.chat_area = Some(chunks[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");
    let inner = block.inner(chunks[0]);

    let messages = app.controller.transcript().messages();
    if messages.is_empty() {
        let placeholder = Paragraph::new(vec![
            Line::default(),
            Line::from(Span::styled(
                "Upload a document (Ctrl+O), then ask a question about it.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, chunks[0]);
    } else {
        let lines = wrap_lines(chat_lines(messages, app.animation_frame), inner.width);
        let total_rows = lines.len().min(u16::MAX as usize) as u16;
        let max_scroll = total_rows.saturating_sub(inner.height);
        if app.follow_tail {
            app.chat_scroll = max_scroll;
        } else {
            app.chat_scroll = app.chat_scroll.min(max_scroll);
            if app.chat_scroll == max_scroll {
                app.follow_tail = true;
            }
        }

        let chat = Paragraph::new(Text::from(lines))
            .block(block)
            .scroll((app.chat_scroll, 0));
        frame.render_widget(chat, chunks[0]);
    }

    render_input(app, frame, chunks[1]);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.controller.is_query_in_flight();
    let editing = app.input_mode == InputMode::Editing;

    let (title, border_color) = if busy {
        (" Waiting for answer… ", Color::DarkGray)
    } else if editing {
        (" Ask about your documents (Enter to send) ", Color::Yellow)
    } else {
        (" Ask (press i to type) ", Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);

    // Keep the cursor visible on long input
    let width = inner.width.max(1) as usize;
    let offset = app.query_cursor.saturating_sub(width - 1);
    let visible: String = app.query_input.chars().skip(offset).take(width).collect();

    let text_style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(Paragraph::new(visible).style(text_style).block(block), area);

    if editing && !busy && app.controller.current_notice().is_none() && !app.confirm_reset {
        let cursor_x = (app.query_cursor - offset) as u16;
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().fg(Color::Black).bg(Color::DarkGray);
    let label_style = Style::default().fg(Color::DarkGray);

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().fg(Color::Black).bg(Color::Blue)),
        InputMode::Editing => (" INSERT ", Style::default().fg(Color::Black).bg(Color::Yellow)),
        InputMode::UploadPath => (" UPLOAD ", Style::default().fg(Color::Black).bg(Color::Magenta)),
    };

    let hints = if app.controller.current_notice().is_some() {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" dismiss ", label_style),
        ]
    } else if app.confirm_reset {
        vec![
            Span::styled(" y ", key_style),
            Span::styled(" clear session ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Normal => vec![
                Span::styled(" i ", key_style),
                Span::styled(" ask ", label_style),
                Span::styled(" u ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" Ctrl+L ", key_style),
                Span::styled(" clear ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Ctrl+O ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            InputMode::UploadPath => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" cancel ", label_style),
            ],
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    frame.render_widget(
        Paragraph::new(footer_content).style(Style::default().bg(Color::Black)),
        area,
    );
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

/// One-row slice of `inner` at `offset`, if the popup is tall enough for it.
fn popup_row(inner: Rect, offset: u16) -> Option<Rect> {
    (offset < inner.height && inner.width > 0)
        .then(|| Rect::new(inner.x, inner.y + offset, inner.width, 1))
}

fn render_upload_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 70, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Upload a file ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    // Small terminals get the input row first
    let roomy = inner.height >= 5;
    let (input_offset, hint_offset, types_offset) = if roomy { (2, 0, 4) } else { (0, 1, 2) };

    if let Some(row) = popup_row(inner, hint_offset) {
        let instructions = Paragraph::new("Type or drop a path. Enter to upload, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, row);
    }

    if let Some(input_area) = popup_row(inner, input_offset) {
        let width = input_area.width as usize;
        let offset = app.upload_cursor.saturating_sub(width - 1);
        let visible: String = app.upload_input.chars().skip(offset).take(width).collect();
        frame.render_widget(
            Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
            input_area,
        );

        if app.controller.current_notice().is_none() && !app.confirm_reset {
            let cursor_x = (app.upload_cursor - offset) as u16;
            frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
        }
    }

    if let Some(row) = popup_row(inner, types_offset) {
        let types = Paragraph::new("PDF, DOCX, TXT, PNG, JPEG or WEBP")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(types, row);
    }
}

fn render_reset_confirm(frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 56, 6);
    frame.render_widget(Clear, popup_area);

    let text = vec![
        Line::raw("Clear the session and all uploaded files?"),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().fg(Color::Black).bg(Color::Red)),
            Span::styled(" clear  ", Style::default().fg(Color::DarkGray)),
            Span::styled(" n ", Style::default().fg(Color::Black).bg(Color::DarkGray)),
            Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
        ]),
    ];
    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Clear session "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = app.controller.current_notice() else {
        return;
    };

    let (title, color) = match notice.level {
        NoticeLevel::Info => (" Notice ", Color::Cyan),
        NoticeLevel::Warning => (" Warning ", Color::Yellow),
        NoticeLevel::Error => (" Error ", Color::Red),
    };

    let popup_area = centered_popup(area, 60, 8);
    frame.render_widget(Clear, popup_area);

    let text = vec![
        Line::raw(notice.text.clone()),
        Line::default(),
        Line::from(Span::styled("Press Enter to dismiss", Style::default().fg(Color::DarkGray))),
    ];
    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(title),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
