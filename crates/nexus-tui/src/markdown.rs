//! Markdown to styled terminal lines for assistant messages.
//!
//! Only bot output goes through here; user text is shown verbatim.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// `None` for bullets, `Some(n)` for the next number of an ordered list.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    /// Cells already written on the current table row.
    table_cells: usize,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![Style::default()],
            lists: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            table_cells: 0,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let next = f(self.style());
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn prefix(&self) -> Option<Span<'static>> {
        if self.quote_depth == 0 {
            None
        } else {
            Some(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ))
        }
    }

    fn text(&mut self, text: &str) {
        if self.current.is_empty() {
            if let Some(prefix) = self.prefix() {
                self.current.push(prefix);
            }
        }
        self.current.push(Span::styled(text.to_string(), self.style()));
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

fn heading_style(level: HeadingLevel) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => base.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => base.fg(Color::Cyan),
        _ => base,
    }
}

pub fn render_markdown(markdown: &str) -> Vec<Line<'static>> {
    let mut out = LineBuilder::new();
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                out.blank();
                out.push_style(|_| heading_style(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                out.pop_style();
                out.blank();
            }
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => {
                if out.lists.is_empty() {
                    out.blank();
                } else {
                    out.flush();
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                out.flush();
                out.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        out.lines.push(Line::from(Span::styled(
                            format!("  {}", lang),
                            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                        )));
                    }
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                out.in_code_block = false;
                out.blank();
            }
            Event::Start(Tag::List(start)) => {
                out.flush();
                out.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                out.lists.pop();
                if out.lists.is_empty() {
                    out.blank();
                }
            }
            Event::Start(Tag::Item) => {
                out.flush();
                let depth = out.lists.len().saturating_sub(1);
                let marker = match out.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                out.text(&format!("{}{}", "  ".repeat(depth), marker));
            }
            Event::End(TagEnd::Item) => out.flush(),
            Event::Start(Tag::BlockQuote(_)) => {
                out.flush();
                out.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                out.flush();
                out.quote_depth = out.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::Table(_)) => out.blank(),
            Event::End(TagEnd::Table) => out.blank(),
            Event::Start(Tag::TableHead) => {
                out.flush();
                out.table_cells = 0;
                out.push_style(|s| s.add_modifier(Modifier::BOLD));
            }
            Event::End(TagEnd::TableHead) => {
                out.pop_style();
                let width = out.current.iter().map(|s| s.width()).sum::<usize>();
                out.flush();
                out.lines.push(Line::from(Span::styled(
                    "─".repeat(width),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            Event::Start(Tag::TableRow) => {
                out.flush();
                out.table_cells = 0;
            }
            Event::End(TagEnd::TableRow) => out.flush(),
            Event::Start(Tag::TableCell) => {
                if out.table_cells > 0 {
                    out.current.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
                out.table_cells += 1;
            }
            Event::End(TagEnd::TableCell) => {}
            Event::Start(Tag::Strong) => out.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Event::Start(Tag::Emphasis) => out.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Event::Start(Tag::Strikethrough) => {
                out.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT))
            }
            Event::Start(Tag::Link { .. }) => {
                out.push_style(|s| s.fg(Color::Blue).add_modifier(Modifier::UNDERLINED))
            }
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough | TagEnd::Link) => {
                out.pop_style()
            }
            Event::Code(code) => {
                out.push_style(|_| Style::default().fg(Color::Yellow));
                out.text(&code);
                out.pop_style();
            }
            Event::Text(text) => {
                if out.in_code_block {
                    for line in text.lines() {
                        out.lines.push(Line::from(Span::styled(
                            format!("  {}", line),
                            Style::default().fg(Color::Green),
                        )));
                    }
                } else {
                    out.text(&text);
                }
            }
            Event::SoftBreak => out.text(" "),
            Event::HardBreak => out.flush(),
            Event::Rule => {
                out.flush();
                out.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    out.finish()
}
