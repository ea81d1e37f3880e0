use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use plant_pal::state::Message;
use crate::app::{App, InputMode};

/// Most composer rows shown before the draft scrolls
const MAX_COMPOSER_ROWS: u16 = 4;

/// Wrap text to fit within a given width, returning multiple lines.
/// Breaks at word boundaries; words wider than the line are split.
/// Widths are terminal columns, so emoji and CJK count double.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let mut word = word;

        // Overlong word: flush and emit full-width chunks
        while word.width() > width {
            if current_width > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            let (head, rest) = split_at_column(word, width);
            lines.push(head.to_string());
            word = rest;
        }

        let word_width = word.width();
        if word.is_empty() {
            continue;
        }

        if current_width == 0 {
            current_line = word.to_string();
            current_width = word_width;
        } else if current_width + 1 + word_width <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::replace(&mut current_line, word.to_string()));
            current_width = word_width;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Split `s` after at most `columns` display columns (always at least one char)
fn split_at_column(s: &str, columns: usize) -> (&str, &str) {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if idx > 0 && used + w > columns {
            return s.split_at(idx);
        }
        used += w;
    }
    (s, "")
}

/// The part of `line` between display columns `skip` and `skip + max`
fn column_window(line: &str, skip: usize, max: usize) -> String {
    let mut col = 0;
    let mut used = 0;
    let mut out = String::new();
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if col < skip {
            col += w;
            continue;
        }
        if used + w > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out
}

/// Longest suffix of `s` that fits in `max` display columns
fn tail_columns(s: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > max {
            return &s[idx + c.len_utf8()..];
        }
        used += w;
    }
    s
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Markdown heading text (`# Watering` -> `Watering`)
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let stripped = trimmed.trim_start_matches('#');
    if stripped.len() < trimmed.len() && stripped.starts_with(' ') {
        Some(stripped.trim())
    } else {
        None
    }
}

/// Rewrite `* item` / `- item` bullets with a bullet glyph
fn bullet_text(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("- "))
        .map(|rest| format!("• {}", rest))
}

fn role_line(msg: &Message) -> Line<'static> {
    let (label, color) = match (msg.is_bot(), msg.failed) {
        (false, _) => ("You:", Color::Cyan),
        (true, false) => ("Plant Pal:", Color::Green),
        (true, true) => ("Plant Pal (error):", Color::Red),
    };
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn push_body_lines(lines: &mut Vec<Line<'static>>, msg: &Message, width: usize) {
    for raw in msg.text.lines() {
        if !msg.is_bot() {
            lines.extend(wrap_text_to_width(raw, width).into_iter().map(Line::from));
        } else if msg.failed {
            lines.extend(
                wrap_text_to_width(raw, width)
                    .into_iter()
                    .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::Red)))),
            );
        } else if let Some(heading) = heading_text(raw) {
            lines.extend(wrap_text_to_width(heading, width).into_iter().map(|l| {
                Line::from(Span::styled(
                    l,
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ))
            }));
        } else {
            let text = bullet_text(raw).unwrap_or_else(|| raw.to_string());
            lines.extend(
                wrap_text_to_width(&text, width)
                    .iter()
                    .map(|l| parse_markdown_line(l)),
            );
        }
    }
}

/// Transcript rendered as pre-wrapped lines, typing indicator included
pub fn transcript_lines(
    messages: &[Message],
    sending: bool,
    animation_frame: u8,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in messages {
        lines.push(role_line(msg));
        if let Some(image) = &msg.image {
            lines.extend(
                wrap_text_to_width(&format!("📎 {}", image.file_name), width)
                    .into_iter()
                    .map(|l| {
                        Line::from(Span::styled(
                            l,
                            Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
                        ))
                    }),
            );
        }
        push_body_lines(&mut lines, msg, width);
        lines.push(Line::default());
    }

    if sending {
        lines.push(Line::from(Span::styled(
            "Plant Pal:",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

pub fn transcript_line_count(messages: &[Message], sending: bool, width: usize) -> u16 {
    let count = transcript_lines(messages, sending, 0, width).len();
    count.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let staged_height = u16::from(app.conversation.composer().staged_image().is_some());
    let status_height = u16::from(app.status.is_some());
    let draft_rows = (app.conversation.composer().draft().split('\n').count() as u16)
        .clamp(1, MAX_COMPOSER_ROWS);

    let [header_area, transcript_area, staged_area, status_area, composer_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(staged_height),
            Constraint::Length(status_height),
            Constraint::Length(draft_rows + 2),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, transcript_area);
    if staged_height > 0 {
        render_staged_image(app, frame, staged_area);
    }
    if let Some(status) = &app.status {
        let notice = Paragraph::new(format!(" {}", status)).style(Style::default().fg(Color::Red));
        frame.render_widget(notice, status_area);
    }
    render_composer(app, frame, composer_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::Attaching {
        render_attach_prompt(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let credential_indicator = if app.has_credential {
        String::new()
    } else {
        " [no API key]".to_string()
    };

    let title = Line::from(vec![
        Span::styled(" 🌿 Robo AI - Plant Pal ", Style::default().fg(Color::Green).bold()),
        Span::styled(format!("{} ", app.model_label), Style::default().fg(Color::Gray)),
        Span::styled(credential_indicator, Style::default().fg(Color::Red)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let inner = block.inner(area);
    app.transcript_area = Some(area);
    // One column reserved for the scrollbar
    app.transcript_width = inner.width.saturating_sub(1);
    app.transcript_height = inner.height;

    let lines = transcript_lines(
        app.conversation.transcript(),
        app.conversation.is_sending(),
        app.animation_frame,
        app.transcript_width as usize,
    );
    let total_lines = lines.len();

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.transcript_scroll, 0));
    frame.render_widget(paragraph, area);

    if total_lines > app.transcript_height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(
            total_lines.saturating_sub(app.transcript_height as usize),
        )
        .position(app.transcript_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_staged_image(app: &App, frame: &mut Frame, area: Rect) {
    let Some(image) = app.conversation.composer().staged_image() else {
        return;
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" 📎 {} ", image.file_name()),
            Style::default().fg(Color::Magenta).bold(),
        ),
        Span::styled(
            format!("({}, {}) ", format_size(image.size_bytes()), image.media_type()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(image.preview_uri().to_string(), Style::default().fg(Color::DarkGray)),
        Span::styled("  Ctrl+X to remove", Style::default().fg(Color::DarkGray).italic()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Row and display column of the cursor inside a multi-line draft
fn cursor_row_col(draft: &str, cursor: usize) -> (usize, usize) {
    let before: String = draft.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map_or(0, |l| l.width());
    (row, col)
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let composer = app.conversation.composer();
    let editing = app.input_mode == InputMode::Composing;

    let border_color = if app.conversation.is_sending() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask about your plant... ");

    let inner = block.inner(area);
    let inner_width = inner.width as usize;
    let visible_rows = inner.height.max(1) as usize;

    let (cursor_row, cursor_col) = cursor_row_col(composer.draft(), composer.cursor());

    // Keep the cursor row and column on screen
    let row_offset = (cursor_row + 1).saturating_sub(visible_rows);
    let col_offset = if inner_width == 0 || cursor_col < inner_width {
        0
    } else {
        cursor_col - inner_width + 1
    };

    let visible: Vec<Line> = composer
        .draft()
        .split('\n')
        .skip(row_offset)
        .take(visible_rows)
        .map(|l| Line::from(column_window(l, col_offset, inner_width)))
        .collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing && inner.width > 0 && inner.height > 0 {
        frame.set_cursor_position((
            inner.x + (cursor_col - col_offset) as u16,
            inner.y + (cursor_row - row_offset) as u16,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Composing => Style::default().bg(Color::Green).fg(Color::Black),
        InputMode::Attaching => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Composing if app.conversation.is_sending() => " WAITING ",
        InputMode::Composing => " CHAT ",
        InputMode::Attaching => " ATTACH ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let disabled_style = Style::default().bg(Color::Black).fg(Color::DarkGray);

    let hints = match app.input_mode {
        InputMode::Composing => {
            let send_style = if app.conversation.can_send() { label_style } else { disabled_style };
            let mut hints = vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", send_style),
                Span::styled(" Shift+Enter ", key_style),
                Span::styled(" newline ", label_style),
                Span::styled(" Ctrl+O ", key_style),
                Span::styled(" attach ", label_style),
            ];
            if app.conversation.composer().staged_image().is_some() {
                hints.extend(vec![
                    Span::styled(" Ctrl+X ", key_style),
                    Span::styled(" remove image ", label_style),
                ]);
            }
            hints.extend(vec![
                Span::styled(" PgUp/PgDn ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
        InputMode::Attaching => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" attach ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
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

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_attach_prompt(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered), clamped to the frame
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 6.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height).intersection(area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach a plant photo ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    // The input row wins when there is no room for the instructions
    let input_row = if inner.height >= 3 {
        let instructions = Paragraph::new("Path to an image file. Enter to attach, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));
        2
    } else {
        0
    };

    // Show the tail of long paths, leaving a column for the cursor
    let input_area = Rect::new(inner.x, inner.y + input_row, inner.width, 1);
    let visible = tail_columns(&app.attach_input, (input_area.width as usize).saturating_sub(1));
    let cursor_x = input_area.x + visible.width() as u16;

    let input = Paragraph::new(visible.to_string()).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    frame.set_cursor_position((cursor_x, input_area.y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plant_pal::preview::StagedImage;
    use plant_pal::state::ImageRef;
    use plant_pal::{AdapterError, ReplyGenerator, ReplyRequest};
    use ratatui::{backend::TestBackend, layout::Position, Terminal};
    use std::sync::Arc;

    struct EchoGenerator;

    #[async_trait]
    impl ReplyGenerator for EchoGenerator {
        async fn generate(&self, request: &ReplyRequest) -> Result<String, AdapterError> {
            Ok(request.prompt.clone())
        }
    }

    fn test_app() -> App {
        App::with_generator(Arc::new(EchoGenerator), "test-model")
    }

    /// Render one frame and return its rows
    fn draw(app: &mut App, width: u16, height: u16) -> (Terminal<TestBackend>, Vec<String>) {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();

        let buffer = terminal.backend().buffer().clone();
        let rows = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect();
        (terminal, rows)
    }

    fn screen_contains(rows: &[String], needle: &str) -> bool {
        rows.iter().any(|row| row.contains(needle))
    }

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        let lines = wrap_text_to_width("water the fern weekly", 10);
        assert_eq!(lines, vec!["water the", "fern", "weekly"]);
    }

    #[test]
    fn test_wrap_splits_overlong_words() {
        let lines = wrap_text_to_width("a abcdefghij", 4);
        assert_eq!(lines, vec!["a", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_empty_line() {
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("Keep **out of direct sun** please");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "out of direct sun");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_unclosed_bold() {
        let line = parse_markdown_line("**oops");
        assert_eq!(line_text(&line), "**oops");
    }

    #[test]
    fn test_heading_and_bullets() {
        assert_eq!(heading_text("## Watering"), Some("Watering"));
        assert_eq!(heading_text("#hashtag"), None);
        assert_eq!(bullet_text("* Bright, indirect light"), Some("• Bright, indirect light".to_string()));
        assert_eq!(bullet_text("plain"), None);
    }

    #[test]
    fn test_transcript_lines_layout() {
        let messages = vec![
            Message::bot("Hi"),
            Message::user(
                "",
                Some(ImageRef {
                    file_name: "pothos.jpg".to_string(),
                    uri: "preview://1/pothos.jpg".to_string(),
                }),
            ),
        ];

        let lines = transcript_lines(&messages, true, 2, 40);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(
            texts,
            vec!["Plant Pal:", "Hi", "", "You:", "📎 pothos.jpg", "", "Plant Pal:", "Typing..."]
        );
        assert_eq!(transcript_line_count(&messages, true, 40), 8);
        assert_eq!(transcript_line_count(&messages, false, 40), 6);
    }

    #[test]
    fn test_failed_reply_is_labelled() {
        let lines = transcript_lines(&[Message::bot_failure("nope")], false, 0, 40);
        assert_eq!(line_text(&lines[0]), "Plant Pal (error):");
    }

    #[test]
    fn test_cursor_row_col() {
        assert_eq!(cursor_row_col("ab\ncd", 4), (1, 1));
        assert_eq!(cursor_row_col("ab\ncd", 2), (0, 2));
        assert_eq!(cursor_row_col("", 0), (0, 0));
    }

    #[test]
    fn test_wrap_counts_display_columns() {
        let lines = wrap_text_to_width("🌱🌱🌱 ok", 4);
        assert_eq!(lines, vec!["🌱🌱", "🌱", "ok"]);
        assert_eq!(wrap_text_to_width("盆栽の 水やり", 6), vec!["盆栽の", "水やり"]);
    }

    #[test]
    fn test_column_helpers_handle_wide_chars() {
        assert_eq!(cursor_row_col("🌱a", 2), (0, 3));
        assert_eq!(column_window("🌱abc", 2, 2), "ab");
        assert_eq!(tail_columns("ab🌱", 2), "🌱");
        assert_eq!(tail_columns("abc", 10), "abc");
    }

    #[test]
    fn test_render_staged_image_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pothos.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let mut app = test_app();
        let staged = StagedImage::open(&path, &app.previews).unwrap();
        app.conversation.stage_image(staged);

        let (_, rows) = draw(&mut app, 100, 20);
        let staged_row = rows
            .iter()
            .find(|row| row.contains("pothos.png") && row.contains("Ctrl+X to remove"))
            .expect("staged image line");
        assert!(staged_row.contains("📎"));
        assert!(staged_row.contains("image/png"));
        assert!(screen_contains(&rows, "remove image"));
    }

    #[test]
    fn test_render_while_sending() {
        let mut app = test_app();
        app.conversation.composer_mut().set_draft("Is my fern thirsty?");
        assert!(app.conversation.begin_send().is_some());

        let (terminal, rows) = draw(&mut app, 80, 20);
        assert!(screen_contains(&rows, "Is my fern thirsty?"));
        assert!(screen_contains(&rows, "Typing."));

        let footer = &rows[19];
        assert!(footer.starts_with(" WAITING "));
        // Send hint is dimmed while a reply is pending
        let x = footer.find(" send ").unwrap() as u16 + 1;
        assert_eq!(terminal.backend().buffer()[(x, 19)].fg, Color::DarkGray);
    }

    #[test]
    fn test_send_hint_enabled_with_draft() {
        let mut app = test_app();
        app.conversation.composer_mut().set_draft("hello");

        let (terminal, rows) = draw(&mut app, 80, 20);
        let footer = &rows[19];
        assert!(footer.starts_with(" CHAT "));
        let x = footer.find(" send ").unwrap() as u16 + 1;
        assert_eq!(terminal.backend().buffer()[(x, 19)].fg, Color::White);
    }

    #[test]
    fn test_render_status_notice() {
        let mut app = test_app();
        app.status = Some("not a file: /tmp".to_string());
        let (_, rows) = draw(&mut app, 80, 20);
        assert!(screen_contains(&rows, "not a file: /tmp"));
    }

    #[test]
    fn test_render_attach_popup() {
        let mut app = test_app();
        app.open_attach_prompt();
        app.attach_input = "/home/me/fern.jpg".to_string();

        let (mut terminal, rows) = draw(&mut app, 80, 20);
        assert!(screen_contains(&rows, "Attach a plant photo"));
        assert!(screen_contains(&rows, "Path to an image file"));
        assert!(screen_contains(&rows, "/home/me/fern.jpg"));
        assert!(rows[19].starts_with(" ATTACH "));

        // Popup is 70x6 centered at (5, 7); the input sits on its third inner row
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor, Position::new(6 + 17, 10));
    }

    #[test]
    fn test_attach_popup_fits_short_terminals() {
        for (width, height) in [(40, 4), (40, 2), (12, 3), (3, 2), (1, 1)] {
            let mut app = test_app();
            app.open_attach_prompt();
            app.attach_input = "fern.jpg".to_string();
            let (_, rows) = draw(&mut app, width, height);
            assert_eq!(rows.len(), height as usize);
        }

        let mut app = test_app();
        app.open_attach_prompt();
        app.attach_input = "fern.jpg".to_string();
        let (_, rows) = draw(&mut app, 40, 4);
        assert!(screen_contains(&rows, "fern.jpg"));
    }

    #[test]
    fn test_tall_draft_scrolls_to_cursor() {
        let mut app = test_app();
        app.conversation
            .composer_mut()
            .set_draft("one\ntwo\nthree\nfour\nfive\nsix");

        let (mut terminal, rows) = draw(&mut app, 60, 20);
        assert!(screen_contains(&rows, "│three"));
        assert!(screen_contains(&rows, "│six"));
        assert!(!screen_contains(&rows, "│two "));

        // Composer occupies rows 13-18: MAX_COMPOSER_ROWS inner rows plus borders
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor, Position::new(1 + 3, 14 + (MAX_COMPOSER_ROWS - 1)));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
