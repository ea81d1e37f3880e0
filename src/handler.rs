use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per PageUp/PageDown when the view height is unknown
const PAGE_FALLBACK: u16 = 10;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_reply().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.shutdown();
        return;
    }

    match app.input_mode {
        InputMode::Composing => handle_composing(app, key),
        InputMode::Attaching => handle_attaching(app, key),
    }
}

/// Plain Enter commits; Shift/Alt+Enter is a literal newline
fn is_newline_chord(key: &KeyEvent) -> bool {
    key.code == KeyCode::Enter
        && key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT)
}

fn handle_composing(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => app.shutdown(),

        KeyCode::Enter if is_newline_chord(&key) => {
            app.conversation.composer_mut().insert_newline();
        }
        KeyCode::Enter => {
            // A refused send (empty draft or reply pending) is a no-op
            app.submit();
        }
        // Ctrl+J arrives as a bare line feed on terminals without modifier reporting
        KeyCode::Char('j') if ctrl => {
            app.conversation.composer_mut().insert_newline();
        }

        KeyCode::Char('o') if ctrl => app.open_attach_prompt(),
        KeyCode::Char('x') if ctrl => app.remove_image(),

        KeyCode::PageUp => {
            let page = page_size(app);
            app.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = page_size(app);
            app.scroll_down(page);
        }

        KeyCode::Left => app.conversation.composer_mut().move_left(),
        KeyCode::Right => app.conversation.composer_mut().move_right(),
        KeyCode::Home => app.conversation.composer_mut().move_home(),
        KeyCode::End => app.conversation.composer_mut().move_end(),
        KeyCode::Backspace => app.conversation.composer_mut().backspace(),
        KeyCode::Delete => app.conversation.composer_mut().delete(),

        KeyCode::Char(c) if !ctrl => app.conversation.composer_mut().insert_char(c),

        _ => {}
    }
}

fn handle_attaching(app: &mut App, key: KeyEvent) {
    let chord = key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);

    match key.code {
        KeyCode::Esc => app.cancel_attach(),
        KeyCode::Enter => app.confirm_attach(),
        KeyCode::Backspace => {
            app.attach_input.pop();
        }
        KeyCode::Char(c) if !chord => app.attach_input.push(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    match app.input_mode {
        // Dropped files arrive as a pasted path, often quoted
        InputMode::Attaching => {
            app.attach_input.push_str(text.trim().trim_matches(|c| c == '\'' || c == '"'));
        }
        InputMode::Composing => {
            let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
            app.conversation.composer_mut().insert_str(&normalized);
        }
    }
}

fn page_size(app: &App) -> u16 {
    if app.transcript_height > 1 {
        app.transcript_height - 1
    } else {
        PAGE_FALLBACK
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_transcript {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use plant_pal::{AdapterError, ReplyGenerator, ReplyRequest};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReplyGenerator for CountingGenerator {
        async fn generate(&self, _request: &ReplyRequest) -> Result<String, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn app() -> (App, Arc<CountingGenerator>) {
        let generator = Arc::new(CountingGenerator::default());
        (App::with_generator(generator.clone(), "test-model"), generator)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c), KeyModifiers::NONE)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enter_sends_without_inserting_newline() {
        let (mut app, _) = app();
        type_text(&mut app, "hi").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE)).await.unwrap();

        assert!(app.conversation.is_sending());
        assert_eq!(app.conversation.composer().draft(), "");
        assert_eq!(app.conversation.transcript().last().unwrap().text, "hi");
    }

    #[tokio::test]
    async fn test_shift_enter_inserts_newline() {
        let (mut app, generator) = app();
        type_text(&mut app, "line one").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT)).await.unwrap();
        type_text(&mut app, "line two").await;

        assert_eq!(app.conversation.composer().draft(), "line one\nline two");
        assert!(!app.conversation.is_sending());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enter_on_blank_draft_is_noop() {
        let (mut app, _) = app();
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE)).await.unwrap();

        assert!(!app.conversation.is_sending());
        assert_eq!(app.conversation.transcript().len(), 1);
        assert_eq!(app.conversation.composer().draft(), "   ");
    }

    #[tokio::test]
    async fn test_attach_prompt_captures_typing() {
        let (mut app, _) = app();
        handle_event(&mut app, key(KeyCode::Char('o'), KeyModifiers::CONTROL)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Attaching);

        type_text(&mut app, "leaf.png").await;
        assert_eq!(app.attach_input, "leaf.png");
        assert_eq!(app.conversation.composer().draft(), "");

        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Composing);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_attach_prompt_ignores_chords() {
        let (mut app, _) = app();
        handle_event(&mut app, key(KeyCode::Char('o'), KeyModifiers::CONTROL)).await.unwrap();
        type_text(&mut app, "fern").await;
        handle_event(&mut app, key(KeyCode::Char('o'), KeyModifiers::CONTROL)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('x'), KeyModifiers::ALT)).await.unwrap();

        assert_eq!(app.attach_input, "fern");
        assert_eq!(app.input_mode, InputMode::Attaching);
    }

    #[tokio::test]
    async fn test_pasted_path_is_unquoted() {
        let (mut app, _) = app();
        app.open_attach_prompt();
        handle_event(&mut app, AppEvent::Paste("'/tmp/my fern.jpg' ".to_string())).await.unwrap();
        assert_eq!(app.attach_input, "/tmp/my fern.jpg");
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let (mut app, _) = app();
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL)).await.unwrap();
        assert!(app.should_quit);
    }
}
