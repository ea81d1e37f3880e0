use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use plant_pal::gemini::{AdapterError, GeminiClient, ReplyGenerator};
use plant_pal::preview::{PreviewRegistry, StagedImage};
use plant_pal::{Config, Conversation};

use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Composing,
    Attaching, // Image path prompt is open
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub conversation: Conversation,

    // Request plumbing
    pub generator: Arc<dyn ReplyGenerator>,
    pub reply_task: Option<JoinHandle<Result<String, AdapterError>>>,
    pub model_label: String,
    pub has_credential: bool,

    // Image staging
    pub previews: PreviewRegistry,
    pub attach_input: String,
    pub status: Option<String>, // One-line notice under the composer

    // Transcript view
    pub transcript_scroll: u16,
    pub transcript_height: u16, // Inner height, set during render
    pub transcript_width: u16,  // Inner width, set during render
    pub transcript_area: Option<Rect>,
    seen_messages: usize,
    seen_sending: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for typing indicator
}

impl App {
    pub fn new(config: &Config) -> Self {
        let client = GeminiClient::from_config(config);
        if !client.has_credential() {
            warn!("API_KEY environment variable not set. Replies will report a configuration error.");
        }
        let has_credential = client.has_credential();
        let model_label = client.model().to_string();

        let mut app = Self::with_generator(Arc::new(client), model_label);
        app.has_credential = has_credential;
        app
    }

    pub fn with_generator(generator: Arc<dyn ReplyGenerator>, model_label: impl Into<String>) -> Self {
        let conversation = Conversation::new();
        let seen_messages = conversation.transcript().len();

        Self {
            should_quit: false,
            input_mode: InputMode::Composing,
            conversation,

            generator,
            reply_task: None,
            model_label: model_label.into(),
            has_credential: true,

            previews: PreviewRegistry::new(),
            attach_input: String::new(),
            status: None,

            transcript_scroll: 0,
            transcript_height: 0,
            transcript_width: 0,
            transcript_area: None,
            seen_messages,
            seen_sending: false,

            animation_frame: 0,
        }
    }

    /// Send the composer contents on a background task.
    ///
    /// Returns `false` when the conversation refuses the send (nothing to
    /// send, or a reply is still pending).
    pub fn submit(&mut self) -> bool {
        if self.reply_task.is_some() {
            return false;
        }
        let Some(request) = self.conversation.begin_send() else {
            return false;
        };

        self.status = None;
        self.animation_frame = 0;

        let generator = Arc::clone(&self.generator);
        self.reply_task = Some(tokio::spawn(async move { generator.generate(&request).await }));
        true
    }

    /// Hand a finished reply back to the conversation
    pub async fn poll_reply(&mut self) {
        let finished = self
            .reply_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.reply_task.take() {
            match task.await {
                Ok(outcome) => {
                    self.conversation.finish_send(outcome);
                }
                Err(e) => {
                    error!(error = %e, "reply task failed");
                    self.conversation.fail_send();
                }
            }
        }
    }

    /// Abandon any in-flight request on exit
    pub fn shutdown(&mut self) {
        if let Some(task) = self.reply_task.take() {
            info!("abandoning in-flight request");
            task.abort();
        }
        self.should_quit = true;
    }

    // Image staging
    pub fn open_attach_prompt(&mut self) {
        self.attach_input.clear();
        self.input_mode = InputMode::Attaching;
    }

    pub fn cancel_attach(&mut self) {
        self.attach_input.clear();
        self.input_mode = InputMode::Composing;
    }

    pub fn confirm_attach(&mut self) {
        let path = self.attach_input.trim().to_string();
        if path.is_empty() {
            self.cancel_attach();
            return;
        }

        match StagedImage::open(&path, &self.previews) {
            Ok(image) => {
                info!(
                    path = %image.path().display(),
                    media_type = image.media_type(),
                    "image staged"
                );
                self.conversation.stage_image(image);
                self.status = None;
            }
            Err(e) => {
                warn!(error = %e, "could not stage image");
                self.status = Some(e.to_string());
            }
        }
        self.cancel_attach();
    }

    pub fn remove_image(&mut self) {
        if self.conversation.remove_image() {
            self.status = None;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Transcript scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.transcript_scroll = self
            .transcript_scroll
            .saturating_add(lines)
            .min(self.max_scroll());
    }

    fn visible_height(&self) -> u16 {
        if self.transcript_height > 0 {
            self.transcript_height
        } else {
            20
        }
    }

    fn wrap_width(&self) -> usize {
        if self.transcript_width > 0 {
            self.transcript_width as usize
        } else {
            50
        }
    }

    fn max_scroll(&self) -> u16 {
        let total = ui::transcript_line_count(
            self.conversation.transcript(),
            self.conversation.is_sending(),
            self.wrap_width(),
        );
        total.saturating_sub(self.visible_height())
    }

    /// Pin the view to the newest entry (or the typing indicator)
    pub fn scroll_to_bottom(&mut self) {
        self.transcript_scroll = self.max_scroll();
    }

    /// Follow new entries: scroll to the bottom whenever the transcript grows
    /// or the typing indicator appears or disappears.
    pub fn sync_scroll(&mut self) {
        let messages = self.conversation.transcript().len();
        let sending = self.conversation.is_sending();
        if messages != self.seen_messages || sending != self.seen_sending {
            self.seen_messages = messages;
            self.seen_sending = sending;
            self.scroll_to_bottom();
        }
    }
}
