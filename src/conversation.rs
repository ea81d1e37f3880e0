//! Conversation controller
//!
//! [`Conversation`] owns the transcript, the composer, and the request
//! `Phase`. At most one request is in flight: `begin_send` freezes the
//! composer into a `RequestSnapshot` and moves to `Sending`; `finish_send`
//! appends the reply and drops the snapshot, which releases its preview.

use tracing::{debug, info};

use crate::gemini::{AdapterError, ReplyGenerator, ReplyRequest};
use crate::preview::StagedImage;
use crate::state::Message;

pub const GREETING: &str = "Hello! I'm Robo AI - Plant Pal 🌱. Upload a photo of a plant, and I'll identify it and provide care instructions. You can also ask me any gardening questions!";

/// Sent in place of an empty prompt when only an image is attached
pub const DEFAULT_IMAGE_PROMPT: &str = "Identify this plant and provide detailed care instructions. Format the response using Markdown with headings for different sections like 'Watering', 'Sunlight', 'Soil', and 'Common Pests'.";

/// Shown when the request task itself died
pub const TASK_FAILURE_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Draft text and staged image waiting to be sent
#[derive(Debug, Default)]
pub struct Composer {
    draft: String,
    cursor: usize, // in chars
    staged_image: Option<StagedImage>,
}

impl Composer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn staged_image(&self) -> Option<&StagedImage> {
        self.staged_image.as_ref()
    }

    /// Something worth sending: non-blank text or an image
    pub fn has_content(&self) -> bool {
        !self.draft.trim().is_empty() || self.staged_image.is_some()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.cursor = self.draft.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let at = char_to_byte_index(&self.draft, self.cursor);
        self.draft.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn insert_str(&mut self, text: &str) {
        let at = char_to_byte_index(&self.draft, self.cursor);
        self.draft.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft.chars().count() {
            let at = char_to_byte_index(&self.draft, self.cursor);
            self.draft.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.draft.chars().count();
    }

    fn take(&mut self) -> (String, Option<StagedImage>) {
        self.cursor = 0;
        (std::mem::take(&mut self.draft), self.staged_image.take())
    }
}

/// Composer contents frozen at send time
#[derive(Debug)]
struct RequestSnapshot {
    request: ReplyRequest,
    // Held until the request resolves; dropping it releases the preview
    image: Option<StagedImage>,
}

impl RequestSnapshot {
    fn preview_uri(&self) -> Option<&str> {
        self.image.as_ref().map(StagedImage::preview_uri)
    }
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Sending(RequestSnapshot),
}

#[derive(Debug)]
pub struct Conversation {
    transcript: Vec<Message>,
    composer: Composer,
    phase: Phase,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            transcript: vec![Message::bot(GREETING)],
            composer: Composer::default(),
            phase: Phase::Idle,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Editing stays open while a request is in flight
    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.phase, Phase::Sending(_))
    }

    /// Stage `image`, releasing any previously staged preview
    pub fn stage_image(&mut self, image: StagedImage) {
        if let Some(previous) = self.composer.staged_image.take() {
            debug!(uri = previous.preview_uri(), "replacing staged image");
        }
        self.composer.staged_image = Some(image);
    }

    /// Drop the staged image without sending. Returns whether one was staged.
    pub fn remove_image(&mut self) -> bool {
        self.composer.staged_image.take().is_some()
    }

    pub fn can_send(&self) -> bool {
        !self.is_sending() && self.composer.has_content()
    }

    /// Freeze the composer and enter `Sending`.
    ///
    /// Returns `None` without touching any state when there is nothing to
    /// send or a request is already in flight.
    pub fn begin_send(&mut self) -> Option<ReplyRequest> {
        if !self.can_send() {
            return None;
        }

        let (draft, image) = self.composer.take();
        self.transcript
            .push(Message::user(draft.clone(), image.as_ref().map(StagedImage::image_ref)));

        let prompt = if draft.trim().is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            draft
        };
        let request = ReplyRequest {
            prompt,
            image: image.as_ref().map(StagedImage::attachment),
        };
        info!(
            prompt_chars = request.prompt.chars().count(),
            has_image = request.image.is_some(),
            "sending message"
        );

        self.phase = Phase::Sending(RequestSnapshot {
            request: request.clone(),
            image,
        });
        Some(request)
    }

    /// Record the outcome of the in-flight request and return to `Idle`.
    ///
    /// Returns `false` (and changes nothing) if no request is in flight.
    pub fn finish_send(&mut self, outcome: Result<String, AdapterError>) -> bool {
        let message = match outcome {
            Ok(text) => Message::bot(text),
            Err(e) => {
                e.log();
                Message::bot_failure(e.user_message())
            }
        };
        self.resolve(message)
    }

    /// Resolve the in-flight request whose task never produced an outcome
    pub fn fail_send(&mut self) -> bool {
        self.resolve(Message::bot_failure(TASK_FAILURE_TEXT))
    }

    fn resolve(&mut self, message: Message) -> bool {
        match std::mem::take(&mut self.phase) {
            Phase::Idle => false,
            Phase::Sending(snapshot) => {
                self.transcript.push(message);
                debug!(
                    prompt_chars = snapshot.request.prompt.chars().count(),
                    preview = ?snapshot.preview_uri(),
                    "request resolved"
                );
                drop(snapshot);
                true
            }
        }
    }

    /// Send the composer through `generator` and wait for the reply
    pub async fn send_with(&mut self, generator: &dyn ReplyGenerator) -> bool {
        let Some(request) = self.begin_send() else {
            return false;
        };
        let outcome = generator.generate(&request).await;
        self.finish_send(outcome)
    }
}
