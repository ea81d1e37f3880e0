pub mod config;
pub mod conversation;
pub mod gemini;
pub mod logging;
pub mod preview;
pub mod state;

// Re-export main types for convenience
pub use config::Config;
pub use conversation::Conversation;
pub use gemini::{generate_reply, AdapterError, GeminiClient, ImageAttachment, ReplyGenerator, ReplyRequest};
pub use preview::{PreviewHandle, PreviewRegistry, StagedImage};
pub use state::{Author, ImageRef, Message};
