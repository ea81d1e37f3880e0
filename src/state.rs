//! UI-agnostic conversation types
//!
//! These are shared between the conversation controller and the terminal
//! surface and don't depend on any UI framework.

use serde::{Deserialize, Serialize};

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

/// Displayable reference to an image attached to a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub file_name: String,
    pub uri: String,
}

/// One turn in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: Author,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Set on bot turns that stand in for a failed request
    #[serde(default)]
    pub failed: bool,
}

impl Message {
    pub fn user(text: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            image,
            failed: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            author: Author::Bot,
            text: text.into(),
            image: None,
            failed: false,
        }
    }

    pub fn bot_failure(text: impl Into<String>) -> Self {
        Self {
            failed: true,
            ..Self::bot(text)
        }
    }

    pub fn is_bot(&self) -> bool {
        self.author == Author::Bot
    }
}
