//! Chat message types.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the remote assistant.
    Assistant,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format).
    pub created_at: String,
    /// Marks a synthetic message recorded in place of a failed answer.
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    /// A message typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_error: false,
        }
    }

    /// An answer returned by the backend.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_error: false,
        }
    }

    /// A synthetic assistant message recording a failure, so the error
    /// stays visible in the transcript instead of being dropped.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_error: true,
        }
    }
}
