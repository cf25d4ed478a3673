//! Conversation domain models.
//!
//! A conversation session is a durable chat transcript against the remote
//! process's question-answering endpoint. Sessions are independent of the
//! flow lifecycle: they can be created, used, and deleted whether or not
//! a flow is running.

use super::message::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Character budget for auto-derived session titles.
pub const TITLE_MAX_CHARS: usize = 40;

/// A durable chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// Human-readable session title, derived from the first user message.
    pub title: String,
    /// Ordered message history.
    pub messages: Vec<ChatMessage>,
    /// Timestamp when the session was created (ISO 8601 format).
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format).
    pub updated_at: String,
}

impl ConversationSession {
    /// Creates a fresh, empty session with a generated identifier.
    pub fn new() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            title: "New conversation".to_string(),
            messages: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Appends a message and refreshes the update timestamp.
    ///
    /// The title is derived from the first user message and never changed
    /// afterwards.
    pub fn push(&mut self, message: ChatMessage) {
        let is_first_user_message = message.role == MessageRole::User
            && !self.messages.iter().any(|m| m.role == MessageRole::User);
        if is_first_user_message {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Serializes the whole transcript into a single question payload.
    ///
    /// The backend endpoint is stateless per request, so every exchange
    /// re-sends the full history. Synthetic error entries are local
    /// bookkeeping and are left out.
    pub fn transcript(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len());
        for message in self.messages.iter().filter(|m| !m.is_error) {
            let prefix = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            lines.push(format!("{}: {}", prefix, message.content));
        }
        lines.join("\n")
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return "New conversation".to_string();
    }
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(TITLE_MAX_CHARS).collect()
    }
}

/// The full collection of sessions, persisted as one durable unit.
///
/// Invariant: `current_id`, when set, references an existing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCollection {
    #[serde(default)]
    pub sessions: Vec<ConversationSession>,
    #[serde(default)]
    pub current_id: Option<String>,
}

impl ConversationCollection {
    /// Looks up a session by id.
    pub fn find(&self, id: &str) -> Option<&ConversationSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Looks up a session by id, mutably.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut ConversationSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// The currently selected session, if any.
    pub fn current(&self) -> Option<&ConversationSession> {
        self.current_id.as_deref().and_then(|id| self.find(id))
    }

    /// The currently selected session, mutably.
    pub fn current_mut(&mut self) -> Option<&mut ConversationSession> {
        let id = self.current_id.clone()?;
        self.find_mut(&id)
    }

    /// Adds a session and makes it current.
    pub fn insert(&mut self, session: ConversationSession) {
        self.current_id = Some(session.id.clone());
        self.sessions.push(session);
    }

    /// Removes a session by id.
    ///
    /// If the removed session was current, selection falls back to the
    /// first remaining session, or to none when the collection is empty.
    /// Returns whether a session was actually removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        if self.current_id.as_deref() == Some(id) {
            self.current_id = self.sessions.first().map(|s| s.id.clone());
        }
        true
    }
}
