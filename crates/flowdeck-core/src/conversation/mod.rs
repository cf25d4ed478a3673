//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: Session and collection models (`ConversationSession`, `ConversationCollection`)
//! - `message`: Chat message types (`MessageRole`, `ChatMessage`)
//! - `repository`: Repository trait for conversation persistence

mod message;
mod model;
mod repository;

// Re-export public API
pub use message::{ChatMessage, MessageRole};
pub use model::{ConversationCollection, ConversationSession, TITLE_MAX_CHARS};
pub use repository::ConversationRepository;
