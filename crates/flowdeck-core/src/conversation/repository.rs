//! Conversation repository trait.
//!
//! Defines the interface for persisting the conversation collection.

use super::model::ConversationCollection;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for the durable conversation collection.
///
/// The collection is saved and loaded as a single unit, decoupling the
/// conversation service from the specific storage mechanism (a JSON file,
/// a database, an in-memory map in tests).
///
/// # Implementation Notes
///
/// Storage is best-effort: `load` must degrade to an empty collection
/// when the backing store is absent or corrupted, never fail the caller
/// into a crash.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Loads the persisted collection, or the empty default when nothing
    /// usable is stored.
    async fn load(&self) -> Result<ConversationCollection>;

    /// Persists the full collection.
    async fn save(&self, collection: &ConversationCollection) -> Result<()>;
}
