//! File-backed conversation persistence.

use async_trait::async_trait;
use flowdeck_core::conversation::{ConversationCollection, ConversationRepository};
use flowdeck_core::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const CONVERSATIONS_FILE: &str = "conversations.json";

/// Persists the conversation collection as a single JSON file.
///
/// The whole collection is one durable unit: it is rewritten in full on
/// every save, and a missing or corrupted file degrades to the empty
/// default on load.
pub struct JsonConversationRepository {
    file_path: PathBuf,
}

impl JsonConversationRepository {
    /// Creates a repository storing its file under `base_dir`.
    ///
    /// The directory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            file_path: base_dir.join(CONVERSATIONS_FILE),
        })
    }

    /// Creates a repository at the default location (~/.flowdeck).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or if
    /// the directory cannot be created.
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| flowdeck_core::FlowdeckError::io("Failed to get home directory"))?;
        Self::new(home_dir.join(".flowdeck"))
    }
}

#[async_trait]
impl ConversationRepository for JsonConversationRepository {
    async fn load(&self) -> Result<ConversationCollection> {
        if !self.file_path.exists() {
            return Ok(ConversationCollection::default());
        }

        let json = match fs::read_to_string(&self.file_path) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(
                    target: "storage",
                    "Failed to read conversations file {:?}: {}; starting empty",
                    self.file_path,
                    e
                );
                return Ok(ConversationCollection::default());
            }
        };

        match serde_json::from_str(&json) {
            Ok(collection) => Ok(collection),
            Err(e) => {
                tracing::warn!(
                    target: "storage",
                    "Corrupted conversations file {:?}: {}; starting empty",
                    self.file_path,
                    e
                );
                Ok(ConversationCollection::default())
            }
        }
    }

    async fn save(&self, collection: &ConversationCollection) -> Result<()> {
        let json = serde_json::to_string_pretty(collection)?;
        fs::write(&self.file_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::conversation::{ChatMessage, ConversationSession};
    use tempfile::TempDir;

    fn collection_with_one_session() -> ConversationCollection {
        let mut collection = ConversationCollection::default();
        let mut session = ConversationSession::new();
        session.push(ChatMessage::user("Deploy nginx"));
        session.push(ChatMessage::assistant("Starting the flow."));
        collection.insert(session);
        collection
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonConversationRepository::new(temp_dir.path()).unwrap();

        let collection = collection_with_one_session();
        repository.save(&collection).await.unwrap();

        let loaded = repository.load().await.unwrap();
        assert_eq!(loaded, collection);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonConversationRepository::new(temp_dir.path()).unwrap();

        let loaded = repository.load().await.unwrap();
        assert!(loaded.sessions.is_empty());
        assert_eq!(loaded.current_id, None);
    }

    #[tokio::test]
    async fn test_corrupted_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonConversationRepository::new(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(CONVERSATIONS_FILE), "{not json").unwrap();

        let loaded = repository.load().await.unwrap();
        assert!(loaded.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_collection() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonConversationRepository::new(temp_dir.path()).unwrap();

        repository.save(&collection_with_one_session()).await.unwrap();
        let empty = ConversationCollection::default();
        repository.save(&empty).await.unwrap();

        let loaded = repository.load().await.unwrap();
        assert!(loaded.sessions.is_empty());
    }
}
