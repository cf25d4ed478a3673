//! Conversation session management.
//!
//! Owns the durable collection of chat sessions against the remote
//! process's question-answering endpoint. Fully independent of the flow
//! lifecycle: sessions work the same whether or not a flow is running.

use flowdeck_core::FlowGateway;
use flowdeck_core::conversation::{
    ChatMessage, ConversationCollection, ConversationRepository, ConversationSession,
};
use flowdeck_core::error::{FlowdeckError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Manages multiple conversation sessions and their persistence.
///
/// `ConversationService` is responsible for:
/// - Creating, switching and deleting sessions
/// - Sending questions that carry the whole session transcript
/// - Persisting the full collection after every mutation
pub struct ConversationService<G> {
    gateway: Arc<G>,
    repository: Arc<dyn ConversationRepository>,
    collection: RwLock<ConversationCollection>,
}

impl<G: FlowGateway> ConversationService<G> {
    /// Creates a service with an empty in-memory collection.
    pub fn new(gateway: Arc<G>, repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            gateway,
            repository,
            collection: RwLock::new(ConversationCollection::default()),
        }
    }

    /// Loads the persisted collection on startup.
    ///
    /// Absent or corrupted storage degrades to an empty collection.
    pub async fn load(&self) {
        let loaded = match self.repository.load().await {
            Ok(collection) => collection,
            Err(e) => {
                tracing::warn!(target: "chat", "failed to load conversations: {}; starting empty", e);
                ConversationCollection::default()
            }
        };
        *self.collection.write().await = loaded;
    }

    /// All sessions, in insertion order.
    pub async fn sessions(&self) -> Vec<ConversationSession> {
        self.collection.read().await.sessions.clone()
    }

    /// The id of the currently selected session, if any.
    pub async fn current_id(&self) -> Option<String> {
        self.collection.read().await.current_id.clone()
    }

    /// The currently selected session, if any.
    pub async fn current(&self) -> Option<ConversationSession> {
        self.collection.read().await.current().cloned()
    }

    /// Creates a new session and makes it current.
    pub async fn create_session(&self) -> ConversationSession {
        let session = ConversationSession::new();
        tracing::debug!(target: "chat", id = %session.id, "session created");
        let snapshot = {
            let mut collection = self.collection.write().await;
            collection.insert(session.clone());
            collection.clone()
        };
        self.persist(&snapshot).await;
        session
    }

    /// Switches the current session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no session has the given id.
    pub async fn switch_to(&self, id: &str) -> Result<()> {
        let snapshot = {
            let mut collection = self.collection.write().await;
            if collection.find(id).is_none() {
                return Err(FlowdeckError::not_found("conversation", id));
            }
            collection.current_id = Some(id.to_string());
            collection.clone()
        };
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Deletes a session.
    ///
    /// If the deleted session was current, selection falls back to the
    /// first remaining session, or to none.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no session has the given id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let snapshot = {
            let mut collection = self.collection.write().await;
            if !collection.remove(id) {
                return Err(FlowdeckError::not_found("conversation", id));
            }
            collection.clone()
        };
        tracing::debug!(target: "chat", id, "session deleted");
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Sends a message in the current session.
    ///
    /// A session is created implicitly when none is current. The whole
    /// transcript, not just this message, is sent as the question. On
    /// failure a synthetic error message is appended so the failure stays
    /// visible in the transcript.
    ///
    /// # Errors
    ///
    /// `Validation` on an empty message, or the gateway error after the
    /// synthetic error message has been recorded.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowdeckError::validation("message must not be empty"));
        }

        let (question, conversation_id, snapshot) = {
            let mut collection = self.collection.write().await;
            if collection.current().is_none() {
                let session = ConversationSession::new();
                tracing::debug!(target: "chat", id = %session.id, "session created implicitly");
                collection.insert(session);
            }
            let Some(session) = collection.current_mut() else {
                return Err(FlowdeckError::internal("no current conversation session"));
            };
            session.push(ChatMessage::user(text));
            (session.transcript(), session.id.clone(), collection.clone())
        };
        self.persist(&snapshot).await;

        match self
            .gateway
            .send_chat_message(&question, &conversation_id)
            .await
        {
            Ok(answer) => {
                let message = ChatMessage::assistant(answer);
                let snapshot = self.append(&conversation_id, message.clone()).await;
                self.persist(&snapshot).await;
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(target: "chat", "question failed: {}", e);
                let message = ChatMessage::error(format!("Failed to get an answer: {}", e));
                let snapshot = self.append(&conversation_id, message).await;
                self.persist(&snapshot).await;
                Err(e)
            }
        }
    }

    async fn append(&self, session_id: &str, message: ChatMessage) -> ConversationCollection {
        let mut collection = self.collection.write().await;
        if let Some(session) = collection.find_mut(session_id) {
            session.push(message);
        }
        collection.clone()
    }

    async fn persist(&self, collection: &ConversationCollection) {
        if let Err(e) = self.repository.save(collection).await {
            tracing::warn!(target: "chat", "failed to persist conversations: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowdeck_core::flow::{FlowStatus, InteractionMode, InteractionSnapshot};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Gateway mock that only cares about the chat endpoint.
    #[derive(Default)]
    struct MockChatGateway {
        answers: StdMutex<VecDeque<Result<String>>>,
        questions: StdMutex<Vec<(String, String)>>,
    }

    impl MockChatGateway {
        fn push_answer(&self, answer: &str) {
            self.answers
                .lock()
                .unwrap()
                .push_back(Ok(answer.to_string()));
        }

        fn push_failure(&self, error: FlowdeckError) {
            self.answers.lock().unwrap().push_back(Err(error));
        }

        fn questions(&self) -> Vec<(String, String)> {
            self.questions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FlowGateway for MockChatGateway {
        async fn start_flow(&self, _prompt: &str) -> Result<()> {
            Ok(())
        }

        async fn fetch_status(&self) -> Result<FlowStatus> {
            Ok(FlowStatus::default())
        }

        async fn fetch_interaction(&self) -> Result<InteractionSnapshot> {
            Ok(InteractionSnapshot::default())
        }

        async fn resume_flow(&self, _feedback: &str) -> Result<()> {
            Ok(())
        }

        async fn cancel_flow(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn set_interaction_mode(&self, _mode: InteractionMode) -> Result<()> {
            Ok(())
        }

        async fn send_chat_message(&self, question: &str, conversation_id: &str) -> Result<String> {
            self.questions
                .lock()
                .unwrap()
                .push((question.to_string(), conversation_id.to_string()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("ok".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryConversationRepository {
        saved: StdMutex<Option<ConversationCollection>>,
        save_count: AtomicUsize,
        fail_load: bool,
    }

    #[async_trait]
    impl ConversationRepository for MemoryConversationRepository {
        async fn load(&self) -> Result<ConversationCollection> {
            if self.fail_load {
                return Err(FlowdeckError::data_access("storage unavailable"));
            }
            Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
        }

        async fn save(&self, collection: &ConversationCollection) -> Result<()> {
            self.save_count.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(collection.clone());
            Ok(())
        }
    }

    fn service_with(
        gateway: Arc<MockChatGateway>,
        repository: Arc<MemoryConversationRepository>,
    ) -> ConversationService<MockChatGateway> {
        ConversationService::new(gateway, repository as Arc<dyn ConversationRepository>)
    }

    #[tokio::test]
    async fn test_send_message_creates_session_implicitly() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository);

        assert_eq!(service.current_id().await, None);
        gateway.push_answer("The phase is Testing.");
        service.send_message("What is the phase?").await.unwrap();

        let current = service.current().await.unwrap();
        assert_eq!(current.messages.len(), 2);
        assert_eq!(current.title, "What is the phase?");
    }

    #[tokio::test]
    async fn test_whole_transcript_is_sent() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository);

        gateway.push_answer("Gathering information.");
        service.send_message("What is the phase?").await.unwrap();
        gateway.push_answer("default");
        service.send_message("Which namespace?").await.unwrap();

        let questions = gateway.questions();
        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[1].0,
            "User: What is the phase?\n\
             Assistant: Gathering information.\n\
             User: Which namespace?"
        );
        // Both questions belong to the same session.
        assert_eq!(questions[0].1, questions[1].1);
    }

    #[tokio::test]
    async fn test_failure_appends_visible_error_message() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository.clone());

        gateway.push_failure(FlowdeckError::transport("connection refused"));
        let err = service.send_message("hello").await.unwrap_err();
        assert!(err.is_transport());

        let current = service.current().await.unwrap();
        assert_eq!(current.messages.len(), 2);
        let last = current.messages.last().unwrap();
        assert!(last.is_error);
        assert!(last.content.contains("connection refused"));

        // The error message was persisted too.
        let saved = repository.saved.lock().unwrap().clone().unwrap();
        assert!(saved.sessions[0].messages.last().unwrap().is_error);
    }

    #[tokio::test]
    async fn test_delete_only_session_clears_current() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway, repository);

        let session = service.create_session().await;
        service.delete(&session.id).await.unwrap();

        assert_eq!(service.current_id().await, None);
        assert!(service.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_current_selects_first_remaining() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway, repository);

        let first = service.create_session().await;
        let second = service.create_session().await;
        assert_eq!(service.current_id().await, Some(second.id.clone()));

        service.delete(&second.id).await.unwrap();
        assert_eq!(service.current_id().await, Some(first.id));
    }

    #[tokio::test]
    async fn test_switch_to_unknown_session_errors() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway, repository);

        let err = service.switch_to("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository.clone());

        service.create_session().await;
        gateway.push_answer("ok");
        service.send_message("hello").await.unwrap();

        // create + user message + assistant message
        assert_eq!(repository.save_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_tolerates_broken_storage() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository {
            fail_load: true,
            ..MemoryConversationRepository::default()
        });
        let service = service_with(gateway, repository);

        service.load().await;
        assert!(service.sessions().await.is_empty());
        assert_eq!(service.current_id().await, None);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_locally() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository);

        let err = service.send_message("   ").await.unwrap_err();
        assert!(err.is_validation());
        assert!(gateway.questions().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_survive_reload_through_repository() {
        let gateway = Arc::new(MockChatGateway::default());
        let repository = Arc::new(MemoryConversationRepository::default());
        let service = service_with(gateway.clone(), repository.clone());

        gateway.push_answer("42");
        service.send_message("answer?").await.unwrap();

        // A fresh service over the same repository sees the session.
        let reloaded = service_with(gateway, repository);
        reloaded.load().await;
        let sessions = reloaded.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].messages.len(), 2);
        assert_eq!(reloaded.current_id().await, Some(sessions[0].id.clone()));
    }
}
