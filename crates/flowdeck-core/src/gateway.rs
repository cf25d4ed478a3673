//! Remote process gateway trait.
//!
//! The gateway is the only boundary to the backend: a thin
//! request/response surface with no streaming and no retries of its own.
//! Retry, if any, is the caller's next scheduled tick.

use crate::error::Result;
use crate::flow::{FlowStatus, InteractionMode, InteractionSnapshot};
use async_trait::async_trait;

/// Request/response boundary to the remote flow process.
///
/// Implementations enforce a bounded request timeout; a timed-out request
/// surfaces as a `Transport` error and is not retried here. HTTP status
/// codes carry no semantics beyond success/failure; a non-success
/// response with a body message becomes `Rejected` with that message
/// verbatim.
#[async_trait]
pub trait FlowGateway: Send + Sync {
    /// Asks the backend to start a new flow for the given prompt.
    async fn start_flow(&self, prompt: &str) -> Result<()>;

    /// Fetches the current flow status.
    async fn fetch_status(&self) -> Result<FlowStatus>;

    /// Fetches the interaction state and the shared blackboard.
    async fn fetch_interaction(&self) -> Result<InteractionSnapshot>;

    /// Sends checkpoint feedback so the flow can continue.
    async fn resume_flow(&self, feedback: &str) -> Result<()>;

    /// Signals the backend to stop the flow. Returns the backend's
    /// acknowledgement message.
    async fn cancel_flow(&self) -> Result<String>;

    /// Switches the process-wide interaction mode.
    async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()>;

    /// Asks a question against the flow's shared state. Returns the
    /// answer text.
    async fn send_chat_message(&self, question: &str, conversation_id: &str) -> Result<String>;
}
