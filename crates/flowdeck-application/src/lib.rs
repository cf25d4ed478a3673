//! Application layer for Flowdeck.
//!
//! Hosts the flow controller (lifecycle state machine, polling
//! scheduler, cancellation workflow) and the conversation service. Both
//! are rendering-agnostic: state is observed through snapshots and
//! notifications.

mod cancellation;
mod scheduler;

pub mod controller;
pub mod conversation_service;
pub mod snapshot;

pub use controller::FlowController;
pub use conversation_service::ConversationService;
pub use snapshot::{ControllerNotification, ControllerSnapshot, NotificationLevel};
