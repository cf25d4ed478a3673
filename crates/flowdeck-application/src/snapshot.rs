//! Published controller state.
//!
//! The controller exposes immutable snapshots over a `watch` channel and
//! transient notifications over a `broadcast` channel, so any rendering
//! layer can observe it without reaching into its internals.

use flowdeck_core::flow::{Blackboard, Checkpoint, FlowLifecycle, InteractionMode};
use std::sync::Arc;

/// One immutable view of the controller's state.
///
/// A new snapshot replaces the previous one wholesale; consumers must
/// re-read derived fields rather than assume deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub lifecycle: FlowLifecycle,
    pub checkpoint: Option<Checkpoint>,
    pub interaction_mode: InteractionMode,
    /// Last status line reported by the backend.
    pub status_message: String,
    /// The mirrored shared state of the remote flow.
    pub blackboard: Arc<Blackboard>,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            lifecycle: FlowLifecycle::Idle,
            checkpoint: None,
            interaction_mode: InteractionMode::default(),
            status_message: String::new(),
            blackboard: Arc::new(Blackboard::default()),
        }
    }
}

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A transient, human-readable event for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerNotification {
    pub level: NotificationLevel,
    pub message: String,
}

impl ControllerNotification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
