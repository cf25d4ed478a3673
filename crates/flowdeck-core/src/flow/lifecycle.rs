//! Lifecycle states of the supervised flow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The authoritative local view of the remote flow's lifecycle.
///
/// Transitions are driven only by gateway responses and local user
/// actions. Because the lifecycle is a single enum value, contradictory
/// combinations (waiting for input while stopped) cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowLifecycle {
    /// No flow has been started in this session.
    Idle,
    /// A start request was accepted; the first poll has not confirmed
    /// the flow yet.
    Starting,
    /// The flow is making progress on its own.
    Running,
    /// The flow is blocked at a checkpoint awaiting operator feedback.
    WaitingForInput,
    /// A kill signal was accepted; awaiting confirmed death.
    Cancelling,
    /// The flow terminated (finished, cancelled, or presumed gone).
    Stopped,
    /// An unrecoverable gateway failure while the flow was believed
    /// running.
    Failed,
}

impl FlowLifecycle {
    /// States from which a new flow may be started.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Failed)
    }

    /// States from which the operator may request cancellation.
    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::WaitingForInput)
    }

    /// States in which the normal polling loop should keep ticking.
    pub fn should_poll(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// States in which a checkpoint may be opened.
    pub fn accepts_checkpoint(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether a flow is believed alive on the backend.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::WaitingForInput | Self::Cancelling
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::WaitingForInput => "waiting_for_input",
            Self::Cancelling => "cancelling",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl Default for FlowLifecycle {
    fn default() -> Self {
        FlowLifecycle::Idle
    }
}

impl fmt::Display for FlowLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_legal_only_when_no_flow_is_live() {
        assert!(FlowLifecycle::Idle.can_start());
        assert!(FlowLifecycle::Stopped.can_start());
        assert!(FlowLifecycle::Failed.can_start());
        assert!(!FlowLifecycle::Starting.can_start());
        assert!(!FlowLifecycle::Running.can_start());
        assert!(!FlowLifecycle::WaitingForInput.can_start());
        assert!(!FlowLifecycle::Cancelling.can_start());
    }

    #[test]
    fn test_cancel_is_legal_while_live() {
        assert!(FlowLifecycle::Starting.can_cancel());
        assert!(FlowLifecycle::Running.can_cancel());
        assert!(FlowLifecycle::WaitingForInput.can_cancel());
        assert!(!FlowLifecycle::Cancelling.can_cancel());
        assert!(!FlowLifecycle::Stopped.can_cancel());
        assert!(!FlowLifecycle::Idle.can_cancel());
    }

    #[test]
    fn test_polling_suspends_while_waiting() {
        assert!(FlowLifecycle::Running.should_poll());
        assert!(FlowLifecycle::Starting.should_poll());
        assert!(!FlowLifecycle::WaitingForInput.should_poll());
        assert!(!FlowLifecycle::Cancelling.should_poll());
        assert!(!FlowLifecycle::Stopped.should_poll());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&FlowLifecycle::WaitingForInput).unwrap(),
            "\"waiting_for_input\""
        );
    }
}
