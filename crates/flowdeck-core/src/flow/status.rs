//! Remote flow status snapshots.
//!
//! These types mirror what the backend reports on every poll. They are
//! immutable snapshots: a new poll produces a new value, nothing is merged.

use super::blackboard::Blackboard;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the remote flow interacts with the operator.
///
/// The mode is process-wide and persists across restarts of this client;
/// it is re-synchronized with the backend on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// The flow runs to completion without pausing for feedback.
    Automated,
    /// The flow blocks at checkpoints and waits for operator feedback.
    Assisted,
}

impl Default for InteractionMode {
    fn default() -> Self {
        InteractionMode::Assisted
    }
}

impl InteractionMode {
    /// Wire representation used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMode::Automated => "automated",
            InteractionMode::Assisted => "assisted",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status report from the backend.
///
/// Replaced wholesale on every successful poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatus {
    /// Whether the remote flow process is alive.
    #[serde(default)]
    pub is_running: bool,
    /// Whether the flow is blocked at a checkpoint awaiting feedback.
    #[serde(default)]
    pub is_waiting_for_input: bool,
    /// Name of the step waiting for input, when there is one.
    #[serde(default)]
    pub step_name: Option<String>,
    /// Free-text status line reported by the backend.
    #[serde(default)]
    pub status_message: String,
}

impl FlowStatus {
    /// True when the flow is both alive and blocked on a checkpoint.
    ///
    /// A dead process never counts as waiting, whatever the backend says:
    /// "finished" wins the tie-break.
    pub fn is_effectively_waiting(&self) -> bool {
        self.is_running && self.is_waiting_for_input
    }
}

/// Interaction state polled alongside [`FlowStatus`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionSnapshot {
    /// Current process-wide interaction mode.
    #[serde(default)]
    pub mode: InteractionMode,
    /// The shared blackboard, mirrored read-only.
    #[serde(default)]
    pub blackboard: Blackboard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults_to_assisted() {
        assert_eq!(InteractionMode::default(), InteractionMode::Assisted);
    }

    #[test]
    fn test_mode_wire_format() {
        let json = serde_json::to_string(&InteractionMode::Automated).unwrap();
        assert_eq!(json, "\"automated\"");
        let back: InteractionMode = serde_json::from_str("\"assisted\"").unwrap();
        assert_eq!(back, InteractionMode::Assisted);
    }

    #[test]
    fn test_status_tolerates_sparse_payload() {
        let status: FlowStatus = serde_json::from_str("{\"is_running\": true}").unwrap();
        assert!(status.is_running);
        assert!(!status.is_waiting_for_input);
        assert_eq!(status.step_name, None);
    }

    #[test]
    fn test_finished_wins_over_waiting() {
        let status = FlowStatus {
            is_running: false,
            is_waiting_for_input: true,
            step_name: Some("initial_research".to_string()),
            status_message: String::new(),
        };
        assert!(!status.is_effectively_waiting());
    }
}
