//! Human-in-the-loop checkpoints.
//!
//! When the remote flow blocks on a step, the step's name decides which
//! interaction is offered: review-type steps get an approve/reject pair,
//! everything else a single free-form resume.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The literal feedback token the backend understands as approval.
pub const APPROVE_FEEDBACK: &str = "approve";

/// Placeholder sent when the operator resumes without typing anything.
pub const DEFAULT_FEEDBACK: &str = "continue";

/// Step names that always present a review-style checkpoint.
const REVIEW_STEP_MARKERS: &[&str] = &[
    "initial_research",
    "per_resource_research",
    "project_structure_review",
    "image_retrieval_review",
];

/// Per-resource review steps are generated dynamically by the backend
/// (one per resource), so they are matched by shape rather than by name.
static RESOURCE_REVIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^resource_.+_research_review$").expect("valid regex"));

/// Which interaction a checkpoint offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// The operator approves the step output or sends improvement notes.
    ApproveReject,
    /// The operator resumes with free-form feedback.
    FreeForm,
}

impl CheckpointKind {
    /// Classifies a step name reported by the backend.
    ///
    /// Pure and stateless: the result depends on the name alone and is
    /// re-evaluated for every newly opened checkpoint.
    pub fn classify(step_name: &str) -> Self {
        let is_review = REVIEW_STEP_MARKERS
            .iter()
            .any(|marker| step_name.contains(marker))
            || RESOURCE_REVIEW_RE.is_match(step_name);

        if is_review {
            CheckpointKind::ApproveReject
        } else {
            CheckpointKind::FreeForm
        }
    }
}

/// A transient checkpoint derived from a status poll.
///
/// Exists only while the flow is waiting for input; destroyed on resume
/// or when the backend stops waiting on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Name of the step that blocked.
    pub step_name: String,
    /// Interaction offered for this step.
    pub kind: CheckpointKind,
    /// Timestamp when the checkpoint was opened (ISO 8601 format).
    pub opened_at: String,
}

impl Checkpoint {
    /// Opens a checkpoint for the given step, classifying it fresh.
    pub fn open(step_name: impl Into<String>) -> Self {
        let step_name = step_name.into();
        let kind = CheckpointKind::classify(&step_name);
        Self {
            step_name,
            kind,
            opened_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether this checkpoint offers the approve/reject pair.
    pub fn requires_approve_reject(&self) -> bool {
        self.kind == CheckpointKind::ApproveReject
    }
}
