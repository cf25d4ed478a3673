//! Flow domain module.
//!
//! Contains the models describing the remote flow as seen from the
//! client: status snapshots, the mirrored blackboard, lifecycle states,
//! and human-in-the-loop checkpoints.
//!
//! # Module Structure
//!
//! - `status`: Poll snapshots (`FlowStatus`, `InteractionSnapshot`, `InteractionMode`)
//! - `blackboard`: Read-only mirror of the remote shared state
//! - `lifecycle`: Lifecycle state enum (`FlowLifecycle`)
//! - `checkpoint`: Checkpoint model and step classification

mod blackboard;
mod checkpoint;
mod lifecycle;
mod status;

// Re-export public API
pub use blackboard::{
    Blackboard, FlowEvent, GeneralInfo, Image, Issue, IssueSeverity, Manifest, Project, Record,
};
pub use checkpoint::{APPROVE_FEEDBACK, Checkpoint, CheckpointKind, DEFAULT_FEEDBACK};
pub use lifecycle::FlowLifecycle;
pub use status::{FlowStatus, InteractionMode, InteractionSnapshot};
