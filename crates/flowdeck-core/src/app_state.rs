//! Application state domain models.
//!
//! Contains application-level state that persists across restarts.

use crate::error::Result;
use crate::flow::InteractionMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Application state that persists across restarts.
///
/// Currently this is just the last-selected interaction mode, restored on
/// startup and kept in sync with the backend while a flow runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppState {
    /// The interaction mode last selected by the operator.
    #[serde(default)]
    pub interaction_mode: InteractionMode,
}

impl AppState {
    /// Creates a new AppState with the default interaction mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new AppState with a specific interaction mode.
    pub fn with_interaction_mode(mode: InteractionMode) -> Self {
        Self {
            interaction_mode: mode,
        }
    }
}

/// Repository for application-level state.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Returns the persisted interaction mode, or the default when
    /// nothing usable is stored.
    async fn interaction_mode(&self) -> InteractionMode;

    /// Persists the interaction mode.
    async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()>;
}
