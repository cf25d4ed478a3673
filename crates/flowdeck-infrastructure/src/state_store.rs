//! Application state persistence.
//!
//! Stores the last-selected interaction mode so it survives restarts.
//! The value is cached in memory and written through on every change.

use async_trait::async_trait;
use flowdeck_core::app_state::{AppState, StateRepository};
use flowdeck_core::error::Result;
use flowdeck_core::flow::InteractionMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const APP_STATE_FILE: &str = "app_state.json";

/// File-backed implementation of [`StateRepository`].
#[derive(Clone)]
pub struct JsonStateRepository {
    /// Cached app state loaded from storage.
    state: Arc<Mutex<AppState>>,
    file_path: PathBuf,
}

impl JsonStateRepository {
    /// Creates a repository under `base_dir` and loads the initial state.
    ///
    /// A missing or corrupted file yields the default state.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        let file_path = base_dir.join(APP_STATE_FILE);

        let initial = Self::load_from(&file_path);
        Ok(Self {
            state: Arc::new(Mutex::new(initial)),
            file_path,
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

    fn load_from(file_path: &Path) -> AppState {
        if !file_path.exists() {
            return AppState::default();
        }
        match fs::read_to_string(file_path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        target: "storage",
                        "Corrupted app state file {:?}: {}; using defaults",
                        file_path,
                        e
                    );
                    AppState::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    target: "storage",
                    "Failed to read app state file {:?}: {}; using defaults",
                    file_path,
                    e
                );
                AppState::default()
            }
        }
    }

    async fn save_state(&self, state: AppState) -> Result<()> {
        {
            let mut cached = self.state.lock().await;
            *cached = state.clone();
        }
        let json = serde_json::to_string_pretty(&state)?;
        fs::write(&self.file_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl StateRepository for JsonStateRepository {
    async fn interaction_mode(&self) -> InteractionMode {
        self.state.lock().await.interaction_mode
    }

    async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()> {
        let mut state = self.state.lock().await.clone();
        state.interaction_mode = mode;
        self.save_state(state).await
    }
}
