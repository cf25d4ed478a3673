//! Client configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    4000
}

fn default_cancel_poll_interval_ms() -> u64 {
    2000
}

fn default_resume_cooldown_ms() -> u64 {
    8000
}

fn default_watchdog_interval_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Tunables for the flow controller and its gateway.
///
/// All fields have defaults, so an empty TOML document is a valid
/// configuration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FlowdeckConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cadence of the normal status poll.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Cadence of the dedicated cancellation confirmation poll.
    #[serde(default = "default_cancel_poll_interval_ms")]
    pub cancel_poll_interval_ms: u64,
    /// Suppression window after a resume, guarding against re-detecting
    /// the checkpoint that was just answered. Tunable, not a correctness
    /// mechanism.
    #[serde(default = "default_resume_cooldown_ms")]
    pub resume_cooldown_ms: u64,
    /// Cadence of the watchdog that restarts a silently-dead poll loop.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
    /// Upper bound on any single gateway request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for FlowdeckConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            cancel_poll_interval_ms: default_cancel_poll_interval_ms(),
            resume_cooldown_ms: default_resume_cooldown_ms(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl FlowdeckConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cancel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_interval_ms)
    }

    pub fn resume_cooldown(&self) -> Duration {
        Duration::from_millis(self.resume_cooldown_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = FlowdeckConfig::from_toml_str("").unwrap();
        assert_eq!(config, FlowdeckConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(4000));
    }

    #[test]
    fn test_partial_override() {
        let config =
            FlowdeckConfig::from_toml_str("base_url = \"http://10.0.0.2:8080\"\npoll_interval_ms = 3000\n")
                .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:8080");
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.cancel_poll_interval_ms, 2000);
    }
}
