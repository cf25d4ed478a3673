//! HTTP implementation of the flow gateway.
//!
//! Talks to the backend's JSON API. Responses follow the backend's
//! envelope convention: `{"status": "success" | "error", "message": ...}`
//! plus endpoint-specific fields. HTTP status codes are treated purely as
//! success/failure; a failure body's message is surfaced verbatim.

use async_trait::async_trait;
use flowdeck_core::error::{FlowdeckError, Result};
use flowdeck_core::flow::{Blackboard, FlowStatus, InteractionMode, InteractionSnapshot};
use flowdeck_core::{FlowGateway, FlowdeckConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway implementation that talks to the backend HTTP API.
#[derive(Clone)]
pub struct HttpFlowGateway {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct ResumeRequest<'a> {
    feedback: &'a str,
}

#[derive(Debug, Serialize)]
struct ModeRequest<'a> {
    mode: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    conversation_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    is_running: bool,
    #[serde(default)]
    is_waiting_for_input: bool,
    #[serde(default)]
    step_name: Option<String>,
    #[serde(default, alias = "status_message")]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct InteractionDto {
    #[serde(default)]
    mode: InteractionMode,
}

#[derive(Debug, Default, Deserialize)]
struct InteractionStatusResponse {
    #[serde(default)]
    interaction: InteractionDto,
    #[serde(default)]
    blackboard: Blackboard,
}

#[derive(Debug, Default, Deserialize)]
struct CancelResponse {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    answer: String,
}

/// Pulls the human-readable message out of an error body.
///
/// Failure bodies are normally the JSON envelope, but proxies can hand
/// back plain text; fall back to the raw body then.
fn rejection_message(body: &str) -> String {
    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) if !envelope.message.is_empty() => envelope.message,
        _ => body.trim().to_string(),
    }
}

impl HttpFlowGateway {
    /// Creates a new gateway for the given base URL.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            request_timeout,
        }
    }

    /// Creates a gateway from the client configuration.
    pub fn from_config(config: &FlowdeckConfig) -> Self {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FlowdeckError::rejected(rejection_message(&body)));
        }

        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FlowdeckError::rejected(rejection_message(&body)));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl FlowGateway for HttpFlowGateway {
    async fn start_flow(&self, prompt: &str) -> Result<()> {
        tracing::debug!(target: "gateway", "POST init");
        let _: Envelope = self.post_json("init", &StartRequest { prompt }).await?;
        Ok(())
    }

    async fn fetch_status(&self) -> Result<FlowStatus> {
        let status: StatusResponse = self.get_json("status").await?;
        Ok(FlowStatus {
            is_running: status.is_running,
            is_waiting_for_input: status.is_waiting_for_input,
            step_name: status.step_name,
            status_message: status.message,
        })
    }

    async fn fetch_interaction(&self) -> Result<InteractionSnapshot> {
        let response: InteractionStatusResponse = self.get_json("interaction").await?;
        Ok(InteractionSnapshot {
            mode: response.interaction.mode,
            blackboard: response.blackboard,
        })
    }

    async fn resume_flow(&self, feedback: &str) -> Result<()> {
        tracing::debug!(target: "gateway", "POST resume");
        let _: Envelope = self.post_json("resume", &ResumeRequest { feedback }).await?;
        Ok(())
    }

    async fn cancel_flow(&self) -> Result<String> {
        tracing::debug!(target: "gateway", "POST kill");
        let response: CancelResponse = self.post_json("kill", &serde_json::json!({})).await?;
        Ok(response.message)
    }

    async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<()> {
        tracing::debug!(target: "gateway", mode = mode.as_str(), "POST interaction/mode");
        let _: Envelope = self
            .post_json("interaction/mode", &ModeRequest { mode: mode.as_str() })
            .await?;
        Ok(())
    }

    async fn send_chat_message(&self, question: &str, conversation_id: &str) -> Result<String> {
        tracing::debug!(target: "gateway", conversation_id, "POST chat");
        let response: ChatResponse = self
            .post_json(
                "chat",
                &ChatRequest {
                    question,
                    conversation_id,
                },
            )
            .await?;
        Ok(response.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_parses_backend_payload() {
        let status: StatusResponse = serde_json::from_str(
            "{\"status\": \"running\", \"is_running\": true, \
             \"is_waiting_for_input\": true, \"step_name\": \"initial_research\"}",
        )
        .unwrap();
        assert!(status.is_running);
        assert!(status.is_waiting_for_input);
        assert_eq!(status.step_name.as_deref(), Some("initial_research"));
    }

    #[test]
    fn test_interaction_response_parses_nested_blackboard() {
        let response: InteractionStatusResponse = serde_json::from_str(
            "{\"status\": \"success\", \
             \"interaction\": {\"mode\": \"automated\", \"status\": \"running\"}, \
             \"blackboard\": {\"phase\": \"Testing\", \"iterations\": 2}}",
        )
        .unwrap();
        assert_eq!(response.interaction.mode, InteractionMode::Automated);
        assert_eq!(response.blackboard.phase, "Testing");
        assert_eq!(response.blackboard.iterations, 2);
    }

    #[test]
    fn test_rejection_message_prefers_envelope() {
        let body = "{\"status\": \"error\", \"message\": \"DevopsFlow is already running\"}";
        assert_eq!(rejection_message(body), "DevopsFlow is already running");
    }

    #[test]
    fn test_rejection_message_falls_back_to_raw_body() {
        assert_eq!(rejection_message("502 Bad Gateway\n"), "502 Bad Gateway");
    }

    #[test]
    fn test_url_handles_trailing_slash() {
        let gateway = HttpFlowGateway::new("http://localhost:5000/", Duration::from_secs(5));
        assert_eq!(gateway.url("status"), "http://localhost:5000/api/status");
    }
}
