// src/claude_client.rs
//
// Client for the Anthropic messages API, used for one thing only: turning a
// review prompt into a JSON feedback payload. Transient upstream errors
// (connect failures, 429/5xx) are retried with exponential backoff; anything
// else is surfaced once.

use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const REVIEW_MODEL: &str = "claude-3-haiku-20240307";
const REVIEW_MAX_TOKENS: u32 = 1500;
const REVIEW_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("Anthropic API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Anthropic request failed: {0}")]
    Transport(String),
    #[error("Failed to parse Anthropic response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: String,
}

impl ClaudeMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [ClaudeMessage],
}

#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<ResponseContent>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl ClaudeResponse {
    /// First text block of the reply, or empty when the model returned none.
    pub fn first_text(&self) -> &str {
        for block in &self.content {
            if let ResponseContent::Text { text } = block {
                return text;
            }
        }
        ""
    }
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: REVIEW_MODEL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn review_completion(
        &self,
        messages: Vec<ClaudeMessage>,
    ) -> Result<ClaudeResponse, ClaudeError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: REVIEW_MAX_TOKENS,
            temperature: REVIEW_TEMPERATURE,
            messages: &messages,
        };

        tracing::debug!(
            messages = request.messages.len(),
            model = %request.model,
            "Anthropic review request"
        );

        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let operation = || async {
            let response = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .timeout(Duration::from_secs(120))
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("Anthropic connection error (retrying): {}", e);
                        backoff::Error::transient(ClaudeError::Transport(e.to_string()))
                    } else {
                        backoff::Error::permanent(ClaudeError::Transport(e.to_string()))
                    }
                })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(ClaudeError::Transport(e.to_string())))?;

            if matches!(status, 429 | 500 | 502 | 503) {
                tracing::warn!(status, "Anthropic API transient error (retrying)");
                return Err(backoff::Error::transient(ClaudeError::Api { status, body }));
            }

            if !(200..300).contains(&status) {
                tracing::error!(status, "Anthropic API error");
                return Err(backoff::Error::permanent(ClaudeError::Api { status, body }));
            }

            serde_json::from_str::<ClaudeResponse>(&body)
                .map_err(|e| backoff::Error::permanent(ClaudeError::Decode(e.to_string())))
        };

        let response = retry(backoff_config, operation).await?;
        tracing::debug!(
            id = %response.id,
            model = %response.model,
            stop_reason = ?response.stop_reason,
            "Anthropic review response"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_skips_non_text_blocks() {
        let response: ClaudeResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "model": "claude-3-haiku-20240307",
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                    {"type": "text", "text": "{\"suggestions\":[]}"}
                ],
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), "{\"suggestions\":[]}");
    }

    #[test]
    fn test_first_text_empty_content() {
        let response: ClaudeResponse = serde_json::from_str(
            r#"{"id": "msg_2", "model": "m", "content": [], "stop_reason": null}"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), "");
    }
}
