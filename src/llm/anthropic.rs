use crate::config::Settings;
use crate::llm::client::{
    ChatMessage, INITIAL_BACKOFF_MS, LlmClient, LlmError, MAX_RETRIES, strip_think_tags,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    api_base: String,
    http_client: Client,
}

impl AnthropicClient {
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let api_key = settings.api_key.clone().ok_or(LlmError::MissingApiKey)?;

        let http_client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            api_key,
            model: settings.model.clone(),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http_client,
        })
    }

    /// The Messages API takes the system prompt as a top-level field, not
    /// a message role.
    fn build_request(&self, messages: &[ChatMessage]) -> MessagesRequest {
        let mut system_parts = Vec::new();
        let mut wire = Vec::new();

        for message in messages {
            if message.role == "system" {
                system_parts.push(message.content.clone());
            } else {
                wire.push(WireMessage {
                    role: message.role.clone(),
                    content: message.content.clone(),
                });
            }
        }

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: wire,
        }
    }

    async fn attempt(&self, request_body: &MessagesRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e)
                }
            })?;

        let status = response.status();

        if status.is_success() {
            let api_response: MessagesResponse = response.json().await?;
            return match api_response.content.first() {
                Some(block) => Ok(block.text.clone()),
                None => Err(LlmError::InvalidResponse(
                    "no content in response".to_string(),
                )),
            };
        }

        let code = status.as_u16();
        if code == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimitExceeded(retry_after));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        match code {
            401 | 403 => Err(LlmError::AuthError(body)),
            500..=599 | 408 => Err(LlmError::ServerError(code, body)),
            _ => Err(LlmError::ApiError(format!("status {code}: {body}"))),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request_body = self.build_request(messages);

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=MAX_RETRIES {
            match self.attempt(&request_body).await {
                Ok(text) => return Ok(strip_think_tags(&text)),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let wait_ms = match &e {
                        LlmError::RateLimitExceeded(secs) => {
                            secs.saturating_mul(1000).max(backoff_ms)
                        }
                        _ => backoff_ms,
                    };
                    log::warn!(
                        "provider call failed ({e}), retrying in {wait_ms}ms (attempt {attempt}/{MAX_RETRIES})"
                    );
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    backoff_ms *= 2;
                    last_error = Some(e);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: MAX_RETRIES,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
