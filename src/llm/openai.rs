use crate::config::Settings;
use crate::llm::client::{
    ChatMessage, INITIAL_BACKOFF_MS, LlmClient, LlmError, MAX_RETRIES, strip_think_tags,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const TEMPERATURE: f32 = 0.2;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and any OpenAI-compatible endpoint
/// (LM Studio, vLLM, Ollama's compat server) selected via `api_base`.
///
/// Local endpoints commonly run without authentication, so a missing key
/// is tolerated here and only the header is omitted.
pub struct OpenAiCompatClient {
    api_key: Option<String>,
    model: String,
    api_base: String,
    http_client: Client,
}

impl OpenAiCompatClient {
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http_client,
        })
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.api_base.trim_end_matches('/')
        );

        let request_body = ChatRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
        };

        let mut request = self
            .http_client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request_body);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::NetworkError(e)
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let api_response: ChatResponse = response.json().await?;
            return api_response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| LlmError::InvalidResponse("no content in response".to_string()));
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
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=MAX_RETRIES {
            match self.attempt(messages).await {
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
