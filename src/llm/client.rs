use crate::config::Settings;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Maximum attempts per provider call, counting the first.
pub const MAX_RETRIES: u32 = 3;
/// Backoff before the second attempt; doubles per retry.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("authentication rejected by provider: {0}")]
    AuthError(String),

    #[error("rate limit exceeded, retry after {0}s")]
    RateLimitExceeded(u64),

    #[error("request timeout")]
    Timeout,

    #[error("provider returned status {0}: {1}")]
    ServerError(u16, String),

    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("no API key configured (set REPO_ANALOG_API_KEY)")]
    MissingApiKey,

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl LlmError {
    /// Transient failures are retried with backoff; everything else
    /// propagates immediately as fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimitExceeded(_) | LlmError::Timeout | LlmError::ServerError(_, _) => {
                true
            }
            LlmError::NetworkError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// One chat message in provider-neutral form.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Uniform interface over LLM providers: messages in, answer text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Build the configured provider client.
pub fn create_client(settings: &Settings) -> Result<Box<dyn LlmClient>, LlmError> {
    match settings.provider.as_str() {
        "anthropic" => Ok(Box::new(crate::llm::anthropic::AnthropicClient::new(
            settings,
        )?)),
        // "openai" and any OpenAI-compatible endpoint selected via api_base
        "openai" => Ok(Box::new(crate::llm::openai::OpenAiCompatClient::new(
            settings,
        )?)),
        other => Err(LlmError::UnsupportedProvider(other.to_string())),
    }
}

/// Strip reasoning tags some models (DeepSeek, Nemotron families) emit
/// before their actual answer.
pub(crate) fn strip_think_tags(content: &str) -> String {
    let trimmed = match content.rfind("</think>") {
        Some(idx) => &content[idx + "</think>".len()..],
        None => content,
    };
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_tags_absent() {
        assert_eq!(strip_think_tags("plain answer"), "plain answer");
    }

    #[test]
    fn test_strip_think_tags_present() {
        let raw = "<think>let me ponder</think>\nthe answer";
        assert_eq!(strip_think_tags(raw), "the answer");
    }

    #[test]
    fn test_strip_think_tags_multiple_blocks() {
        let raw = "<think>a</think>mid<think>b</think> final";
        assert_eq!(strip_think_tags(raw), "final");
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::RateLimitExceeded(10).is_transient());
        assert!(LlmError::ServerError(503, "unavailable".to_string()).is_transient());

        assert!(!LlmError::AuthError("bad key".to_string()).is_transient());
        assert!(!LlmError::ApiError("bad request".to_string()).is_transient());
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_transient());
        assert!(!LlmError::MissingApiKey.is_transient());
    }

    #[test]
    fn test_message_constructors() {
        let m = ChatMessage::system("be helpful");
        assert_eq!(m.role, "system");
        let m = ChatMessage::user("hi");
        assert_eq!(m.role, "user");
    }
}
