pub mod anthropic;
pub mod client;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, LlmClient, LlmError, create_client};
pub use openai::OpenAiCompatClient;
