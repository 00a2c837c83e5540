//! Provider trait: the abstraction over the external generation capability.
//!
//! A Provider knows how to send a system framing plus a learner message to an
//! LLM and get a complete response back. Both the classification call and the
//! reply generation go through the same trait; there is no streaming contract.
//!
//! Implementations: OpenAI-compatible endpoints (OpenAI, OpenRouter, Ollama,
//! vLLM, ...), and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Calls are single-attempt: a provider never retries internally. Callers
/// impose their own timeout and route any failure to a deterministic fallback.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}

/// `generate(system, user, max_tokens, temperature) -> text`.
///
/// Builds the two-message request every pipeline stage uses and returns the
/// raw completion text.
pub async fn generate(
    provider: &dyn Provider,
    model: &str,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
    temperature: f32,
) -> std::result::Result<String, ProviderError> {
    let request = ProviderRequest {
        model: model.to_string(),
        messages: vec![Message::system(system_prompt), Message::user(user_message)],
        temperature,
        max_tokens: Some(max_tokens),
    };

    let response = provider.complete(request).await?;
    tracing::debug!(
        provider = provider.name(),
        model = %response.model,
        chars = response.message.content.chars().count(),
        "Generation complete"
    );
    Ok(response.message.content)
}
