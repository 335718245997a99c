//! Token counting across provider tokenizers with graceful fallback.
//!
//! [`TokenCounter`] dispatches on the model family: Bedrock inference
//! profiles and Anthropic models go through the provider counting endpoint
//! when a client is configured; everything else — and every provider
//! failure — falls back to the character-based estimator. Counting never
//! fails: the estimator is total, so the fallback chain always terminates
//! with a number.

pub mod anthropic;
pub mod bedrock;
pub mod estimator;

use thiserror::Error;
use tracing::debug;

use crate::message::Message;
use crate::models;

pub use anthropic::{AnthropicClient, AnthropicClientBuilder, ANTHROPIC_VERSION_LATEST};
pub use estimator::{
    estimate_message_tokens, estimate_messages_tokens, estimate_tokens, ContextEstimate,
};

/// Why a provider counting path could not produce a count.
#[derive(Error, Debug)]
pub enum CountingError {
    #[error("count request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected count response: {0}")]
    Response(String),
    #[error("no counting client configured for model {0}")]
    NoClient(String),
}

/// Provider-aware token counter with an estimator fallback.
///
/// Clients are injected by the caller; the counter holds no global state
/// and is cheap to clone.
///
/// # Example
/// ```ignore
/// use context_engine::counting::{AnthropicClient, TokenCounter};
///
/// let counter = TokenCounter::new()
///     .with_anthropic(AnthropicClient::builder("api-key").build());
/// let tokens = counter.count("claude-sonnet-4-5", &messages, None).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenCounter {
    anthropic: Option<AnthropicClient>,
}

impl TokenCounter {
    /// Counter with no provider clients; every count uses the estimator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an Anthropic counting client.
    pub fn with_anthropic(mut self, client: AnthropicClient) -> Self {
        self.anthropic = Some(client);
        self
    }

    /// Build from the environment: clients are attached only for providers
    /// whose credentials are present.
    pub fn from_env() -> Self {
        let mut counter = Self::new();
        if let Some(client) = AnthropicClient::from_env() {
            counter = counter.with_anthropic(client);
        }
        counter
    }

    /// Count tokens for the message list against the named model.
    ///
    /// Provider failures are swallowed: the estimator result is returned
    /// instead and the failure is logged.
    pub async fn count(
        &self,
        model: &str,
        messages: &[Message],
        system_prompt: Option<&Message>,
    ) -> u64 {
        let provider = if bedrock::is_bedrock_profile(model) {
            self.count_bedrock(model, messages, system_prompt).await
        } else if models::is_anthropic_family(model) {
            self.count_anthropic(model, messages, system_prompt).await
        } else {
            Err(CountingError::NoClient(model.to_owned()))
        };

        match provider {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!(model, %err, "provider token count unavailable, using estimator");
                estimate_with_system(messages, system_prompt)
            }
        }
    }

    async fn count_anthropic(
        &self,
        model: &str,
        messages: &[Message],
        system_prompt: Option<&Message>,
    ) -> Result<u64, CountingError> {
        let client = self
            .anthropic
            .as_ref()
            .ok_or_else(|| CountingError::NoClient(model.to_owned()))?;
        let (payload, system) = anthropic::build_count_request(messages, system_prompt);
        client.count_tokens(model, system.as_deref(), payload).await
    }

    async fn count_bedrock(
        &self,
        profile: &str,
        messages: &[Message],
        system_prompt: Option<&Message>,
    ) -> Result<u64, CountingError> {
        let client = self
            .anthropic
            .as_ref()
            .ok_or_else(|| CountingError::NoClient(profile.to_owned()))?;
        let (model, payload, system) = bedrock::build_count_request(profile, messages, system_prompt)
            .ok_or_else(|| CountingError::NoClient(profile.to_owned()))?;
        client.count_tokens(model, system.as_deref(), payload).await
    }
}

fn estimate_with_system(messages: &[Message], system_prompt: Option<&Message>) -> u64 {
    estimator::estimate_messages_tokens(messages)
        + system_prompt.map(estimator::estimate_message_tokens).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_client_falls_back_to_estimator() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("hello world")];
        let count = counter.count("claude-sonnet-4-5", &messages, None).await;
        assert_eq!(count, estimate_messages_tokens(&messages));
    }

    #[tokio::test]
    async fn test_non_anthropic_model_uses_estimator() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("hello"), Message::assistant("hi")];
        let count = counter.count("gpt-4o", &messages, None).await;
        assert_eq!(count, estimate_messages_tokens(&messages));
    }

    #[tokio::test]
    async fn test_system_prompt_included_in_fallback_count() {
        let counter = TokenCounter::new();
        let system = Message::system("be terse");
        let messages = vec![Message::user("hello")];
        let with = counter.count("gpt-4o", &messages, Some(&system)).await;
        let without = counter.count("gpt-4o", &messages, None).await;
        assert!(with > without);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades_to_estimator() {
        // Port 9 is discard; the request fails fast and the estimator answers.
        let client = AnthropicClient::builder("key")
            .base_url("http://127.0.0.1:9")
            .build();
        let counter = TokenCounter::new().with_anthropic(client);
        let messages = vec![Message::user("hello world")];
        let count = counter.count("claude-sonnet-4-5", &messages, None).await;
        assert_eq!(count, estimate_messages_tokens(&messages));
    }
}
