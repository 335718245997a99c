//! Anthropic token-counting client.
//!
//! A thin reqwest client for the `/v1/messages/count_tokens` endpoint,
//! configured through a builder (API key, version header, optional beta
//! flags). Construction from the environment is keyed on the presence of
//! `ANTHROPIC_API_KEY`; callers inject the client into a
//! [`TokenCounter`](crate::counting::TokenCounter) rather than the crate
//! holding a process-wide singleton.

use http::HeaderValue;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::message::{Message, Role};

use super::CountingError;

/// Latest Anthropic API version this crate targets.
pub const ANTHROPIC_VERSION_LATEST: &str = "2023-06-01";

const BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    anthropic_version: String,
    anthropic_betas: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnthropicClientBuilder {
    base_url: String,
    api_key: String,
    anthropic_version: String,
    anthropic_betas: Vec<String>,
}

impl AnthropicClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: BASE_URL.into(),
            api_key: api_key.into(),
            anthropic_version: ANTHROPIC_VERSION_LATEST.into(),
            anthropic_betas: Vec::new(),
        }
    }

    /// Set the Anthropic API version
    pub fn anthropic_version(mut self, anthropic_version: &str) -> Self {
        self.anthropic_version = anthropic_version.into();
        self
    }

    /// Add a single beta feature
    pub fn anthropic_beta(mut self, anthropic_beta: &str) -> Self {
        self.anthropic_betas.push(anthropic_beta.into());
        self
    }

    /// Add multiple beta features
    pub fn anthropic_betas(mut self, anthropic_betas: &[&str]) -> Self {
        self.anthropic_betas
            .extend(anthropic_betas.iter().copied().map(String::from));
        self
    }

    /// Override the API base URL (e.g. for a proxy).
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').into();
        self
    }

    pub fn build(self) -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            base_url: self.base_url,
            api_key: self.api_key,
            anthropic_version: self.anthropic_version,
            anthropic_betas: self.anthropic_betas,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: u64,
}

impl AnthropicClient {
    /// Create a new client builder with the given API key.
    ///
    /// # Example
    /// ```ignore
    /// use context_engine::counting::AnthropicClient;
    ///
    /// let client = AnthropicClient::builder("your-api-key")
    ///     .anthropic_beta("token-counting-2024-11-01")
    ///     .build();
    /// ```
    pub fn builder(api_key: impl Into<String>) -> AnthropicClientBuilder {
        AnthropicClientBuilder::new(api_key)
    }

    /// Construct from `ANTHROPIC_API_KEY`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| Self::builder(key).build())
    }

    /// Count input tokens for a pre-built message payload.
    ///
    /// `messages` is the provider-shaped `messages` array and `system` the
    /// separate system parameter; see [`build_count_request`].
    pub async fn count_tokens(
        &self,
        model: &str,
        system: Option<&str>,
        messages: Vec<Value>,
    ) -> Result<u64, CountingError> {
        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let mut request = self
            .http
            .post(format!("{}/v1/messages/count_tokens", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", self.anthropic_version.as_str());
        if !self.anthropic_betas.is_empty() {
            let betas = HeaderValue::from_str(&self.anthropic_betas.join(","))
                .map_err(|e| CountingError::Response(e.to_string()))?;
            request = request.header("anthropic-beta", betas);
        }

        let response = request.json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CountingError::Response(format!("{status}: {text}")));
        }

        let parsed: CountTokensResponse = response.json().await?;
        Ok(parsed.input_tokens)
    }
}

/// Build the count-tokens request payload for an Anthropic-family model.
///
/// `system`-role messages are stripped from the `messages` array; the
/// system prompt travels through the separate `system` parameter. Returns
/// `(messages, system)` ready for [`AnthropicClient::count_tokens`].
pub fn build_count_request(
    messages: &[Message],
    system_prompt: Option<&Message>,
) -> (Vec<Value>, Option<String>) {
    let payload: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(to_api_message)
        .collect();

    let system = system_prompt
        .map(|m| m.content.text())
        .or_else(|| {
            let joined: Vec<String> = messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.text())
                .collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join("\n\n"))
            }
        })
        .filter(|s| !s.is_empty());

    (payload, system)
}

/// Render one message in the Anthropic messages shape.
///
/// Tool roles are folded into user turns so the payload stays a valid
/// user/assistant alternation for counting purposes.
fn to_api_message(message: &Message) -> Value {
    let role = match message.role {
        Role::Assistant => "assistant",
        _ => "user",
    };
    let text = message.content.text();
    let mut blocks = Vec::new();
    if !text.is_empty() {
        blocks.push(json!({"type": "text", "text": text}));
    }
    for tc in &message.tool_calls {
        blocks.push(json!({
            "type": "text",
            "text": format!("{}({})", tc.function.name, tc.function.arguments),
        }));
    }
    if blocks.is_empty() {
        blocks.push(json!({"type": "text", "text": ""}));
    }
    json!({"role": role, "content": blocks})
}
