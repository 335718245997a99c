//! Fast token estimation without external dependencies.
//!
//! Uses character-based heuristics optimized for code-heavy content.
//! The 3.4 chars/token ratio accounts for code's higher symbol density
//! compared to natural language prose (~4.0 chars/token). This is the
//! universal fallback behind the provider counting paths.

use crate::message::{Content, Message};

/// Characters per token ratio, optimized for code-heavy content.
/// Natural language is typically ~4.0, code is ~3.0-3.5.
const CHARS_PER_TOKEN: f32 = 3.4;

/// Overhead tokens per message for role and formatting.
const MESSAGE_OVERHEAD: u64 = 4;

/// Flat charge for non-text content blocks (images and similar references).
const NON_TEXT_BLOCK_TOKENS: u64 = 85;

/// Estimate token count for a text string.
#[inline]
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f32 / CHARS_PER_TOKEN).ceil() as u64
}

/// Estimate token count for a single message.
pub fn estimate_message_tokens(message: &Message) -> u64 {
    let content_tokens = match &message.content {
        Content::Text(t) => estimate_tokens(t),
        Content::Blocks(blocks) => blocks
            .iter()
            .map(|b| match b.get("text").and_then(serde_json::Value::as_str) {
                Some(t) => estimate_tokens(t),
                None => NON_TEXT_BLOCK_TOKENS,
            })
            .sum(),
    };

    let tool_call_tokens: u64 = message
        .tool_calls
        .iter()
        .map(|tc| {
            // Tool name + arguments (usually JSON)
            estimate_tokens(&tc.function.name) + estimate_tokens(&tc.function.arguments.to_string())
        })
        .sum();

    let link_tokens = message
        .tool_call_id
        .as_deref()
        .map(estimate_tokens)
        .unwrap_or(0);

    content_tokens + tool_call_tokens + link_tokens + MESSAGE_OVERHEAD
}

/// Estimate token count for a sequence of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> u64 {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Pre-flight context estimation for an LLM request.
///
/// Gives callers a complete picture of context usage before invoking the
/// compression engine:
/// - System prompt tokens
/// - All message tokens (user, assistant, tool calls, tool results)
///
/// The estimation uses the 3.4 chars/token ratio optimized for code-heavy
/// content.
#[derive(Debug, Clone)]
pub struct ContextEstimate {
    /// Tokens used by the system prompt
    pub system_prompt_tokens: u64,
    /// Tokens used by all messages
    pub messages_tokens: u64,
    /// Total estimated tokens
    pub total_tokens: u64,
    /// Model's context window size
    pub context_window: u64,
    /// Percentage of context window used (0-100+)
    pub usage_percent: u32,
}

impl ContextEstimate {
    /// Create a new context estimate.
    ///
    /// # Example
    /// ```ignore
    /// use context_engine::ContextEstimate;
    ///
    /// let estimate = ContextEstimate::new(Some(&system), &messages, 200_000);
    /// println!("Using {}% of context", estimate.usage_percent);
    /// ```
    pub fn new(system_prompt: Option<&Message>, messages: &[Message], context_window: u64) -> Self {
        let system_prompt_tokens = system_prompt.map(estimate_message_tokens).unwrap_or(0);
        let messages_tokens = estimate_messages_tokens(messages);

        let total_tokens = system_prompt_tokens + messages_tokens;
        let usage_percent = if context_window > 0 {
            ((total_tokens * 100) / context_window) as u32
        } else {
            0
        };

        Self {
            system_prompt_tokens,
            messages_tokens,
            total_tokens,
            context_window,
            usage_percent,
        }
    }

    /// Check if compression should be triggered based on a threshold percentage.
    pub fn needs_compression(&self, threshold_percent: u32) -> bool {
        self.usage_percent >= threshold_percent
    }

    /// Calculate the threshold token count for a given percentage.
    pub fn threshold_tokens(&self, threshold_percent: u32) -> u64 {
        (self.context_window * threshold_percent as u64) / 100
    }
}
