//! Tool-output elision.
//!
//! The least destructive tier: old tool results usually dominate a long
//! agent conversation, and the agent rarely needs their full text again.
//! This strategy keeps the most recent K tool-result messages intact and
//! replaces the content of every earlier one with a short placeholder that
//! names the original message, so the history keeps its full shape.

use crate::counting::estimate_messages_tokens;
use crate::message::{Content, Message, MessageKind};

use super::traits::{CompressionError, ContextCompressor};

/// Default number of most recent tool outputs kept intact.
pub const DEFAULT_KEEP_RECENT_TOOL_OUTPUTS: usize = 5;

/// A compressor that elides the content of old tool-result messages.
///
/// # Example
/// ```ignore
/// use context_engine::compression::ToolOutputElision;
///
/// let elision = ToolOutputElision::new().with_keep_recent(5);
/// let elided = elision.apply(messages);
/// ```
#[derive(Debug, Clone)]
pub struct ToolOutputElision {
    /// Most recent tool results left untouched.
    keep_recent: usize,
}

impl Default for ToolOutputElision {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolOutputElision {
    pub fn new() -> Self {
        Self {
            keep_recent: DEFAULT_KEEP_RECENT_TOOL_OUTPUTS,
        }
    }

    /// Set how many of the most recent tool outputs to keep intact.
    pub fn with_keep_recent(mut self, count: usize) -> Self {
        self.keep_recent = count;
        self
    }

    /// Elide all but the most recent `keep_recent` tool results.
    ///
    /// Messages are cloned before mutation; ordering and count are
    /// unchanged. A result whose content is already no longer than its
    /// placeholder is left alone, so the pass never grows the history.
    pub fn apply(&self, messages: Vec<Message>) -> Vec<Message> {
        let result_count = messages
            .iter()
            .filter(|m| m.kind() == MessageKind::ToolResult)
            .count();
        if result_count <= self.keep_recent {
            return messages;
        }
        let elide_first = result_count - self.keep_recent;

        let mut seen = 0usize;
        messages
            .into_iter()
            .map(|mut msg| {
                if msg.kind() == MessageKind::ToolResult {
                    seen += 1;
                    if seen <= elide_first {
                        let placeholder = placeholder_for(&msg);
                        if msg.content.text_len() > placeholder.len() {
                            msg.content = Content::Text(placeholder);
                        }
                    }
                }
                msg
            })
            .collect()
    }
}

fn placeholder_for(msg: &Message) -> String {
    let id = msg
        .message_id
        .as_deref()
        .or(msg.tool_call_id.as_deref())
        .unwrap_or("unknown");
    format!("[tool output elided to save context space, message_id: {id}]")
}

impl ContextCompressor for ToolOutputElision {
    fn compress(
        &self,
        messages: Vec<Message>,
        max_tokens: u64,
    ) -> Result<Vec<Message>, CompressionError> {
        if messages.is_empty() {
            return Ok(messages);
        }

        // If already within budget, return as-is
        if estimate_messages_tokens(&messages) <= max_tokens {
            return Ok(messages);
        }

        Ok(self.apply(messages))
    }

    fn estimate_tokens(&self, messages: &[Message]) -> u64 {
        estimate_messages_tokens(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history_with_results(count: usize) -> Vec<Message> {
        let mut messages = vec![Message::user("go")];
        for i in 0..count {
            messages.push(Message::tool_call(format!("tc_{i}"), "f", json!({})));
            messages.push(
                Message::tool_result(format!("tc_{i}"), "x".repeat(400))
                    .with_message_id(format!("msg_{i}")),
            );
        }
        messages
    }

    #[test]
    fn test_elides_all_but_most_recent() {
        // Scenario: 10 results, keep 5 -> the first 5 get placeholders.
        let elision = ToolOutputElision::new().with_keep_recent(5);
        let elided = elision.apply(history_with_results(10));

        let results: Vec<&Message> = elided
            .iter()
            .filter(|m| m.kind() == MessageKind::ToolResult)
            .collect();
        for (i, msg) in results.iter().enumerate() {
            let text = msg.content.text();
            if i < 5 {
                assert!(text.contains(&format!("msg_{i}")), "result {i} not elided");
                assert!(text.starts_with("[tool output elided"));
            } else {
                assert_eq!(text, "x".repeat(400));
            }
        }
    }

    #[test]
    fn test_few_results_untouched() {
        let elision = ToolOutputElision::new().with_keep_recent(5);
        let messages = history_with_results(3);
        assert_eq!(elision.apply(messages.clone()), messages);
    }

    #[test]
    fn test_short_content_left_alone() {
        let elision = ToolOutputElision::new().with_keep_recent(0);
        let messages = vec![Message::tool_result("tc_0", "ok").with_message_id("msg_0")];
        let elided = elision.apply(messages.clone());
        assert_eq!(elided, messages);
    }

    #[test]
    fn test_never_increases_token_count() {
        let elision = ToolOutputElision::new().with_keep_recent(2);
        let messages = history_with_results(8);
        let before = estimate_messages_tokens(&messages);
        let elided = elision.apply(messages);
        assert!(estimate_messages_tokens(&elided) <= before);
    }

    #[test]
    fn test_message_count_unchanged() {
        let elision = ToolOutputElision::new();
        let messages = history_with_results(9);
        let len = messages.len();
        assert_eq!(elision.apply(messages).len(), len);
    }

    #[test]
    fn test_compress_within_budget_is_noop() {
        let elision = ToolOutputElision::new();
        let messages = history_with_results(8);
        let result = elision.compress(messages.clone(), u64::MAX).unwrap();
        assert_eq!(result, messages);
    }
}
