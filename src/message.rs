//! Conversation message types.
//!
//! Messages carry a role, textual or structured content, and optionally a
//! list of tool-call descriptors (assistant messages) or a `tool_call_id`
//! linking a tool result back to its originating call. Classification into
//! [`MessageKind`] is derived from these typed fields at construction time,
//! so downstream passes never have to sniff content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// The function half of a tool-call descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// A tool-call descriptor carried by an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

/// Message content: plain text or a list of structured content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<Value>),
}

impl Content {
    /// Concatenated text of the content, ignoring non-text blocks.
    pub fn text(&self) -> String {
        match self {
            Content::Text(t) => t.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Total character length of the textual portion.
    pub fn text_len(&self) -> usize {
        match self {
            Content::Text(t) => t.len(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .map(str::len)
                .sum(),
        }
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_owned())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

/// Structural classification of a message, derived from typed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain conversational message with no tool linkage.
    Ordinary,
    /// Assistant message carrying one or more tool-call descriptors.
    ToolCall,
    /// Message resolving a previously issued tool call.
    ToolResult,
}

/// A single conversation message.
///
/// Ordering within a history is significant and is preserved by every
/// transformation in this crate except where compression explicitly removes
/// or elides messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier assigned by the persistence layer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub role: Role,
    pub content: Content,
    /// Tool-call descriptors; non-empty only on assistant messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result messages; links back to the originating call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Caching metadata; becomes a cache-point marker in provider payloads.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cache_hint: bool,
}

impl Message {
    fn new(role: Role, content: Content) -> Self {
        Self {
            message_id: None,
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            cache_hint: false,
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content.into())
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Assistant message issuing a single tool call.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let mut msg = Self::new(Role::Assistant, Content::Text(String::new()));
        msg.tool_calls.push(ToolCall {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        });
        msg
    }

    /// Tool-result message resolving the call with the given id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_tool_call(mut self, id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        self.tool_calls.push(ToolCall {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        });
        self
    }

    pub fn with_cache_hint(mut self) -> Self {
        self.cache_hint = true;
        self
    }

    /// Structural classification; tool linkage wins over role.
    pub fn kind(&self) -> MessageKind {
        if !self.tool_calls.is_empty() {
            MessageKind::ToolCall
        } else if self.tool_call_id.is_some() {
            MessageKind::ToolResult
        } else {
            MessageKind::Ordinary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_typed_fields() {
        assert_eq!(Message::user("hi").kind(), MessageKind::Ordinary);
        assert_eq!(
            Message::tool_call("abc", "read_file", json!({"path": "a.rs"})).kind(),
            MessageKind::ToolCall
        );
        assert_eq!(
            Message::tool_result("abc", "contents").kind(),
            MessageKind::ToolResult
        );
    }

    #[test]
    fn test_content_text_from_blocks() {
        let content = Content::Blocks(vec![
            json!({"type": "text", "text": "hello"}),
            json!({"type": "image", "source": {"data": "..."}}),
            json!({"type": "text", "text": "world"}),
        ]);
        assert_eq!(content.text(), "hello\nworld");
        assert_eq!(content.text_len(), 10);
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = Message::tool_call("tc_1", "search", json!({"q": "rust"}))
            .with_message_id("msg_1");
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_tool_role_serializes_lowercase() {
        let msg = Message::tool_result("tc_1", "ok");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "tc_1");
    }
}
