//! Atomic message groups.
//!
//! A group is an ordered, non-empty run of messages that must be kept or
//! dropped together: either a single ordinary message, or an assistant
//! tool-call message plus all of its resolved tool results. Compression
//! operates on groups so a boundary never falls between a call and its
//! results.

use std::collections::HashSet;

use crate::message::{Message, MessageKind};

/// An ordered, non-empty sequence of messages treated as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageGroup {
    messages: Vec<Message>,
}

impl MessageGroup {
    fn singleton(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Partition a flat message list into atomic groups.
///
/// Flattening the result reproduces the input exactly; no group boundary
/// falls between an assistant tool-call message and the results it expects.
/// A tool result whose id is not outstanding closes any open group and is
/// emitted as its own singleton, which keeps malformed histories lossless.
pub fn group_messages(messages: &[Message]) -> Vec<MessageGroup> {
    fn close(open: &mut Option<(Vec<Message>, HashSet<String>)>, groups: &mut Vec<MessageGroup>) {
        if let Some((messages, _)) = open.take() {
            groups.push(MessageGroup { messages });
        }
    }

    let mut groups: Vec<MessageGroup> = Vec::new();
    // Open group: accumulated messages + still-unresolved call ids.
    let mut open: Option<(Vec<Message>, HashSet<String>)> = None;

    for msg in messages {
        match msg.kind() {
            MessageKind::ToolCall => {
                close(&mut open, &mut groups);
                let outstanding: HashSet<String> =
                    msg.tool_calls.iter().map(|tc| tc.id.clone()).collect();
                open = Some((vec![msg.clone()], outstanding));
            }
            MessageKind::ToolResult => {
                let id = msg.tool_call_id.as_deref().unwrap_or_default();
                let mut resolved = false;
                if let Some((group, outstanding)) = open.as_mut() {
                    if outstanding.remove(id) {
                        group.push(msg.clone());
                        resolved = true;
                    }
                }
                if resolved {
                    let drained = open
                        .as_ref()
                        .is_some_and(|(_, outstanding)| outstanding.is_empty());
                    if drained {
                        close(&mut open, &mut groups);
                    }
                } else {
                    close(&mut open, &mut groups);
                    groups.push(MessageGroup::singleton(msg.clone()));
                }
            }
            MessageKind::Ordinary => {
                close(&mut open, &mut groups);
                groups.push(MessageGroup::singleton(msg.clone()));
            }
        }
    }
    close(&mut open, &mut groups);

    groups
}

/// Concatenate groups back into a flat message list.
pub fn flatten(groups: Vec<MessageGroup>) -> Vec<Message> {
    groups.into_iter().flat_map(|g| g.messages).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ordinary_messages_are_singletons() {
        let messages = vec![Message::user("a"), Message::assistant("b")];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_call_and_results_grouped() {
        let messages = vec![
            Message::user("go"),
            Message::tool_call("a1", "f", json!({})).with_tool_call("a2", "g", json!({})),
            Message::tool_result("a1", "r1"),
            Message::tool_result("a2", "r2"),
            Message::assistant("done"),
        ];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].len(), 3);
    }

    #[test]
    fn test_unexpected_result_is_defensive_singleton() {
        let messages = vec![
            Message::tool_call("a1", "f", json!({})),
            Message::tool_result("zz", "stray"),
            Message::tool_result("a1", "r1"),
        ];
        let groups = group_messages(&messages);
        // The stray result closes the open group; the real result then has
        // no open group to land in and becomes a singleton too.
        assert_eq!(groups.len(), 3);
        assert_eq!(flatten(groups), messages);
    }

    #[test]
    fn test_interleaved_ordinary_message_closes_group() {
        let messages = vec![
            Message::tool_call("a1", "f", json!({})),
            Message::user("interrupt"),
            Message::tool_result("a1", "r1"),
        ];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_flatten_round_trip() {
        let messages = vec![
            Message::system("sys"),
            Message::user("go"),
            Message::tool_call("a1", "f", json!({})),
            Message::tool_result("a1", "r1"),
            Message::tool_call("b1", "g", json!({})),
            Message::tool_result("b1", "r2"),
            Message::assistant("done"),
            Message::tool_result("orphan", "stray"),
        ];
        assert_eq!(flatten(group_messages(&messages)), messages);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_messages(&[]).is_empty());
    }

    #[test]
    fn test_trailing_open_group_is_emitted() {
        let messages = vec![Message::tool_call("a1", "f", json!({}))];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 1);
        assert_eq!(flatten(groups), messages);
    }
}
