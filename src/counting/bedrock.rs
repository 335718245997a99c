//! Bedrock inference-profile aliases and content reshaping.
//!
//! Bedrock-hosted Anthropic models are addressed by opaque inference-profile
//! ids. Counting for these routes through the model family's counting
//! endpoint under the concrete model id, with message content reshaped into
//! the Converse content-block format: a list of `{"text": ...}` objects,
//! plus a cache-point marker when caching metadata is present.

use serde_json::{json, Value};

use crate::message::{Content, Message, Role};

/// Known inference-profile ids and the concrete models behind them.
const PROFILE_ALIASES: &[(&str, &str)] = &[
    (
        "global.anthropic.claude-sonnet-4-5-20250929-v1:0",
        "claude-sonnet-4-5-20250929",
    ),
    (
        "us.anthropic.claude-sonnet-4-20250514-v1:0",
        "claude-sonnet-4-20250514",
    ),
    (
        "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
        "claude-3-7-sonnet-20250219",
    ),
];

/// Resolve an inference-profile id to its concrete model id.
pub fn resolve_profile(model: &str) -> Option<&'static str> {
    PROFILE_ALIASES
        .iter()
        .find(|(profile, _)| *profile == model)
        .map(|(_, concrete)| *concrete)
}

/// Whether the id names a known Bedrock inference profile.
pub fn is_bedrock_profile(model: &str) -> bool {
    resolve_profile(model).is_some()
}

/// Reshape one message's content into Converse content blocks.
pub fn to_converse_blocks(message: &Message) -> Vec<Value> {
    let mut blocks = Vec::new();
    match &message.content {
        Content::Text(t) => {
            if !t.is_empty() {
                blocks.push(json!({"text": t}));
            }
        }
        Content::Blocks(parts) => {
            for part in parts {
                match part.get("text").and_then(Value::as_str) {
                    Some(t) => blocks.push(json!({"text": t})),
                    // Non-text parts keep a placeholder so block counts line up.
                    None => blocks.push(json!({"text": "[non-text content]"})),
                }
            }
        }
    }
    for tc in &message.tool_calls {
        blocks.push(json!({
            "text": format!("{}({})", tc.function.name, tc.function.arguments),
        }));
    }
    if blocks.is_empty() {
        blocks.push(json!({"text": ""}));
    }
    if message.cache_hint {
        blocks.push(json!({"cachePoint": {"type": "default"}}));
    }
    blocks
}

/// Build the count-tokens payload for a Bedrock-profile model.
///
/// Returns `(concrete_model, messages, system)`; system-role messages are
/// excluded from the array and carried via the system parameter, as on the
/// direct Anthropic path.
pub fn build_count_request(
    profile: &str,
    messages: &[Message],
    system_prompt: Option<&Message>,
) -> Option<(&'static str, Vec<Value>, Option<String>)> {
    let concrete = resolve_profile(profile)?;

    let payload: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            json!({"role": role, "content": to_converse_blocks(m)})
        })
        .collect();

    let system = system_prompt
        .map(|m| m.content.text())
        .filter(|s| !s.is_empty());

    Some((concrete, payload, system))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_resolution() {
        assert_eq!(
            resolve_profile("us.anthropic.claude-3-7-sonnet-20250219-v1:0"),
            Some("claude-3-7-sonnet-20250219")
        );
        assert_eq!(resolve_profile("claude-sonnet-4-5-20250929"), None);
    }

    #[test]
    fn test_text_reshaped_to_converse_blocks() {
        let msg = Message::user("hello");
        assert_eq!(to_converse_blocks(&msg), vec![json!({"text": "hello"})]);
    }

    #[test]
    fn test_cache_hint_adds_cache_point_marker() {
        let msg = Message::user("hello").with_cache_hint();
        let blocks = to_converse_blocks(&msg);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], json!({"cachePoint": {"type": "default"}}));
    }

    #[test]
    fn test_count_request_maps_profile_and_strips_system() {
        let messages = vec![Message::system("terse"), Message::user("hi")];
        let (model, payload, _) = build_count_request(
            "global.anthropic.claude-sonnet-4-5-20250929-v1:0",
            &messages,
            None,
        )
        .unwrap();
        assert_eq!(model, "claude-sonnet-4-5-20250929");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0]["role"], "user");
    }

    #[test]
    fn test_unknown_profile_is_none() {
        assert!(build_count_request("anthropic.claude-unknown", &[], None).is_none());
    }
}
