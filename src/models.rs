//! Model registry: context window sizes per model family.

use crate::counting::bedrock;

/// Context window for models not present in the table.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

/// Longest-prefix table of known model families.
///
/// Entries are matched against the start of the (alias-resolved) model id,
/// most specific first.
const CONTEXT_WINDOWS: &[(&str, u64)] = &[
    ("claude-", 200_000),
    ("anthropic.claude-", 200_000),
    ("gpt-5", 400_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o", 128_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("gemini-2.5", 1_048_576),
    ("gemini-", 1_000_000),
    ("deepseek", 128_000),
    ("grok-4", 256_000),
];

/// Context window in tokens for the given model identifier.
///
/// Bedrock inference-profile ids are resolved to their concrete model first.
pub fn context_window(model: &str) -> u64 {
    let resolved = bedrock::resolve_profile(model).unwrap_or(model);
    CONTEXT_WINDOWS
        .iter()
        .filter(|(prefix, _)| resolved.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Whether the model id belongs to the Anthropic family.
pub fn is_anthropic_family(model: &str) -> bool {
    model.starts_with("claude-") || model.starts_with("anthropic.claude-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_families() {
        assert_eq!(context_window("claude-sonnet-4-5-20250929"), 200_000);
        assert_eq!(context_window("gpt-4o-mini"), 128_000);
        assert_eq!(context_window("gemini-2.5-pro"), 1_048_576);
    }

    #[test]
    fn test_longest_prefix_wins() {
        // gemini-2.5 is more specific than gemini-
        assert_eq!(context_window("gemini-2.5-flash"), 1_048_576);
        assert_eq!(context_window("gemini-1.5-pro"), 1_000_000);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        assert_eq!(context_window("mistral-large"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn test_bedrock_profile_resolves_before_lookup() {
        assert_eq!(
            context_window("global.anthropic.claude-sonnet-4-5-20250929-v1:0"),
            200_000
        );
    }
}
