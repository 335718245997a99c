//! Tiered conversation compression.
//!
//! [`ContextManager`] is the engine's entry point. Per invocation it:
//! 1. repairs tool-call pairing, so the output always satisfies the
//!    pairing invariant;
//! 2. counts tokens (provider-aware, estimator fallback);
//! 3. derives the token budget from the model's context window minus a
//!    fixed safety margin, unless an explicit budget is given;
//! 4. applies tiers in order of destructiveness: a light middle-out
//!    touch-up when under budget, then tool-output elision, then
//!    middle-out removal at a tighter cap.
//!
//! There is no further tier: a history still over budget after the last
//! tier is returned as-is and the overshoot is logged, leaving the
//! provider-side error to the LLM-calling layer.

use tracing::{info, warn};

use crate::counting::{estimate_messages_tokens, TokenCounter};
use crate::message::Message;
use crate::models;
use crate::pairing::{repair_tool_call_pairing_with_stats, RepairStats};

use super::elision::{ToolOutputElision, DEFAULT_KEEP_RECENT_TOOL_OUTPUTS};
use super::middle_out::{MiddleOutCompressor, DEFAULT_MESSAGE_CAP};
use super::traits::{CompressionError, ContextCompressor};

/// Tokens reserved below the model's context window.
///
/// Fixed regardless of model size; for very small context windows the
/// derived budget saturates toward zero. Inherited behavior, kept as-is.
pub const DEFAULT_SAFETY_MARGIN: u64 = 32_000;

/// Message cap for the middle-out tier.
pub const COMPRESSED_MESSAGE_CAP: usize = 100;

/// Per-call inputs for a compression run.
#[derive(Debug, Clone, Default)]
pub struct CompressionRequest {
    /// System prompt counted alongside the history but never compressed.
    pub system_prompt: Option<Message>,
    /// Explicit token budget; otherwise derived from the model.
    pub token_budget: Option<u64>,
    /// Known token count for the input, to avoid re-counting.
    pub precomputed_tokens: Option<u64>,
}

impl CompressionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, system_prompt: Message) -> Self {
        self.system_prompt = Some(system_prompt);
        self
    }

    pub fn with_token_budget(mut self, token_budget: u64) -> Self {
        self.token_budget = Some(token_budget);
        self
    }

    pub fn with_precomputed_tokens(mut self, tokens: u64) -> Self {
        self.precomputed_tokens = Some(tokens);
        self
    }
}

/// Deepest tier applied during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionTier {
    None,
    TouchUp,
    ToolOutputElision,
    MiddleOut,
}

/// What a compression run did.
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub budget: u64,
    pub tier: CompressionTier,
    pub repair: RepairStats,
}

impl CompressionReport {
    /// Whether the result still exceeds the budget after all tiers.
    pub fn over_budget(&self) -> bool {
        self.tokens_after > self.budget
    }
}

/// Tiered compression engine.
///
/// Owns a [`TokenCounter`] (injected by the caller) and tier parameters.
///
/// # Example
/// ```ignore
/// use context_engine::{CompressionRequest, ContextManager, TokenCounter};
///
/// let manager = ContextManager::new(TokenCounter::from_env());
/// let compressed = manager
///     .compress(messages, "claude-sonnet-4-5", CompressionRequest::new())
///     .await?;
/// ```
pub struct ContextManager {
    counter: TokenCounter,
    keep_recent_tool_outputs: usize,
    message_cap: usize,
    compressed_message_cap: usize,
    safety_margin: u64,
}

impl ContextManager {
    pub fn new(counter: TokenCounter) -> Self {
        Self {
            counter,
            keep_recent_tool_outputs: DEFAULT_KEEP_RECENT_TOOL_OUTPUTS,
            message_cap: DEFAULT_MESSAGE_CAP,
            compressed_message_cap: COMPRESSED_MESSAGE_CAP,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// Set how many recent tool outputs the elision tier keeps intact.
    pub fn with_keep_recent_tool_outputs(mut self, count: usize) -> Self {
        self.keep_recent_tool_outputs = count;
        self
    }

    /// Set the message cap for the light touch-up pass.
    pub fn with_message_cap(mut self, count: usize) -> Self {
        self.message_cap = count;
        self
    }

    /// Set the message cap for the middle-out tier.
    pub fn with_compressed_message_cap(mut self, count: usize) -> Self {
        self.compressed_message_cap = count;
        self
    }

    /// Set the safety margin subtracted from the model's context window.
    pub fn with_safety_margin(mut self, tokens: u64) -> Self {
        self.safety_margin = tokens;
        self
    }

    /// Compress `messages` to fit the model's token budget.
    ///
    /// The returned list satisfies the tool-call pairing invariant and
    /// never splits a call/result group. This is the primary entry point;
    /// see [`ContextManager::compress_with_report`] for the run details.
    pub async fn compress(
        &self,
        messages: Vec<Message>,
        model: &str,
        request: CompressionRequest,
    ) -> Result<Vec<Message>, CompressionError> {
        self.compress_with_report(messages, model, request)
            .await
            .map(|(messages, _)| messages)
    }

    /// Compress and report token counts, the applied tier, and repairs.
    pub async fn compress_with_report(
        &self,
        messages: Vec<Message>,
        model: &str,
        request: CompressionRequest,
    ) -> Result<(Vec<Message>, CompressionReport), CompressionError> {
        let (repaired, repair) = repair_tool_call_pairing_with_stats(&messages);

        let system_prompt = request.system_prompt.as_ref();
        let tokens_before = match request.precomputed_tokens {
            // A precomputed count predates repair; only trust it for a
            // history that needed none.
            Some(tokens) if repair == RepairStats::default() => tokens,
            _ => self.counter.count(model, &repaired, system_prompt).await,
        };

        let budget = request
            .token_budget
            .unwrap_or_else(|| models::context_window(model).saturating_sub(self.safety_margin));

        if tokens_before <= budget {
            let touch_up = MiddleOutCompressor::new().with_max_messages(self.message_cap);
            let before_len = repaired.len();
            let result = touch_up.apply(repaired);
            let tier = if result.len() < before_len {
                CompressionTier::TouchUp
            } else {
                CompressionTier::None
            };
            let report = CompressionReport {
                tokens_before,
                tokens_after: tokens_before,
                budget,
                tier,
                repair,
            };
            return Ok((result, report));
        }

        // Tier 1: elide old tool outputs, then recount.
        let elision = ToolOutputElision::new().with_keep_recent(self.keep_recent_tool_outputs);
        let elided = elision.apply(repaired);
        let after_elision = self.counter.count(model, &elided, system_prompt).await;

        if after_elision <= budget {
            info!(
                tokens_before,
                tokens_after = after_elision,
                budget,
                "compressed within budget by eliding old tool outputs"
            );
            let report = CompressionReport {
                tokens_before,
                tokens_after: after_elision,
                budget,
                tier: CompressionTier::ToolOutputElision,
                repair,
            };
            return Ok((elided, report));
        }

        // Tier 2: middle-out removal at the tighter cap.
        let middle_out = MiddleOutCompressor::new().with_max_messages(self.compressed_message_cap);
        let trimmed = middle_out.apply(elided);
        let tokens_after = self.counter.count(model, &trimmed, system_prompt).await;

        if tokens_after > budget {
            warn!(
                tokens_after,
                budget,
                "history still exceeds budget after all tiers; returning best effort"
            );
        } else {
            info!(
                tokens_before,
                tokens_after, budget, "compressed within budget by middle-out removal"
            );
        }

        let report = CompressionReport {
            tokens_before,
            tokens_after,
            budget,
            tier: CompressionTier::MiddleOut,
            repair,
        };
        Ok((trimmed, report))
    }
}

// Implement the sync trait with a note that the async path should be used
impl ContextCompressor for ContextManager {
    fn compress(
        &self,
        messages: Vec<Message>,
        max_tokens: u64,
    ) -> Result<Vec<Message>, CompressionError> {
        // For sync contexts only: estimator-based counting, no provider
        // calls. Use the async compress for full functionality.
        warn!(
            "ContextManager::compress called synchronously; \
             provider token counting is skipped"
        );

        let repaired = crate::pairing::repair_tool_call_pairing(&messages);
        if estimate_messages_tokens(&repaired) <= max_tokens {
            let touch_up = MiddleOutCompressor::new().with_max_messages(self.message_cap);
            return Ok(touch_up.apply(repaired));
        }

        let elision = ToolOutputElision::new().with_keep_recent(self.keep_recent_tool_outputs);
        let elided = elision.apply(repaired);
        if estimate_messages_tokens(&elided) <= max_tokens {
            return Ok(elided);
        }

        let middle_out = MiddleOutCompressor::new().with_max_messages(self.compressed_message_cap);
        Ok(middle_out.apply(elided))
    }

    fn estimate_tokens(&self, messages: &[Message]) -> u64 {
        estimate_messages_tokens(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use serde_json::json;

    fn manager() -> ContextManager {
        ContextManager::new(TokenCounter::new())
    }

    fn tool_heavy_history(turns: usize, payload: usize) -> Vec<Message> {
        let mut messages = vec![Message::user("start")];
        for i in 0..turns {
            messages.push(Message::tool_call(format!("tc_{i}"), "fetch", json!({"i": i})));
            messages.push(
                Message::tool_result(format!("tc_{i}"), "y".repeat(payload))
                    .with_message_id(format!("msg_{i}")),
            );
        }
        messages
    }

    #[tokio::test]
    async fn test_under_budget_returned_unchanged() {
        let messages = vec![Message::user("hello"), Message::assistant("hi")];
        let (result, report) = manager()
            .compress_with_report(messages.clone(), "claude-sonnet-4-5", CompressionRequest::new())
            .await
            .unwrap();
        assert_eq!(result, messages);
        assert_eq!(report.tier, CompressionTier::None);
        assert!(!report.over_budget());
    }

    #[tokio::test]
    async fn test_under_budget_touch_up_applies_message_cap() {
        let mut messages = Vec::new();
        for i in 0..30 {
            messages.push(Message::user(format!("q{i}")));
            messages.push(Message::assistant(format!("a{i}")));
        }
        let manager = manager().with_message_cap(20);
        let (result, report) = manager
            .compress_with_report(messages, "claude-sonnet-4-5", CompressionRequest::new())
            .await
            .unwrap();
        assert!(result.len() < 60);
        assert_eq!(report.tier, CompressionTier::TouchUp);
    }

    #[tokio::test]
    async fn test_elision_tier_satisfies_budget() {
        // 8 fat tool outputs; eliding all but the last few lands under budget.
        let messages = tool_heavy_history(8, 4000);
        let request = CompressionRequest::new().with_token_budget(8000);
        let (result, report) = manager()
            .compress_with_report(messages, "claude-sonnet-4-5", request)
            .await
            .unwrap();

        assert_eq!(report.tier, CompressionTier::ToolOutputElision);
        assert!(report.tokens_after <= report.budget);
        // Elision keeps the message count intact.
        assert_eq!(result.len(), 17);
    }

    #[tokio::test]
    async fn test_middle_out_tier_reached_when_elision_insufficient() {
        // Recent (kept) tool outputs alone exceed the budget, forcing tier 2.
        let messages = tool_heavy_history(60, 4000);
        let manager = manager().with_compressed_message_cap(20);
        let request = CompressionRequest::new().with_token_budget(3000);
        let (result, report) = manager
            .compress_with_report(messages, "claude-sonnet-4-5", request)
            .await
            .unwrap();

        assert_eq!(report.tier, CompressionTier::MiddleOut);
        assert!(result.len() < 121);
    }

    #[tokio::test]
    async fn test_irreducible_history_returned_best_effort() {
        // One enormous message cannot be reduced by any tier.
        let messages = vec![Message::user("z".repeat(60_000))];
        let request = CompressionRequest::new().with_token_budget(100);
        let (result, report) = manager()
            .compress_with_report(messages.clone(), "claude-sonnet-4-5", request)
            .await
            .unwrap();

        assert_eq!(result, messages);
        assert!(report.over_budget());
    }

    #[tokio::test]
    async fn test_repair_runs_before_compression() {
        let messages = vec![
            Message::tool_call("abc", "f", json!({})),
            Message::tool_result("xyz", "orphan"),
        ];
        let (result, report) = manager()
            .compress_with_report(messages, "claude-sonnet-4-5", CompressionRequest::new())
            .await
            .unwrap();

        assert_eq!(report.repair.orphaned_results_removed, 1);
        assert_eq!(report.repair.synthetic_results_inserted, 1);
        assert!(crate::pairing::validate_tool_call_pairing(&result).is_valid);
    }

    #[tokio::test]
    async fn test_precomputed_tokens_trusted_for_clean_history() {
        let messages = vec![Message::user("hello")];
        // Absurd precomputed count forces the tiers even though the real
        // history is tiny.
        let request = CompressionRequest::new()
            .with_token_budget(10)
            .with_precomputed_tokens(1_000_000);
        let (_, report) = manager()
            .compress_with_report(messages, "claude-sonnet-4-5", request)
            .await
            .unwrap();
        assert_eq!(report.tokens_before, 1_000_000);
    }

    #[tokio::test]
    async fn test_default_budget_derived_from_context_window() {
        let messages = vec![Message::user("hello")];
        let (_, report) = manager()
            .compress_with_report(messages, "claude-sonnet-4-5", CompressionRequest::new())
            .await
            .unwrap();
        assert_eq!(report.budget, 200_000 - DEFAULT_SAFETY_MARGIN);
    }

    #[tokio::test]
    async fn test_budget_saturates_for_tiny_context_window() {
        // Unknown model with a margin larger than its window: budget is 0,
        // not a panic. Inherited fixed-margin behavior.
        let messages = vec![Message::user("hello")];
        let manager = manager().with_safety_margin(1_000_000);
        let (_, report) = manager
            .compress_with_report(messages, "tiny-model", CompressionRequest::new())
            .await
            .unwrap();
        assert_eq!(report.budget, 0);
        assert!(report.over_budget());
    }

    #[test]
    fn test_sync_trait_path_degrades_gracefully() {
        let manager = manager();
        let messages = tool_heavy_history(8, 4000);
        let result = ContextCompressor::compress(&manager, messages, 4000).unwrap();
        let elided = result
            .iter()
            .filter(|m| m.kind() == MessageKind::ToolResult)
            .filter(|m| m.content.text().starts_with("[tool output elided"))
            .count();
        assert!(elided > 0);
    }
}
