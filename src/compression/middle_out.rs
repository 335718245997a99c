//! Middle-out group removal.
//!
//! This strategy drops the middle of a conversation while preserving its
//! head (original instructions, early context) and tail (recent turns).
//! It operates on atomic groups rather than raw messages, so a tool-call
//! message is never separated from its results.

use tracing::trace;

use crate::counting::estimate_messages_tokens;
use crate::grouping::{flatten, group_messages};
use crate::message::Message;

use super::traits::{CompressionError, ContextCompressor};

/// Message-count cap applied even to histories that fit the token budget.
pub const DEFAULT_MESSAGE_CAP: usize = 320;

/// Below this many groups a history is considered irreducible.
const MIN_REDUCIBLE_GROUPS: usize = 4;

/// A compressor that keeps the first and last groups of a conversation and
/// discards the middle.
///
/// # Example
/// ```ignore
/// use context_engine::compression::MiddleOutCompressor;
///
/// let middle_out = MiddleOutCompressor::new().with_max_messages(100);
/// let trimmed = middle_out.apply(messages);
/// ```
#[derive(Debug, Clone)]
pub struct MiddleOutCompressor {
    /// Message count above which the middle is removed.
    max_messages: usize,
}

impl Default for MiddleOutCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddleOutCompressor {
    pub fn new() -> Self {
        Self {
            max_messages: DEFAULT_MESSAGE_CAP,
        }
    }

    /// Set the message count that triggers middle removal.
    pub fn with_max_messages(mut self, count: usize) -> Self {
        self.max_messages = count;
        self
    }

    /// Remove the middle of the history if it exceeds the message cap.
    ///
    /// Histories at or under the cap are returned unchanged, as are
    /// histories with fewer than four groups (irreducible). Otherwise the
    /// first and last `max(2, groups / 4)` groups are kept.
    pub fn apply(&self, messages: Vec<Message>) -> Vec<Message> {
        if messages.len() <= self.max_messages {
            return messages;
        }

        let groups = group_messages(&messages);
        let total = groups.len();
        if total < MIN_REDUCIBLE_GROUPS {
            return messages;
        }

        let keep = (total / 4).max(2);
        if keep * 2 >= total {
            return messages;
        }

        let mut kept: Vec<_> = Vec::with_capacity(keep * 2);
        let mut iter = groups.into_iter();
        for _ in 0..keep {
            if let Some(group) = iter.next() {
                kept.push(group);
            }
        }
        let tail: Vec<_> = iter.collect();
        kept.extend(tail.into_iter().skip(total - 2 * keep));

        trace!(
            groups = total,
            kept = keep * 2,
            "middle-out removed conversation middle"
        );
        flatten(kept)
    }
}

impl ContextCompressor for MiddleOutCompressor {
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
