//! Core traits for context compression strategies.

use crate::message::Message;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Token counting failed: {0}")]
    CountingFailed(String),
    #[error("Invalid message structure: {0}")]
    InvalidStructure(String),
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
}

/// Trait for pluggable context compression strategies.
///
/// Implementations can use different strategies like tool-output elision,
/// middle-out group removal, or a tiered combination.
pub trait ContextCompressor: Send + Sync {
    /// Compress messages to fit within the token budget.
    ///
    /// Returns a new vector of messages that fits within `max_tokens`
    /// whenever achievable. The implementation must preserve message
    /// ordering and keep tool call/result pairs together.
    fn compress(
        &self,
        messages: Vec<Message>,
        max_tokens: u64,
    ) -> Result<Vec<Message>, CompressionError>;

    /// Estimate the token count for a sequence of messages.
    fn estimate_tokens(&self, messages: &[Message]) -> u64;

    /// Check if compression is needed for the given messages and budget.
    fn needs_compression(&self, messages: &[Message], max_tokens: u64) -> bool {
        self.estimate_tokens(messages) > max_tokens
    }
}
