//! Conversation context management and compression for LLM agents.
//!
//! An agent conversation grows without bound; a model's context window does
//! not. This crate keeps a message history inside a per-model token budget
//! while preserving the structure upstream LLM APIs require:
//!
//! - [`counting`] — token counting against provider tokenizers (Anthropic,
//!   Bedrock inference profiles) with a character-heuristic fallback that
//!   never fails;
//! - [`pairing`] — validation and repair of tool-call/tool-result pairings;
//! - [`grouping`] — partitioning a history into atomic groups that are never
//!   split across a compression boundary;
//! - [`compression`] — tiered compression: tool-output elision first,
//!   middle-out group removal second.
//!
//! # Example
//! ```ignore
//! use context_engine::{CompressionRequest, ContextManager, TokenCounter};
//!
//! let manager = ContextManager::new(TokenCounter::from_env());
//! let compressed = manager
//!     .compress(history, "claude-sonnet-4-5", CompressionRequest::new())
//!     .await?;
//! ```
//!
//! The engine holds no global state: provider clients are injected into the
//! [`TokenCounter`] by the caller, every invocation operates on owned data,
//! and all transformations besides the provider count calls are pure and
//! synchronous.

pub mod compression;
pub mod counting;
pub mod grouping;
pub mod message;
pub mod models;
pub mod pairing;

pub use compression::{
    CompressionError, CompressionReport, CompressionRequest, CompressionTier, ContextCompressor,
    ContextManager, MiddleOutCompressor, ToolOutputElision,
};
pub use counting::{AnthropicClient, ContextEstimate, CountingError, TokenCounter};
pub use grouping::{flatten, group_messages, MessageGroup};
pub use message::{Content, FunctionCall, Message, MessageKind, Role, ToolCall};
pub use models::{context_window, DEFAULT_CONTEXT_WINDOW};
pub use pairing::{
    repair_tool_call_pairing, repair_tool_call_pairing_with_stats, validate_tool_call_pairing,
    PairingReport, RepairStats,
};
