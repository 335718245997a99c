//! Context compression module for managing LLM context window limits.
//!
//! This module provides tiered compression that reduces chat history to fit
//! within token budgets while preserving conversation coherence and tool
//! call/result integrity. [`ContextManager`] chains the tiers; each tier is
//! also usable on its own as a [`ContextCompressor`].

mod elision;
mod manager;
mod middle_out;
mod traits;

pub use elision::{ToolOutputElision, DEFAULT_KEEP_RECENT_TOOL_OUTPUTS};
pub use manager::{
    CompressionReport, CompressionRequest, CompressionTier, ContextManager,
    COMPRESSED_MESSAGE_CAP, DEFAULT_SAFETY_MARGIN,
};
pub use middle_out::{MiddleOutCompressor, DEFAULT_MESSAGE_CAP};
pub use traits::{CompressionError, ContextCompressor};
