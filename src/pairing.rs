//! Tool-call pairing validation and repair.
//!
//! Upstream LLM APIs reject histories in which a tool call has no result or
//! a result has no call, so before compression (and before any LLM request)
//! the history is checked and, if needed, repaired:
//! - orphaned tool-result messages are dropped;
//! - unanswered tool calls get a synthetic failure result inserted
//!   immediately after the assistant message that issued them.
//!
//! Repair never reorders retained messages and is idempotent.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::message::{Message, MessageKind};

/// Outcome of a pairing validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingReport {
    pub is_valid: bool,
    /// Result ids with no matching call.
    pub orphaned_results: Vec<String>,
    /// Call ids with no matching result.
    pub unanswered_calls: Vec<String>,
}

/// Counts of fixes applied by a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub orphaned_results_removed: usize,
    pub synthetic_results_inserted: usize,
}

/// Validate tool-call pairing over a message list.
///
/// Single forward pass building call-id and result-id maps; a result id
/// absent from the call map is orphaned, a call id absent from the result
/// map is unanswered.
pub fn validate_tool_call_pairing(messages: &[Message]) -> PairingReport {
    let mut calls: HashMap<&str, usize> = HashMap::new();
    let mut results: HashMap<&str, usize> = HashMap::new();

    for (idx, msg) in messages.iter().enumerate() {
        match msg.kind() {
            MessageKind::ToolCall => {
                for tc in &msg.tool_calls {
                    calls.insert(tc.id.as_str(), idx);
                }
            }
            MessageKind::ToolResult => {
                if let Some(id) = msg.tool_call_id.as_deref() {
                    results.insert(id, idx);
                }
            }
            MessageKind::Ordinary => {}
        }
    }

    // Report in history order so output is deterministic.
    let mut orphaned_results = Vec::new();
    let mut unanswered_calls = Vec::new();
    for msg in messages {
        match msg.kind() {
            MessageKind::ToolResult => {
                if let Some(id) = msg.tool_call_id.as_deref() {
                    if !calls.contains_key(id) && !orphaned_results.iter().any(|o| o == id) {
                        orphaned_results.push(id.to_owned());
                    }
                }
            }
            MessageKind::ToolCall => {
                for tc in &msg.tool_calls {
                    if !results.contains_key(tc.id.as_str())
                        && !unanswered_calls.iter().any(|u| u == &tc.id)
                    {
                        unanswered_calls.push(tc.id.clone());
                    }
                }
            }
            MessageKind::Ordinary => {}
        }
    }

    PairingReport {
        is_valid: orphaned_results.is_empty() && unanswered_calls.is_empty(),
        orphaned_results,
        unanswered_calls,
    }
}

/// Repair an invalid history; see the module docs for the contract.
pub fn repair_tool_call_pairing(messages: &[Message]) -> Vec<Message> {
    repair_tool_call_pairing_with_stats(messages).0
}

/// Repair variant that also reports what was fixed.
pub fn repair_tool_call_pairing_with_stats(messages: &[Message]) -> (Vec<Message>, RepairStats) {
    let report = validate_tool_call_pairing(messages);
    if report.is_valid {
        return (messages.to_vec(), RepairStats::default());
    }

    let orphaned: HashSet<&str> = report.orphaned_results.iter().map(String::as_str).collect();
    let unanswered: HashSet<&str> = report.unanswered_calls.iter().map(String::as_str).collect();

    let mut stats = RepairStats::default();
    let mut repaired = Vec::with_capacity(messages.len());

    for msg in messages {
        if msg.kind() == MessageKind::ToolResult {
            if let Some(id) = msg.tool_call_id.as_deref() {
                if orphaned.contains(id) {
                    stats.orphaned_results_removed += 1;
                    continue;
                }
            }
        }

        let synthesize: Vec<String> = msg
            .tool_calls
            .iter()
            .filter(|tc| unanswered.contains(tc.id.as_str()))
            .map(|tc| tc.id.clone())
            .collect();

        repaired.push(msg.clone());

        for id in synthesize {
            repaired.push(synthetic_failure_result(&id));
            stats.synthetic_results_inserted += 1;
        }
    }

    if stats != RepairStats::default() {
        warn!(
            orphaned = stats.orphaned_results_removed,
            synthetic = stats.synthetic_results_inserted,
            "repaired tool-call pairing"
        );
    }

    (repaired, stats)
}

/// Substitute result for a call that never got a real answer.
fn synthetic_failure_result(call_id: &str) -> Message {
    Message::tool_result(
        call_id,
        format!(
            "Tool execution failed to return a result; this failure response \
             was inserted automatically for tool call {call_id}."
        ),
    )
}
