//! History compaction shared by every provider adapter.
//!
//! Adapters hold a [`HistoryCompactor`] and forward the
//! `summarize_history` / `truncate_message` trait methods to it.

use crate::message::{ContentBlock, Message};

/// Marker spliced into truncated tool output
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]...";

/// Default number of recent messages kept by compaction
pub const DEFAULT_SUMMARIZE_THRESHOLD: usize = 20;

/// Default tool-result length, in characters, above which output is truncated
pub const DEFAULT_TRUNCATE_THRESHOLD: usize = 25_000;

/// Bounds the size of history sent to a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryCompactor;

impl HistoryCompactor {
    /// Create a compactor
    pub fn new() -> Self {
        Self
    }

    /// Keep the anchor message plus the most recent `threshold` messages.
    ///
    /// Histories of at most `threshold` messages come back unchanged.
    pub fn summarize_history(&self, history: &[Message], threshold: usize) -> Vec<Message> {
        if history.len() <= threshold {
            return history.to_vec();
        }

        let mut summarized = Vec::with_capacity(threshold + 1);
        summarized.push(history[0].clone());
        summarized.extend_from_slice(&history[history.len() - threshold..]);
        summarized
    }

    /// Shorten every tool result of at least `threshold` characters to its
    /// head and tail around [`TRUNCATION_MARKER`].
    pub fn truncate_message(&self, mut msg: Message, threshold: usize) -> Message {
        for block in msg.content.iter_mut() {
            if let ContentBlock::ToolResult(result) = block {
                if let Some(truncated) = truncate_content(&result.content, threshold) {
                    result.content = truncated;
                }
            }
        }
        msg
    }
}

/// Head/tail truncation measured in characters so multi-byte text never
/// splits inside a code point. Returns `None` when no truncation is needed.
fn truncate_content(content: &str, threshold: usize) -> Option<String> {
    let len = content.chars().count();
    if len < threshold {
        return None;
    }

    let half = threshold / 2;
    let head: String = content.chars().take(half).collect();
    let tail: String = content.chars().skip(len - half).collect();
    Some(format!("{}{}{}", head, TRUNCATION_MARKER, tail))
}
