//! Provider-agnostic message model.
//!
//! Every provider adapter translates to and from these types, so the turn
//! loop only ever manipulates [`Message`] and [`ContentBlock`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message.
///
/// `Assistant` and `Model` both denote the LLM; which one a message carries
/// depends on the provider that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input and tool results
    User,
    /// Anthropic-style model output
    Assistant,
    /// Gemini-style model output
    Model,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Model => "model",
        }
    }

    /// Whether the role belongs to the LLM side of the dialogue
    pub fn is_model(&self) -> bool {
        matches!(self, Role::Assistant | Role::Model)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Provider-assigned id, echoed back by the matching [`ToolResult`]
    pub id: String,
    /// Name of the tool to run
    pub name: String,
    /// Raw JSON arguments
    pub input: serde_json::Value,
    /// Opaque provider token that must accompany the call when replayed
    /// (Gemini thought signatures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

/// The outcome of one [`ToolUse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the tool use this answers
    pub tool_use_id: String,
    /// Name of the tool that ran
    pub tool_name: String,
    /// Output (or error text) fed back to the model
    pub content: String,
    /// Whether the tool failed
    #[serde(default)]
    pub is_error: bool,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text {
        /// The text itself
        text: String,
    },
    /// Model-requested tool call
    ToolUse(ToolUse),
    /// Answer to a tool call
    ToolResult(ToolResult),
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create a tool-use block
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
            continuation: None,
        })
    }

    /// Create a tool-result block
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult(ToolResult {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error,
        })
    }

    /// Text payload, if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Tool use payload, if this is a tool-use block
    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    /// Tool result payload, if this is a tool-result block
    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

/// A single turn-level message in a conversation.
///
/// `sequence` and `created_at` are stamped by
/// [`Conversation::append`](crate::store::Conversation::append).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    sequence: usize,
}

impl Message {
    /// Create a message with the given role and content
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
            sequence: 0,
        }
    }

    /// Create a user message holding a single text block
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Position of this message within its conversation
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub(crate) fn stamp(&mut self, sequence: usize) {
        self.sequence = sequence;
        self.created_at = Utc::now();
    }

    /// Iterate over the tool-use blocks in order
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(ContentBlock::as_tool_use)
    }

    /// Whether the message requests at least one tool call
    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}
