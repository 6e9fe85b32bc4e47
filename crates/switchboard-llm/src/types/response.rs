use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::message::{MessageContent, Role};

/// Why a model turn ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn; also the fallback for unknown vendor signals
    #[default]
    EndTurn,
    /// Model requested one or more tool calls
    ToolUse,
    /// Output token limit reached
    MaxTokens,
    /// A stop sequence matched
    StopSequence,
    /// Vendor refused or filtered the output
    Error,
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// The assistant turn produced by a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Vendor or synthesized message id
    pub id: String,
    /// Always `Role::Assistant`
    pub role: Role,
    /// Ordered content blocks
    pub content: Vec<MessageContent>,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl AssistantMessage {
    /// Assistant message stamped with the current time
    pub fn new(id: impl Into<String>, content: Vec<MessageContent>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content,
            timestamp: now_millis(),
        }
    }
}

/// A tool call whose arguments could not be decoded
///
/// The call is omitted from the response content; the rest of the
/// response is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedToolCall {
    /// Content block index the call occupied
    pub index: u32,
    /// Tool call id
    pub tool_id: String,
    /// Tool name
    pub tool_name: String,
    /// Accumulated argument text
    pub raw: String,
    /// Parser error
    pub reason: String,
}

/// Aggregate result of a chat call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    /// The assistant turn
    pub message: AssistantMessage,
    /// Normalized stop reason
    pub stop_reason: StopReason,
    /// Token usage, when the vendor reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Tool calls omitted because their arguments were malformed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_tool_calls: Vec<DroppedToolCall>,
}

impl AiResponse {
    /// Concatenated text of every text block
    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool calls in content order as `(id, name, input)`
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.message.content.iter().filter_map(|c| match c {
            MessageContent::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
