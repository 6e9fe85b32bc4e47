use serde::{Deserialize, Serialize};

use super::message::Role;
use super::response::{StopReason, Usage};

/// Kind of content block opened by `ContentBlockStart`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Text block
    Text,
    /// Tool call block
    ToolUse,
}

/// Incremental content within a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Text fragment
    TextDelta {
        /// Fragment
        text: String,
    },
    /// Tool argument JSON fragment
    InputJsonDelta {
        /// Fragment
        partial_json: String,
    },
}

/// One normalized increment of a streaming response
///
/// Events arrive in order: `MessageStart`, then per-block
/// start/delta/stop, then `MessageDelta` and `MessageStop`. `Error`
/// aborts the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream opened
    MessageStart {
        /// Message id
        id: String,
        /// Always `Role::Assistant`
        role: Role,
    },
    /// A content block opened
    ContentBlockStart {
        /// Block index, non-decreasing per call
        index: u32,
        /// Block kind
        kind: BlockKind,
        /// Tool call id for tool blocks
        #[serde(rename = "toolId", default, skip_serializing_if = "Option::is_none")]
        tool_id: Option<String>,
        /// Tool name for tool blocks
        #[serde(rename = "toolName", default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
    /// Content appended to an open block
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Fragment
        delta: BlockDelta,
    },
    /// A content block closed
    ContentBlockStop {
        /// Block index
        index: u32,
    },
    /// Final message metadata
    MessageDelta {
        /// Normalized stop reason
        #[serde(rename = "stopReason")]
        stop_reason: StopReason,
        /// Token usage, when reported
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    /// Stream finished
    MessageStop,
    /// Vendor signaled an in-band error
    Error {
        /// Vendor error type
        #[serde(rename = "errorType")]
        error_type: String,
        /// Vendor error message
        message: String,
    },
}
