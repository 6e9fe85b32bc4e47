use serde::{Deserialize, Serialize};

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single conversation message
///
/// Content order is significant and preserved through every codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: Role,
    /// Ordered content blocks
    pub content: Vec<MessageContent>,
}

impl ChatMessage {
    /// Build a message from a role and content blocks
    pub const fn new(role: Role, content: Vec<MessageContent>) -> Self {
        Self { role, content }
    }

    /// System message with one text block
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![MessageContent::text(text)])
    }

    /// User message with one text block
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![MessageContent::text(text)])
    }

    /// Assistant message with one text block
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![MessageContent::text(text)])
    }

    /// Concatenation of every text block
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One typed unit of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text {
        /// The text string
        text: String,
    },
    /// Inline base64-encoded image
    Image {
        /// MIME type (e.g. "image/png")
        #[serde(rename = "mediaType")]
        media_type: String,
        /// Base64-encoded bytes
        data: String,
    },
    /// Tool invocation proposed by the model
    ToolUse {
        /// Call identifier
        id: String,
        /// Tool name
        name: String,
        /// Structured arguments
        input: serde_json::Value,
    },
    /// Caller's answer to a prior `ToolUse`
    ToolResult {
        /// Identifier of the `ToolUse` being answered
        #[serde(rename = "toolUseId")]
        tool_use_id: String,
        /// Result payload
        content: String,
        /// Whether the tool failed
        #[serde(rename = "isError", default)]
        is_error: bool,
    },
}

impl MessageContent {
    /// Text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Tool invocation block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Successful tool result block
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }
}
