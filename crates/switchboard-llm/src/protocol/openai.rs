//! OpenAI chat completions API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// `OpenAI` chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OpenAiTool>,
    /// Stream options (e.g. `include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
}

/// Stream options for `OpenAI` requests
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OpenAiStreamOptions {
    /// Whether to include usage in the final stream chunk
    pub include_usage: bool,
}

/// A message in `OpenAI` format
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    /// Role: system, user, assistant, or tool
    pub role: &'static str,
    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAiContent>,
    /// Tool calls (assistant messages)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OpenAiToolCall>,
    /// Tool call ID (tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content can be a plain string or an array of parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    /// Plain text
    Text(String),
    /// Multimodal content parts
    Parts(Vec<OpenAiContentPart>),
}

/// A content part
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text part
    Text {
        /// The text content
        text: String,
    },
    /// Image URL part
    ImageUrl {
        /// Image URL details
        image_url: OpenAiImageUrl,
    },
}

/// Image URL reference
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiImageUrl {
    /// URL or `data:` URI
    pub url: String,
}

/// Tool definition in `OpenAI` format
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function definition
    pub function: OpenAiFunction,
}

/// Function definition
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// A tool call in a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    /// Call identifier
    pub id: String,
    /// Always "function"
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// Function call details
    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments as a JSON string
    #[serde(default)]
    pub arguments: String,
}

// -- Response types --

/// `OpenAI` chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// Completion choices
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// A completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    /// Assistant message
    pub message: OpenAiChoiceMessage,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls
    #[serde(default)]
    pub tool_calls: Vec<OpenAiToolCall>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpenAiUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

// -- Streaming types --

/// Streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// Choices with deltas
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage (present on final chunk when `stream_options.include_usage` is true)
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
    /// In-band error some compatible servers send mid-stream
    #[serde(default)]
    pub error: Option<OpenAiErrorDetail>,
}

/// Streaming choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Delta content
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Finish reason (on final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content in a stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Content fragment
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragments
    #[serde(default)]
    pub tool_calls: Vec<OpenAiStreamToolCall>,
}

/// Tool call fragment in a stream
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Tool call index, stable across fragments of one call
    pub index: u32,
    /// Call ID (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Function details
    #[serde(default)]
    pub function: Option<OpenAiStreamFunctionCall>,
}

/// Function call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    /// Function name (first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Error detail
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiErrorDetail {
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

// -- Models list types --

/// Model list response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiModelList {
    /// List of models
    #[serde(default)]
    pub data: Vec<OpenAiModel>,
}

/// Model info
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiModel {
    /// Model identifier
    pub id: String,
}
