//! Ollama daemon wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// `POST /api/chat` request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaRequest {
    /// Model name
    pub model: String,
    /// Conversation messages, system prompt first
    pub messages: Vec<OllamaMessage>,
    /// Stream NDJSON chunks instead of one body
    pub stream: bool,
    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OllamaTool>,
    /// Sampling options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
    /// How long the model stays loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// A chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaMessage {
    /// Role: system, user, assistant, or tool
    #[serde(default)]
    pub role: String,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Base64-encoded images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
}

/// A tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaToolCall {
    /// Function details
    pub function: OllamaFunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments as a JSON object
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct OllamaTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function definition
    pub function: OllamaFunction,
}

/// Function definition
#[derive(Debug, Clone, Serialize)]
pub struct OllamaFunction {
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Model runtime options
#[derive(Debug, Clone, Default, Serialize)]
pub struct OllamaOptions {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Context window size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl OllamaOptions {
    /// Whether no option is set
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.num_predict.is_none()
            && self.num_ctx.is_none()
            && self.stop.is_empty()
    }
}

// -- Response types --

/// One `/api/chat` response object, also one streamed line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaResponse {
    /// Message fragment (whole message when not streaming)
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    /// Whether this is the final object
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped ("stop", "length")
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    /// Generated tokens
    #[serde(default)]
    pub eval_count: Option<u32>,
    /// Error reported by the daemon
    #[serde(default)]
    pub error: Option<String>,
}

// -- Models list types --

/// `GET /api/tags` response
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTagList {
    /// Locally available models
    #[serde(default)]
    pub models: Vec<OllamaTag>,
}

/// One local model
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTag {
    /// Model name with tag (e.g. "llama3.2:latest")
    pub name: String,
}
