//! Internal request, response, and streaming types
//!
//! These are the provider-agnostic shapes every adapter converts to and
//! from.

mod message;
mod request;
mod response;
mod stream;
mod tool;

pub use message::{ChatMessage, MessageContent, Role};
pub use request::ChatRequest;
pub use response::{AiResponse, AssistantMessage, DroppedToolCall, StopReason, Usage};
pub use stream::{BlockDelta, BlockKind, StreamEvent};
pub use tool::{InputSchema, ToolDefinition};
