//! Provider-agnostic chat gateway for Switchboard
//!
//! Normalizes four vendor chat APIs (Anthropic, `OpenAI`-compatible,
//! Google Generative Language, Ollama) behind one [`Provider`] contract
//! with a common message model, a common streaming event sequence, and
//! call-scoped cancellation.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod cancel;
pub mod convert;
pub mod decode;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod secrets;
pub mod stream;
pub mod types;

pub use cancel::{CallCancellation, CancelSource};
pub use error::LlmError;
pub use fetch::RetryPolicy;
pub use gateway::Gateway;
pub use models::{ModelRegistry, StaticModelRegistry};
pub use provider::{Provider, ProviderCapabilities, ProviderDeps};
pub use registry::ProviderRegistry;
pub use secrets::{ChainedSecretService, EnvSecretService, SecretService, StaticSecretService};
pub use stream::EventSink;
pub use types::{
    AiResponse, AssistantMessage, BlockDelta, BlockKind, ChatMessage, ChatRequest, DroppedToolCall, InputSchema,
    MessageContent, Role, StopReason, StreamEvent, ToolDefinition, Usage,
};
