use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use super::message::{ChatMessage, MessageContent, Role};
use super::tool::ToolDefinition;
use crate::error::LlmError;

/// Provider-agnostic chat request
///
/// Owned by the caller for the duration of one call; adapters never
/// retain it.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Conversation history, system messages included
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
    /// System prompt, placed before any system-role messages
    pub system: Option<String>,
    /// Model override for this call only
    pub model: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Stop sequences
    pub stop_sequences: Vec<String>,
    /// Caller's cancellation signal
    pub cancel: CancellationToken,
}

impl ChatRequest {
    /// Request over the given messages
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Set the tools
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Override the model for this call
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output token limit
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Attach the caller's cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Combined system text and the remaining turn messages
    ///
    /// The explicit system prompt comes first, followed by the text of
    /// each system-role message in order, joined by blank lines.
    pub fn split_system(&self) -> (Option<String>, Vec<&ChatMessage>) {
        let mut system: Vec<String> = self.system.iter().filter(|s| !s.is_empty()).cloned().collect();
        let mut turns = Vec::with_capacity(self.messages.len());

        for message in &self.messages {
            if message.role == Role::System {
                let text = message.text();
                if !text.is_empty() {
                    system.push(text);
                }
            } else {
                turns.push(message);
            }
        }

        let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };
        (system, turns)
    }

    /// Check request invariants before any I/O
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` on a duplicate tool name or a
    /// tool result that answers no earlier tool use
    pub fn validate(&self) -> Result<(), LlmError> {
        let mut names = HashSet::new();
        for tool in &self.tools {
            if !names.insert(tool.name.as_str()) {
                return Err(LlmError::InvalidRequest(format!("duplicate tool name '{}'", tool.name)));
            }
        }

        let mut seen_calls = HashSet::new();
        for message in &self.messages {
            for block in &message.content {
                match block {
                    MessageContent::ToolUse { id, .. } => {
                        seen_calls.insert(id.as_str());
                    }
                    MessageContent::ToolResult { tool_use_id, .. } if !seen_calls.contains(tool_use_id.as_str()) => {
                        return Err(LlmError::InvalidRequest(format!(
                            "tool result references unknown tool use '{tool_use_id}'"
                        )));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputSchema;

    #[test]
    fn split_system_merges_prompt_and_system_messages() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hi"),
            ChatMessage::system("no emoji"),
        ])
        .with_system("you are a shell");

        let (system, turns) = request.split_system();
        assert_eq!(system.as_deref(), Some("you are a shell\n\nbe terse\n\nno emoji"));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[test]
    fn system_only_request_has_no_turns() {
        let request = ChatRequest::new(vec![ChatMessage::system("only rules")]);
        let (system, turns) = request.split_system();
        assert_eq!(system.as_deref(), Some("only rules"));
        assert!(turns.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_tool_names() {
        let tool = ToolDefinition::new("read", "read a file", InputSchema::default());
        let request = ChatRequest::new(vec![ChatMessage::user("x")]).with_tools(vec![tool.clone(), tool]);
        let err = request.validate().unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(msg) if msg.contains("read")));
    }

    #[test]
    fn rejects_orphan_tool_result() {
        let request = ChatRequest::new(vec![ChatMessage::new(
            Role::User,
            vec![MessageContent::tool_result("call_9", "done")],
        )]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn accepts_linked_tool_result() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("list files"),
            ChatMessage::new(
                Role::Assistant,
                vec![MessageContent::tool_use("call_1", "ls", serde_json::json!({}))],
            ),
            ChatMessage::new(Role::User, vec![MessageContent::tool_result("call_1", "a.rs")]),
        ]);
        assert!(request.validate().is_ok());
    }
}
