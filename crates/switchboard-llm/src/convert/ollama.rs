//! Conversion between internal types and Ollama wire format

use switchboard_config::OllamaOptions as OllamaSettings;

use super::{SyntheticIds, object_or_empty, synthetic_message_id};
use crate::error::LlmError;
use crate::protocol::ollama::{
    OllamaFunction, OllamaFunctionCall, OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse, OllamaTool,
    OllamaToolCall,
};
use crate::stream::{Flow, StreamNormalizer};
use crate::types::{AiResponse, AssistantMessage, ChatMessage, ChatRequest, MessageContent, Role, StopReason, Usage};

// -- Outbound: internal request -> Ollama wire request --

/// Encode a chat request
pub fn encode_request(request: &ChatRequest, model: &str, stream: bool, settings: &OllamaSettings) -> OllamaRequest {
    let (system, turns) = request.split_system();

    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(system) = system {
        messages.push(OllamaMessage {
            role: "system".to_owned(),
            content: system,
            ..OllamaMessage::default()
        });
    }
    for msg in turns {
        encode_message(msg, &mut messages);
    }

    let tools = request
        .tools
        .iter()
        .map(|t| OllamaTool {
            tool_type: "function",
            function: OllamaFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.to_json(),
            },
        })
        .collect();

    let options = OllamaOptions {
        temperature: request.temperature,
        top_p: request.top_p,
        num_predict: request.max_tokens,
        num_ctx: settings.num_ctx,
        stop: request.stop_sequences.clone(),
    };

    OllamaRequest {
        model: model.to_owned(),
        messages,
        stream,
        tools,
        options: (!options.is_empty()).then_some(options),
        keep_alive: settings.keep_alive.clone(),
    }
}

/// Append the wire messages for one internal message
///
/// Tool results become `tool` messages; the daemon matches them to
/// calls by position, so no id is sent.
fn encode_message(msg: &ChatMessage, out: &mut Vec<OllamaMessage>) {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::User | Role::Tool | Role::System => "user",
    };

    let mut text = String::new();
    let mut images = Vec::new();
    let mut tool_calls = Vec::new();

    for block in &msg.content {
        match block {
            MessageContent::Text { text: fragment } => text.push_str(fragment),
            MessageContent::Image { data, .. } => images.push(data.clone()),
            MessageContent::ToolUse { name, input, .. } => tool_calls.push(OllamaToolCall {
                function: OllamaFunctionCall {
                    name: name.clone(),
                    arguments: input.clone(),
                },
            }),
            MessageContent::ToolResult { content, .. } => out.push(OllamaMessage {
                role: "tool".to_owned(),
                content: content.clone(),
                ..OllamaMessage::default()
            }),
        }
    }

    if text.is_empty() && images.is_empty() && tool_calls.is_empty() {
        return;
    }

    out.push(OllamaMessage {
        role: role.to_owned(),
        content: text,
        images,
        tool_calls,
    });
}

// -- Inbound: Ollama wire response -> internal types --

/// Map a `done_reason` value
pub fn map_done_reason(reason: Option<&str>, has_tool_calls: bool) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        _ if has_tool_calls => StopReason::ToolUse,
        // stop, load, unload, and anything newer
        _ => StopReason::EndTurn,
    }
}

fn convert_usage(resp: &OllamaResponse) -> Option<Usage> {
    if resp.prompt_eval_count.is_none() && resp.eval_count.is_none() {
        return None;
    }

    Some(Usage {
        input_tokens: resp.prompt_eval_count.unwrap_or(0),
        output_tokens: resp.eval_count.unwrap_or(0),
    })
}

impl From<OllamaResponse> for AiResponse {
    fn from(resp: OllamaResponse) -> Self {
        let mut ids = SyntheticIds::default();
        let mut content = Vec::new();
        let usage = convert_usage(&resp);

        if let Some(message) = resp.message {
            if !message.content.is_empty() {
                content.push(MessageContent::Text { text: message.content });
            }
            for call in message.tool_calls {
                content.push(MessageContent::ToolUse {
                    id: ids.next_id(),
                    name: call.function.name,
                    input: object_or_empty(call.function.arguments),
                });
            }
        }

        let has_tool_calls = content.iter().any(|c| matches!(c, MessageContent::ToolUse { .. }));

        Self {
            message: AssistantMessage::new(synthetic_message_id(), content),
            stop_reason: map_done_reason(resp.done_reason.as_deref(), has_tool_calls),
            usage,
            dropped_tool_calls: Vec::new(),
        }
    }
}

// -- Stream conversion --

/// State tracker for converting Ollama NDJSON lines
///
/// All text lands in one block; tool calls arrive whole.
#[derive(Debug, Default)]
pub struct OllamaStreamState {
    ids: SyntheticIds,
}

impl OllamaStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line
    ///
    /// # Errors
    ///
    /// Returns `LlmError::StreamVendor` when the daemon reports an error
    pub fn apply(&mut self, line: OllamaResponse, n: &mut StreamNormalizer) -> Result<Flow, LlmError> {
        if let Some(error) = line.error.as_deref() {
            return Err(n.fail("ollama_error", error));
        }

        let usage = convert_usage(&line);

        if let Some(message) = line.message {
            if !message.content.is_empty() {
                let block = n.current_text();
                n.text(block, &message.content);
            }
            for call in message.tool_calls {
                let block = n.open_tool(self.ids.next_id(), call.function.name);
                n.tool_json(block, &object_or_empty(call.function.arguments).to_string());
                n.close(block);
            }
        }

        if !line.done {
            return Ok(Flow::Continue);
        }

        n.set_stop_reason(map_done_reason(line.done_reason.as_deref(), n.has_tool_calls()));
        if let Some(usage) = usage {
            n.add_usage(Some(usage.input_tokens), Some(usage.output_tokens));
        }

        Ok(Flow::Finish)
    }
}
