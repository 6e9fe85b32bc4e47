//! Conversion between internal types and Anthropic wire format

use std::collections::HashMap;

use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool,
    AnthropicUsage,
};
use crate::stream::{Flow, StreamNormalizer};
use crate::types::{AiResponse, AssistantMessage, ChatMessage, ChatRequest, MessageContent, Role, StopReason, Usage};

/// Default max tokens when not specified (Anthropic requires this field)
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: internal types -> Anthropic wire format --

/// Encode a chat request
pub fn encode_request(request: &ChatRequest, model: &str, stream: bool) -> AnthropicRequest {
    let (system, turns) = request.split_system();

    let tools = request
        .tools
        .iter()
        .map(|t| AnthropicTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.input_schema.to_json(),
        })
        .collect();

    AnthropicRequest {
        model: model.to_owned(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system,
        messages: turns.into_iter().map(encode_message).collect(),
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop_sequences.clone(),
        stream,
        tools,
    }
}

/// Convert an internal message to Anthropic wire format
///
/// Tool results travel in user turns, so the tool role maps to "user".
fn encode_message(msg: &ChatMessage) -> AnthropicMessage {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::Tool | Role::User | Role::System => "user",
    };

    let content = msg
        .content
        .iter()
        .map(|block| match block {
            MessageContent::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
            MessageContent::Image { media_type, data } => AnthropicContentBlock::Image {
                source: AnthropicImageSource {
                    source_type: "base64",
                    media_type: media_type.clone(),
                    data: data.clone(),
                },
            },
            MessageContent::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            MessageContent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => AnthropicContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
        .collect();

    AnthropicMessage { role, content }
}

// -- Inbound: Anthropic wire format -> internal types --

/// Map a `stop_reason` value
pub fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "refusal" => StopReason::Error,
        // end_turn, pause_turn, and anything newer
        _ => StopReason::EndTurn,
    }
}

fn convert_usage(usage: AnthropicUsage) -> Usage {
    Usage {
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
    }
}

impl From<AnthropicResponse> for AiResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(MessageContent::Text { text }),
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    Some(MessageContent::ToolUse { id, name, input })
                }
                AnthropicResponseBlock::Unsupported => None,
            })
            .collect();

        Self {
            message: AssistantMessage::new(resp.id, content),
            stop_reason: resp.stop_reason.as_deref().map(map_stop_reason).unwrap_or_default(),
            usage: resp.usage.map(convert_usage),
            dropped_tool_calls: Vec::new(),
        }
    }
}

// -- Stream conversion --

/// State tracker for converting Anthropic stream events
///
/// Anthropic indexes blocks itself; vendor indices are mapped onto the
/// normalizer's so unsupported block types leave no gaps.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    blocks: HashMap<u32, u32>,
}

impl AnthropicStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one vendor event
    ///
    /// # Errors
    ///
    /// Returns `LlmError::StreamVendor` for an in-band `error` event
    pub fn apply(&mut self, event: AnthropicStreamEvent, n: &mut StreamNormalizer) -> Result<Flow, LlmError> {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                n.start(Some(&message.id));
                if let Some(usage) = message.usage {
                    n.add_usage(usage.input_tokens, usage.output_tokens);
                }
            }

            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } => {
                    let block = n.open_text();
                    n.text(block, &text);
                    self.blocks.insert(index, block);
                }
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    let block = n.open_tool(id, name);
                    self.blocks.insert(index, block);
                }
                AnthropicStreamContentBlock::Unsupported => {
                    tracing::debug!(index, "ignoring unsupported Anthropic content block");
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                if let Some(&block) = self.blocks.get(&index) {
                    match delta {
                        AnthropicStreamDelta::TextDelta { text } => n.text(block, &text),
                        AnthropicStreamDelta::InputJsonDelta { partial_json } => n.tool_json(block, &partial_json),
                        AnthropicStreamDelta::Unsupported => {}
                    }
                }
            }

            AnthropicStreamEvent::ContentBlockStop { index } => {
                if let Some(block) = self.blocks.remove(&index) {
                    n.close(block);
                }
            }

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason.as_deref() {
                    n.set_stop_reason(map_stop_reason(reason));
                }
                if let Some(usage) = usage {
                    n.add_usage(usage.input_tokens, usage.output_tokens);
                }
            }

            AnthropicStreamEvent::MessageStop => return Ok(Flow::Finish),

            AnthropicStreamEvent::Error { error } => return Err(n.fail(error.error_type, error.message)),

            AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {}
        }

        Ok(Flow::Continue)
    }
}
