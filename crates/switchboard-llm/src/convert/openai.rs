//! Conversion between internal types and `OpenAI` wire format

use std::collections::HashMap;

use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::stream::{Flow, StreamNormalizer, decode_arguments};
use crate::types::{AiResponse, AssistantMessage, ChatMessage, ChatRequest, MessageContent, Role, StopReason, Usage};

// -- Outbound: internal types -> OpenAI wire format --

/// Encode a chat request
///
/// `include_usage` asks for a trailing usage chunk when streaming.
pub fn encode_request(request: &ChatRequest, model: &str, stream: bool, include_usage: bool) -> OpenAiRequest {
    let (system, turns) = request.split_system();

    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(system) = system {
        messages.push(OpenAiMessage {
            role: "system",
            content: Some(OpenAiContent::Text(system)),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
    }
    for msg in turns {
        encode_message(msg, &mut messages);
    }

    let tools = request
        .tools
        .iter()
        .map(|t| OpenAiTool {
            tool_type: "function",
            function: OpenAiFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.to_json(),
            },
        })
        .collect();

    OpenAiRequest {
        model: model.to_owned(),
        messages,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        stop: request.stop_sequences.clone(),
        stream,
        tools,
        stream_options: (stream && include_usage).then_some(OpenAiStreamOptions { include_usage: true }),
    }
}

/// Append the wire messages for one internal message
///
/// Tool results become separate `tool` messages placed before any
/// remaining user content, since they must directly follow the
/// assistant message that made the calls.
fn encode_message(msg: &ChatMessage, out: &mut Vec<OpenAiMessage>) {
    if msg.role == Role::Assistant {
        out.push(encode_assistant(msg));
        return;
    }

    let mut parts = Vec::new();
    for block in &msg.content {
        match block {
            MessageContent::Text { text } => parts.push(OpenAiContentPart::Text { text: text.clone() }),
            MessageContent::Image { media_type, data } => parts.push(OpenAiContentPart::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: format!("data:{media_type};base64,{data}"),
                },
            }),
            MessageContent::ToolResult {
                tool_use_id, content, ..
            } => out.push(OpenAiMessage {
                role: "tool",
                content: Some(OpenAiContent::Text(content.clone())),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_use_id.clone()),
            }),
            MessageContent::ToolUse { name, .. } => {
                tracing::debug!(tool = %name, "dropping tool_use outside an assistant message");
            }
        }
    }

    if parts.is_empty() {
        return;
    }

    let single_text = match parts.as_slice() {
        [OpenAiContentPart::Text { text }] => Some(text.clone()),
        _ => None,
    };
    let content = single_text.map_or_else(|| OpenAiContent::Parts(parts), OpenAiContent::Text);

    out.push(OpenAiMessage {
        role: "user",
        content: Some(content),
        tool_calls: Vec::new(),
        tool_call_id: None,
    });
}

fn encode_assistant(msg: &ChatMessage) -> OpenAiMessage {
    let text = msg.text();
    let tool_calls = msg
        .content
        .iter()
        .filter_map(|block| match block {
            MessageContent::ToolUse { id, name, input } => Some(OpenAiToolCall {
                id: id.clone(),
                tool_type: "function".to_owned(),
                function: OpenAiFunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            _ => None,
        })
        .collect();

    OpenAiMessage {
        role: "assistant",
        content: (!text.is_empty()).then_some(OpenAiContent::Text(text)),
        tool_calls,
        tool_call_id: None,
    }
}

// -- Inbound: OpenAI wire format -> internal types --

/// Map a `finish_reason` value
pub fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "content_filter" => StopReason::Error,
        // stop, and anything newer
        _ => StopReason::EndTurn,
    }
}

const fn convert_usage(usage: OpenAiUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

impl From<OpenAiResponse> for AiResponse {
    fn from(resp: OpenAiResponse) -> Self {
        let mut content = Vec::new();
        let mut dropped_tool_calls = Vec::new();
        let mut stop_reason = StopReason::EndTurn;

        if let Some(choice) = resp.choices.into_iter().next() {
            if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
                content.push(MessageContent::Text { text });
            }

            for call in choice.message.tool_calls {
                let index = u32::try_from(content.len() + dropped_tool_calls.len()).unwrap_or(u32::MAX);
                match decode_arguments(index, &call.id, &call.function.name, &call.function.arguments) {
                    Ok(input) => content.push(MessageContent::ToolUse {
                        id: call.id,
                        name: call.function.name,
                        input,
                    }),
                    Err(dropped) => dropped_tool_calls.push(dropped),
                }
            }

            stop_reason = choice.finish_reason.as_deref().map(map_finish_reason).unwrap_or_default();
        }

        Self {
            message: AssistantMessage::new(resp.id, content),
            stop_reason,
            usage: resp.usage.map(convert_usage),
            dropped_tool_calls,
        }
    }
}

// -- Stream conversion --

/// State tracker for converting `OpenAI` stream chunks
///
/// Tool calls are keyed by the vendor's per-call index; the id and name
/// arrive once and the arguments arrive in fragments after them.
#[derive(Debug, Default)]
pub struct OpenAiStreamState {
    tool_blocks: HashMap<u32, u32>,
}

impl OpenAiStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk
    ///
    /// # Errors
    ///
    /// Returns `LlmError::StreamVendor` when the chunk carries an error
    pub fn apply(&mut self, chunk: OpenAiStreamChunk, n: &mut StreamNormalizer) -> Result<Flow, LlmError> {
        if let Some(error) = chunk.error {
            return Err(n.fail(error.error_type.unwrap_or_else(|| "error".to_owned()), error.message));
        }

        n.start(Some(&chunk.id));

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                let block = n.current_text();
                n.text(block, &text);
            }

            for call in choice.delta.tool_calls {
                let (name, arguments) = call.function.map_or((None, None), |f| (f.name, f.arguments));

                let block = match self.tool_blocks.get(&call.index) {
                    Some(&block) => block,
                    None => {
                        let id = call.id.unwrap_or_else(|| format!("call_{}", call.index));
                        let block = n.open_tool(id, name.unwrap_or_default());
                        self.tool_blocks.insert(call.index, block);
                        block
                    }
                };

                if let Some(arguments) = arguments {
                    n.tool_json(block, &arguments);
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                n.set_stop_reason(map_finish_reason(reason));
            }
        }

        if let Some(usage) = chunk.usage {
            n.add_usage(Some(usage.prompt_tokens), Some(usage.completion_tokens));
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{InputSchema, ToolDefinition};

    #[test]
    fn encodes_tool_round_trip_messages() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("add 1 and 2"),
            ChatMessage::new(
                Role::Assistant,
                vec![
                    MessageContent::text("Adding."),
                    MessageContent::tool_use("call_1", "add", json!({"a": 1, "b": 2})),
                ],
            ),
            ChatMessage::new(
                Role::User,
                vec![MessageContent::tool_result("call_1", "3"), MessageContent::text("thanks")],
            ),
        ])
        .with_system("math helper")
        .with_tools(vec![ToolDefinition::new("add", "sum", InputSchema::default())]);

        let wire = serde_json::to_value(encode_request(&request, "gpt-4o", false, true)).unwrap();
        let messages = wire["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], "Adding.");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "add");
        let args: serde_json::Value =
            serde_json::from_str(messages[2]["tool_calls"][0]["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args, json!({"a": 1, "b": 2}));
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(messages[4]["content"], "thanks");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert!(wire.get("stream_options").is_none());
    }

    #[test]
    fn stream_options_only_when_streaming_with_usage() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let with = serde_json::to_value(encode_request(&request, "gpt-4o", true, true)).unwrap();
        let without = serde_json::to_value(encode_request(&request, "gpt-4o", true, false)).unwrap();
        assert_eq!(with["stream_options"]["include_usage"], true);
        assert!(without.get("stream_options").is_none());
    }

    #[test]
    fn encodes_images_as_data_uri_parts() {
        let request = ChatRequest::new(vec![ChatMessage::new(
            Role::User,
            vec![
                MessageContent::text("what is this"),
                MessageContent::Image {
                    media_type: "image/jpeg".to_owned(),
                    data: "/9j/".to_owned(),
                },
            ],
        )]);
        let wire = serde_json::to_value(encode_request(&request, "gpt-4o", false, false)).unwrap();
        let parts = &wire["messages"][0]["content"];
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn decodes_response_and_drops_bad_arguments() {
        let resp: OpenAiResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "ok", "arguments": "{\"x\":1}"}},
                        {"id": "call_b", "type": "function", "function": {"name": "bad", "arguments": "{\"x\":"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .unwrap();

        let response = AiResponse::from(resp);

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls().count(), 1);
        assert_eq!(response.dropped_tool_calls.len(), 1);
        assert_eq!(response.dropped_tool_calls[0].tool_id, "call_b");
        assert_eq!(response.usage.unwrap().input_tokens, 5);
    }

    #[test]
    fn finish_reason_mapping_is_total() {
        assert_eq!(map_finish_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_finish_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_finish_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(map_finish_reason("function_call"), StopReason::ToolUse);
        assert_eq!(map_finish_reason("content_filter"), StopReason::Error);
        assert_eq!(map_finish_reason("whatever"), StopReason::EndTurn);
    }

    #[test]
    fn stream_accumulates_arguments_by_index() {
        let chunks = [
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_x", "type": "function", "function": {"name": "set", "arguments": ""}}]}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"x\":"}}]}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "2"}}]}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "}"}}]}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
            json!({"id": "c1", "choices": [], "usage": {"prompt_tokens": 4, "completion_tokens": 6}}),
        ];

        let mut state = OpenAiStreamState::new();
        let mut n = StreamNormalizer::new("openai");
        for chunk in chunks {
            state.apply(serde_json::from_value(chunk).unwrap(), &mut n).unwrap();
        }
        let response = n.finish();

        assert_eq!(response.message.id, "c1");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls().next(), Some(("call_x", "set", &json!({"x": 2}))));
        assert!(response.message.content.iter().all(|c| !matches!(c, MessageContent::Text { .. })));
        assert_eq!(response.usage.unwrap().output_tokens, 6);
    }

    #[test]
    fn stream_error_chunk_fails() {
        let mut state = OpenAiStreamState::new();
        let mut n = StreamNormalizer::new("openai");
        let chunk = serde_json::from_value(json!({"error": {"message": "rate limited", "type": "rate_limit_error"}})).unwrap();
        let err = state.apply(chunk, &mut n).unwrap_err();
        assert!(matches!(err, LlmError::StreamVendor { ref message, .. } if message == "rate limited"));
    }
}
