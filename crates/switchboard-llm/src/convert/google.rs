//! Conversion between internal types and Google Generative Language wire format

use super::{SyntheticIds, object_or_empty, synthetic_message_id};
use crate::error::LlmError;
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig,
    GoogleInlineData, GooglePart, GoogleRequest, GoogleResponse, GoogleTool, GoogleUsageMetadata,
};
use crate::stream::{Flow, StreamNormalizer};
use crate::types::{AiResponse, AssistantMessage, ChatMessage, ChatRequest, MessageContent, Role, StopReason, Usage};

// -- Outbound: internal request -> Google wire request --

/// Encode a chat request
pub fn encode_request(request: &ChatRequest) -> GoogleRequest {
    let (system, turns) = request.split_system();

    let mut contents = Vec::with_capacity(turns.len());
    for msg in turns {
        encode_message(msg, &mut contents);
    }

    let generation_config = GoogleGenerationConfig {
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: request.max_tokens,
        stop_sequences: request.stop_sequences.clone(),
    };

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GoogleTool {
            function_declarations: request
                .tools
                .iter()
                .map(|t| GoogleFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.to_json(),
                })
                .collect(),
        }]
    };

    GoogleRequest {
        contents,
        system_instruction: system.map(|text| GoogleContent {
            role: None,
            parts: vec![GooglePart::text(text)],
        }),
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
        tools,
    }
}

/// Append the content objects for one internal message
///
/// Tool results are emitted as a separate `function` turn ahead of the
/// remaining parts. The wire field identifying the answered call is
/// `functionResponse.name`; it carries the `tool_use_id`, not the
/// function name, so responses are matched by call id.
fn encode_message(msg: &ChatMessage, out: &mut Vec<GoogleContent>) {
    let role = match msg.role {
        Role::Assistant => "model",
        Role::User | Role::Tool | Role::System => "user",
    };

    let mut parts = Vec::new();
    let mut responses = Vec::new();

    for block in &msg.content {
        match block {
            MessageContent::Text { text } => {
                if !text.is_empty() {
                    parts.push(GooglePart::text(text.clone()));
                }
            }
            MessageContent::Image { media_type, data } => parts.push(GooglePart {
                inline_data: Some(GoogleInlineData {
                    mime_type: media_type.clone(),
                    data: data.clone(),
                }),
                ..GooglePart::default()
            }),
            MessageContent::ToolUse { name, input, .. } => parts.push(GooglePart {
                function_call: Some(GoogleFunctionCall {
                    name: name.clone(),
                    args: input.clone(),
                }),
                ..GooglePart::default()
            }),
            MessageContent::ToolResult {
                tool_use_id, content, ..
            } => {
                let response = serde_json::from_str::<serde_json::Value>(content)
                    .ok()
                    .filter(serde_json::Value::is_object)
                    .unwrap_or_else(|| serde_json::json!({ "result": content }));
                responses.push(GooglePart {
                    function_response: Some(GoogleFunctionResponse {
                        name: tool_use_id.clone(),
                        response,
                    }),
                    ..GooglePart::default()
                });
            }
        }
    }

    if !responses.is_empty() {
        out.push(GoogleContent {
            role: Some("function".to_owned()),
            parts: responses,
        });
    }

    if !parts.is_empty() {
        out.push(GoogleContent {
            role: Some(role.to_owned()),
            parts,
        });
    }
}

// -- Inbound: Google wire response -> internal types --

/// Map a `finishReason` value
///
/// Safety and policy blocks map to `Error`; unknown values fall back
/// to `EndTurn`. A function call in the turn overrides `STOP`.
pub fn map_finish_reason(reason: &str, has_function_call: bool) -> StopReason {
    match reason {
        "STOP" if has_function_call => StopReason::ToolUse,
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" | "LANGUAGE"
        | "MALFORMED_FUNCTION_CALL" => StopReason::Error,
        _ => StopReason::EndTurn,
    }
}

const fn convert_usage(usage: GoogleUsageMetadata) -> Usage {
    Usage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    }
}

impl From<GoogleResponse> for AiResponse {
    fn from(resp: GoogleResponse) -> Self {
        let mut ids = SyntheticIds::default();
        let mut content = Vec::new();
        let mut finish_reason = None;

        if let Some(candidate) = resp.candidates.into_iter().next() {
            finish_reason = candidate.finish_reason;
            for part in candidate.content.parts {
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    content.push(MessageContent::Text { text });
                }
                if let Some(call) = part.function_call {
                    content.push(MessageContent::ToolUse {
                        id: ids.next_id(),
                        name: call.name,
                        input: object_or_empty(call.args),
                    });
                }
            }
        }

        let has_function_call = content.iter().any(|c| matches!(c, MessageContent::ToolUse { .. }));
        let stop_reason = match finish_reason.as_deref() {
            Some(reason) => map_finish_reason(reason, has_function_call),
            None if has_function_call => StopReason::ToolUse,
            None => StopReason::EndTurn,
        };

        Self {
            message: AssistantMessage::new(resp.response_id.unwrap_or_else(synthetic_message_id), content),
            stop_reason,
            usage: resp.usage_metadata.map(convert_usage),
            dropped_tool_calls: Vec::new(),
        }
    }
}

// -- Stream conversion --

/// State tracker for converting Google stream chunks
///
/// Google sends each function call whole, so a tool block is opened,
/// filled, and closed within one chunk.
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    ids: SyntheticIds,
}

impl GoogleStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk
    ///
    /// # Errors
    ///
    /// Returns `LlmError::StreamVendor` when the chunk carries an error
    pub fn apply(&mut self, chunk: GoogleResponse, n: &mut StreamNormalizer) -> Result<Flow, LlmError> {
        if let Some(error) = chunk.error {
            let error_type = if error.status.is_empty() {
                error.code.to_string()
            } else {
                error.status
            };
            return Err(n.fail(error_type, error.message));
        }

        n.start(chunk.response_id.as_deref());

        if let Some(candidate) = chunk.candidates.into_iter().next() {
            for part in candidate.content.parts {
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    let block = n.current_text();
                    n.text(block, &text);
                }
                if let Some(call) = part.function_call {
                    let block = n.open_tool(self.ids.next_id(), call.name);
                    n.tool_json(block, &object_or_empty(call.args).to_string());
                    n.close(block);
                }
            }

            if let Some(reason) = candidate.finish_reason.as_deref() {
                n.set_stop_reason(map_finish_reason(reason, n.has_tool_calls()));
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            n.add_usage(Some(usage.prompt_token_count), Some(usage.candidates_token_count));
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
    fn encodes_roles_system_and_declarations() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("weather?"),
            ChatMessage::assistant("checking"),
        ])
        .with_max_tokens(256)
        .with_tools(vec![ToolDefinition::new("weather", "get weather", InputSchema::default())]);

        let wire = serde_json::to_value(encode_request(&request)).unwrap();

        assert_eq!(wire["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(wire["contents"][0]["role"], "user");
        assert_eq!(wire["contents"][1]["role"], "model");
        assert_eq!(wire["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(wire["tools"][0]["functionDeclarations"][0]["name"], "weather");
    }

    #[test]
    fn tool_result_name_carries_call_id() {
        let request = ChatRequest::new(vec![
            ChatMessage::new(
                Role::Assistant,
                vec![MessageContent::tool_use("tool-1", "weather", json!({"city": "Oslo"}))],
            ),
            ChatMessage::new(Role::User, vec![MessageContent::tool_result("tool-1", "sunny")]),
        ]);

        let wire = serde_json::to_value(encode_request(&request)).unwrap();

        assert_eq!(wire["contents"][0]["parts"][0]["functionCall"]["name"], "weather");
        assert_eq!(wire["contents"][1]["role"], "function");
        let response = &wire["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "tool-1");
        assert_eq!(response["response"], json!({"result": "sunny"}));
        assert!(wire.get("generationConfig").is_none());
        assert!(wire.get("tools").is_none());
    }

    #[test]
    fn decodes_function_call_with_synthetic_id() {
        let resp: GoogleResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "weather", "args": {"city": "Oslo"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}
        }))
        .unwrap();

        let response = AiResponse::from(resp);

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls().next(), Some(("tool-1", "weather", &json!({"city": "Oslo"}))));
        assert_eq!(response.usage.unwrap().output_tokens, 4);
    }

    #[test]
    fn blocked_candidate_without_content_decodes() {
        let resp: GoogleResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        let response = AiResponse::from(resp);
        assert_eq!(response.stop_reason, StopReason::Error);
        assert!(response.message.content.is_empty());
    }

    #[test]
    fn finish_reason_mapping_is_total() {
        assert_eq!(map_finish_reason("STOP", false), StopReason::EndTurn);
        assert_eq!(map_finish_reason("STOP", true), StopReason::ToolUse);
        assert_eq!(map_finish_reason("MAX_TOKENS", false), StopReason::MaxTokens);
        assert_eq!(map_finish_reason("SAFETY", false), StopReason::Error);
        assert_eq!(map_finish_reason("RECITATION", false), StopReason::Error);
        assert_eq!(map_finish_reason("OTHER", false), StopReason::EndTurn);
        assert_eq!(map_finish_reason("FINISH_REASON_UNSPECIFIED", false), StopReason::EndTurn);
        assert_eq!(map_finish_reason("BRAND_NEW", false), StopReason::EndTurn);
    }

    #[test]
    fn stream_emits_function_call_atomically() {
        let chunks = [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Let me "}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "look."}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"functionCall": {"name": "weather", "args": {"city": "Oslo"}}}]}, "finishReason": "STOP"}],
                   "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 5}}),
        ];

        let mut state = GoogleStreamState::new();
        let mut n = StreamNormalizer::new("google");
        for chunk in chunks {
            state.apply(serde_json::from_value(chunk).unwrap(), &mut n).unwrap();
        }
        let response = n.finish();

        assert_eq!(response.text(), "Let me look.");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls().next(), Some(("tool-1", "weather", &json!({"city": "Oslo"}))));
        assert_eq!(response.usage.unwrap().input_tokens, 8);
    }
}
