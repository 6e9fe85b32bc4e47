//! Stream normalization shared by every adapter
//!
//! Vendor translators feed a [`StreamNormalizer`] with block opens,
//! fragments, and closes. The normalizer queues the resulting
//! [`StreamEvent`]s and keeps the accumulators the final [`AiResponse`]
//! is assembled from, so the aggregate always matches what the caller
//! observed. [`drive`] pulls records from a decoder, hands them to a
//! translator, and delivers the queued events under cancellation.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;

use crate::decode::{Record, RecordSource};
use crate::error::LlmError;
use crate::types::{
    AiResponse, AssistantMessage, BlockDelta, BlockKind, DroppedToolCall, MessageContent, Role, StopReason,
    StreamEvent, Usage,
};

/// Consecutive malformed records tolerated before the stream is abandoned
const MAX_CONSECUTIVE_MALFORMED: u32 = 16;

/// Caller-supplied event sink
pub type EventSink<'a> = &'a mut (dyn FnMut(StreamEvent) + Send);

/// Outcome of closing one content block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    /// Text block finished
    Text,
    /// Tool call finished with decoded arguments
    ToolUse(serde_json::Value),
    /// Tool call omitted because its arguments did not parse
    Dropped(DroppedToolCall),
    /// Index was unknown or already closed
    Ignored,
}

/// What the driver does after a record has been translated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Vendor signaled the end of the message
    Finish,
}

#[derive(Debug)]
enum Body {
    Text(String),
    Tool {
        id: String,
        name: String,
        json: String,
        input: Option<serde_json::Value>,
    },
}

#[derive(Debug)]
struct Block {
    body: Body,
    open: bool,
}

/// Per-call stream state machine
#[derive(Debug)]
pub struct StreamNormalizer {
    provider: String,
    id: Option<String>,
    blocks: Vec<Block>,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
    dropped: Vec<DroppedToolCall>,
    pending: VecDeque<StreamEvent>,
}

impl StreamNormalizer {
    /// Fresh state for one streamed call
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: None,
            blocks: Vec::new(),
            stop_reason: None,
            usage: None,
            dropped: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Emit `message_start`, once
    ///
    /// Without a vendor id a `msg_<uuid>` id is synthesized.
    pub fn start(&mut self, id: Option<&str>) {
        if self.id.is_some() {
            return;
        }

        let id = id
            .filter(|id| !id.is_empty())
            .map_or_else(|| format!("msg_{}", uuid::Uuid::new_v4().simple()), ToOwned::to_owned);
        self.pending.push_back(StreamEvent::MessageStart {
            id: id.clone(),
            role: Role::Assistant,
        });
        self.id = Some(id);
    }

    /// Open a text block and return its index
    pub fn open_text(&mut self) -> u32 {
        self.open(Body::Text(String::new()), None, None)
    }

    /// Open a tool call block and return its index
    pub fn open_tool(&mut self, id: impl Into<String>, name: impl Into<String>) -> u32 {
        let id = id.into();
        let name = name.into();
        let (tool_id, tool_name) = (Some(id.clone()), Some(name.clone()));
        self.open(
            Body::Tool {
                id,
                name,
                json: String::new(),
                input: None,
            },
            tool_id,
            tool_name,
        )
    }

    /// Index of the most recent block if it is an open text block,
    /// otherwise a newly opened one
    pub fn current_text(&mut self) -> u32 {
        match self.blocks.last() {
            Some(Block {
                body: Body::Text(_),
                open: true,
            }) => self.last_index(),
            _ => self.open_text(),
        }
    }

    /// Append a text fragment to an open text block
    pub fn text(&mut self, index: u32, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let Some(Block {
            body: Body::Text(text),
            open: true,
        }) = self.blocks.get_mut(index as usize)
        else {
            tracing::debug!(provider = %self.provider, index, "text fragment for unknown block");
            return;
        };

        text.push_str(fragment);
        self.pending.push_back(StreamEvent::ContentBlockDelta {
            index,
            delta: BlockDelta::TextDelta {
                text: fragment.to_owned(),
            },
        });
    }

    /// Append an argument fragment to an open tool block
    pub fn tool_json(&mut self, index: u32, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let Some(Block {
            body: Body::Tool { json, .. },
            open: true,
        }) = self.blocks.get_mut(index as usize)
        else {
            tracing::debug!(provider = %self.provider, index, "argument fragment for unknown block");
            return;
        };

        json.push_str(fragment);
        self.pending.push_back(StreamEvent::ContentBlockDelta {
            index,
            delta: BlockDelta::InputJsonDelta {
                partial_json: fragment.to_owned(),
            },
        });
    }

    /// Close a block, decoding tool arguments
    pub fn close(&mut self, index: u32) -> BlockOutcome {
        let Some(block) = self.blocks.get_mut(index as usize).filter(|b| b.open) else {
            return BlockOutcome::Ignored;
        };
        block.open = false;
        self.pending.push_back(StreamEvent::ContentBlockStop { index });

        match &mut block.body {
            Body::Text(_) => BlockOutcome::Text,
            Body::Tool { id, name, json, input } => match decode_arguments(index, id, name, json) {
                Ok(value) => {
                    *input = Some(value.clone());
                    BlockOutcome::ToolUse(value)
                }
                Err(dropped) => {
                    tracing::warn!(
                        provider = %self.provider,
                        tool = %dropped.tool_name,
                        error = %dropped.reason,
                        "dropping tool call with malformed arguments"
                    );
                    self.dropped.push(dropped.clone());
                    BlockOutcome::Dropped(dropped)
                }
            },
        }
    }

    /// Record the vendor's stop signal; the last one observed wins
    pub const fn set_stop_reason(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }

    /// Merge reported token counts
    pub fn add_usage(&mut self, input_tokens: Option<u32>, output_tokens: Option<u32>) {
        if input_tokens.is_none() && output_tokens.is_none() {
            return;
        }

        let usage = self.usage.get_or_insert_with(Usage::default);
        if let Some(input) = input_tokens {
            usage.input_tokens = input;
        }
        if let Some(output) = output_tokens {
            usage.output_tokens = output;
        }
    }

    /// Whether any tool block has been opened
    pub fn has_tool_calls(&self) -> bool {
        self.blocks.iter().any(|b| matches!(b.body, Body::Tool { .. }))
    }

    /// Emit an in-band vendor error and return it as the call's failure
    pub fn fail(&mut self, error_type: impl Into<String>, message: impl Into<String>) -> LlmError {
        let error_type = error_type.into();
        let message = message.into();
        tracing::warn!(provider = %self.provider, error_type = %error_type, message = %message, "vendor stream error");

        self.pending.push_back(StreamEvent::Error {
            error_type: error_type.clone(),
            message: message.clone(),
        });

        LlmError::StreamVendor {
            provider: self.provider.clone(),
            error_type,
            message,
        }
    }

    /// Close every open block, emit the trailer, and build the response
    pub fn finish(&mut self) -> AiResponse {
        self.start(None);

        let still_open: Vec<u32> = (0..self.blocks.len())
            .filter(|i| self.blocks[*i].open)
            .filter_map(|i| u32::try_from(i).ok())
            .collect();
        for index in still_open {
            self.close(index);
        }

        let stop_reason = self.stop_reason.unwrap_or_default();
        self.pending.push_back(StreamEvent::MessageDelta {
            stop_reason,
            usage: self.usage,
        });
        self.pending.push_back(StreamEvent::MessageStop);

        let content = self
            .blocks
            .iter()
            .filter_map(|block| match &block.body {
                Body::Text(text) if !text.is_empty() => Some(MessageContent::text(text.clone())),
                Body::Text(_) => None,
                Body::Tool { id, name, input, .. } => input
                    .as_ref()
                    .map(|input| MessageContent::tool_use(id.clone(), name.clone(), input.clone())),
            })
            .collect();

        AiResponse {
            message: AssistantMessage::new(self.id.clone().unwrap_or_default(), content),
            stop_reason,
            usage: self.usage,
            dropped_tool_calls: self.dropped.clone(),
        }
    }

    /// Hand queued events to the caller, stopping at cancellation
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Cancelled` if the token has fired; queued
    /// events are discarded
    pub fn deliver(&mut self, cancel: &CancellationToken, on_event: EventSink<'_>) -> Result<(), LlmError> {
        while let Some(event) = self.pending.pop_front() {
            if cancel.is_cancelled() {
                self.pending.clear();
                return Err(LlmError::Cancelled);
            }
            on_event(event);
        }
        Ok(())
    }

    /// Drain queued events without delivering them
    pub fn take_events(&mut self) -> Vec<StreamEvent> {
        self.pending.drain(..).collect()
    }

    fn open(&mut self, body: Body, tool_id: Option<String>, tool_name: Option<String>) -> u32 {
        self.start(None);

        let kind = match body {
            Body::Text(_) => BlockKind::Text,
            Body::Tool { .. } => BlockKind::ToolUse,
        };
        self.blocks.push(Block { body, open: true });
        let index = self.last_index();

        self.pending.push_back(StreamEvent::ContentBlockStart {
            index,
            kind,
            tool_id,
            tool_name,
        });
        index
    }

    fn last_index(&self) -> u32 {
        u32::try_from(self.blocks.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }
}

/// Decode accumulated tool arguments
///
/// An empty accumulation means a call without arguments and decodes to
/// an empty object. Anything that is not a JSON object is rejected.
///
/// # Errors
///
/// Returns the dropped call when the text is not a JSON object
pub fn decode_arguments(index: u32, id: &str, name: &str, raw: &str) -> Result<serde_json::Value, DroppedToolCall> {
    let dropped = |reason: String| DroppedToolCall {
        index,
        tool_id: id.to_owned(),
        tool_name: name.to_owned(),
        raw: raw.to_owned(),
        reason,
    };

    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => Ok(value),
        Ok(other) => Err(dropped(format!("expected a JSON object, got {other}"))),
        Err(e) => Err(dropped(e.to_string())),
    }
}

/// Run a streamed response to completion
///
/// Each record is translated into normalizer calls; queued events are
/// delivered in order. Cancellation is observed while waiting for the
/// next record and before each delivered event. Malformed records are
/// skipped with a warning unless too many arrive in a row. A body that
/// ends without the vendor's terminal signal still finishes normally.
///
/// # Errors
///
/// Returns `Cancelled`, `Transport` on a body read failure, `Decode`
/// after too many consecutive malformed records, or whatever the
/// translator returns (typically `StreamVendor`)
pub async fn drive<T, D, F>(
    mut normalizer: StreamNormalizer,
    mut source: D,
    cancel: &CancellationToken,
    on_event: EventSink<'_>,
    mut translate: F,
) -> Result<AiResponse, LlmError>
where
    D: RecordSource<T>,
    F: FnMut(T, &mut StreamNormalizer) -> Result<Flow, LlmError> + Send,
{
    let provider = normalizer.provider.clone();
    let mut malformed_run = 0u32;

    loop {
        let record = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            record = source.next_record() => record,
        };

        match record.map_err(|e| LlmError::transport(&provider, e))? {
            None | Some(Record::Done) => break,
            Some(Record::Malformed { raw, reason }) => {
                malformed_run += 1;
                tracing::warn!(provider = %provider, error = %reason, raw = %raw, "skipping malformed stream record");
                if malformed_run > MAX_CONSECUTIVE_MALFORMED {
                    return Err(LlmError::decode(
                        &provider,
                        format!("{malformed_run} consecutive malformed stream records, last: {reason}"),
                    ));
                }
            }
            Some(Record::Value(value)) => {
                malformed_run = 0;
                let flow = translate(value, &mut normalizer);
                if flow.is_ok() {
                    normalizer.start(None);
                }
                normalizer.deliver(cancel, on_event)?;
                if flow? == Flow::Finish {
                    break;
                }
            }
        }
    }

    let response = normalizer.finish();
    normalizer.deliver(cancel, on_event)?;
    Ok(response)
}
