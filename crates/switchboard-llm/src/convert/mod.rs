//! Conversion between internal types and vendor wire formats
//!
//! Each vendor module provides request encoding, blocking response
//! decoding, finish-signal mapping, and a stream state that feeds the
//! shared [`StreamNormalizer`](crate::stream::StreamNormalizer).

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

/// Sequential `tool-N` ids for vendors that do not identify calls
#[derive(Debug, Default)]
pub struct SyntheticIds {
    issued: u32,
}

impl SyntheticIds {
    /// Next id, starting at `tool-1`
    pub fn next_id(&mut self) -> String {
        self.issued += 1;
        format!("tool-{}", self.issued)
    }
}

/// Tool arguments as an object, treating a missing value as `{}`
fn object_or_empty(value: serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        value
    }
}

/// Fresh message id for vendors that do not send one
fn synthetic_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}
