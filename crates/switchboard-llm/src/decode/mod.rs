//! Incremental decoders for streamed response bodies
//!
//! One decoder instance is attached to one HTTP response body. Both are
//! pull-based: every call to [`RecordSource::next_record`] yields at most
//! one record, buffering partial input across reads.

mod ndjson;
mod sse;

use async_trait::async_trait;
use thiserror::Error;

pub use ndjson::NdjsonDecoder;
pub use sse::SseDecoder;

/// One decoded unit of a streamed body
#[derive(Debug, Clone, PartialEq)]
pub enum Record<T> {
    /// A parsed payload
    Value(T),
    /// A payload that failed to parse; the stream remains usable
    Malformed {
        /// Raw payload text
        raw: String,
        /// Parser error
        reason: String,
    },
    /// Explicit end-of-stream sentinel (`[DONE]`)
    Done,
}

/// The underlying body stream failed
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ReadError(pub String);

/// Pull-based source of decoded records
#[async_trait]
pub trait RecordSource<T>: Send {
    /// Next record, or `None` once the body is exhausted
    async fn next_record(&mut self) -> Result<Option<Record<T>>, ReadError>;
}

/// Parse one JSON payload into a record
fn parse_payload<T: serde::de::DeserializeOwned>(payload: &str) -> Record<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Record::Value(value),
        Err(e) => Record::Malformed {
            raw: payload.to_owned(),
            reason: e.to_string(),
        },
    }
}
