use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::{EventStream, Eventsource};
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use super::{ReadError, Record, RecordSource, parse_payload};

/// Sentinel some vendors send as the final data payload
const DONE_SENTINEL: &str = "[DONE]";

/// Server-sent-events decoder
///
/// Event framing is handled by `eventsource-stream`; only the `data`
/// payload is parsed. Empty payloads are skipped.
pub struct SseDecoder<S, T> {
    events: Pin<Box<EventStream<S>>>,
    _record: PhantomData<fn() -> T>,
}

impl<S, B, E, T> SseDecoder<S, T>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: fmt::Display,
    T: DeserializeOwned,
{
    /// Attach to a response body
    pub fn new(body: S) -> Self {
        Self {
            events: Box::pin(body.eventsource()),
            _record: PhantomData,
        }
    }

    /// Next record, or `None` at end of body
    pub async fn next(&mut self) -> Result<Option<Record<T>>, ReadError> {
        while let Some(event) = self.events.next().await {
            let event = event.map_err(|e| ReadError(e.to_string()))?;
            let data = event.data.trim();

            if data.is_empty() {
                continue;
            }

            if data == DONE_SENTINEL {
                return Ok(Some(Record::Done));
            }

            return Ok(Some(parse_payload(data)));
        }

        Ok(None)
    }
}

#[async_trait]
impl<S, B, E, T> RecordSource<T> for SseDecoder<S, T>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
    T: DeserializeOwned + Send,
{
    async fn next_record(&mut self) -> Result<Option<Record<T>>, ReadError> {
        self.next().await
    }
}
