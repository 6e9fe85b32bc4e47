use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use super::{ReadError, Record, RecordSource, parse_payload};

/// Longest line accepted before it is reported as malformed
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Bytes of an oversized line kept in the malformed record
const RAW_PREVIEW_BYTES: usize = 256;

/// Newline-delimited JSON decoder
///
/// Splits on `\n`, tolerates `\r\n`, skips blank lines, and flushes a
/// final unterminated line when the body ends. A line longer than
/// 1 MiB yields one `Malformed` record and the rest of it is skipped.
pub struct NdjsonDecoder<S, T> {
    body: Pin<Box<S>>,
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    /// Inside an oversized line that was already reported
    skipping: bool,
    exhausted: bool,
    _record: PhantomData<fn() -> T>,
}

impl<S, B, E, T> NdjsonDecoder<S, T>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: fmt::Display,
    T: DeserializeOwned,
{
    /// Attach to a response body
    pub fn new(body: S) -> Self {
        Self {
            body: Box::pin(body),
            buffer: BytesMut::new(),
            scanned: 0,
            skipping: false,
            exhausted: false,
            _record: PhantomData,
        }
    }

    /// Next record, or `None` at end of body
    pub async fn next(&mut self) -> Result<Option<Record<T>>, ReadError> {
        loop {
            if let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
                let line = self.buffer.split_to(self.scanned + offset);
                self.buffer.advance(1);
                self.scanned = 0;

                if std::mem::take(&mut self.skipping) {
                    continue;
                }
                if line.len() > MAX_LINE_BYTES {
                    return Ok(Some(Self::oversized(&line)));
                }
                if let Some(record) = Self::decode_line(&line) {
                    return Ok(Some(record));
                }
                continue;
            }
            self.scanned = self.buffer.len();

            if self.buffer.len() > MAX_LINE_BYTES {
                let head = self.buffer.split();
                self.scanned = 0;
                if !self.skipping {
                    self.skipping = true;
                    return Ok(Some(Self::oversized(&head)));
                }
            }

            if self.exhausted {
                if self.buffer.is_empty() || std::mem::take(&mut self.skipping) {
                    self.buffer.clear();
                    return Ok(None);
                }
                let rest = self.buffer.split();
                self.scanned = 0;
                return Ok(Self::decode_line(&rest));
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Err(ReadError(e.to_string())),
                None => self.exhausted = true,
            }
        }
    }

    fn oversized(line: &[u8]) -> Record<T> {
        Record::Malformed {
            raw: String::from_utf8_lossy(&line[..line.len().min(RAW_PREVIEW_BYTES)]).into_owned(),
            reason: format!("line exceeds {MAX_LINE_BYTES} bytes"),
        }
    }

    fn decode_line(line: &[u8]) -> Option<Record<T>> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(e) => {
                return Some(Record::Malformed {
                    raw: String::from_utf8_lossy(line).into_owned(),
                    reason: e.to_string(),
                });
            }
        };

        if text.is_empty() {
            None
        } else {
            Some(parse_payload(text))
        }
    }
}

#[async_trait]
impl<S, B, E, T> RecordSource<T> for NdjsonDecoder<S, T>
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
