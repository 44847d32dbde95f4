//! Long-poll chunk decoder.
//!
//! The bind endpoint streams chunks of the form `<len>\n<json>`, where the
//! JSON is an array of `[aid, [eventName, payload?]]` entries. Chunk
//! boundaries do not line up with network reads, so the decoder buffers
//! until a complete JSON value is available rather than trusting `<len>`.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::error::{LoungeError, Result};
use crate::event::RawEvent;

/// Longest accepted length prefix, in bytes.
const MAX_LENGTH_LINE: usize = 16;

/// Decoder for lounge long-poll chunks.
#[derive(Debug, Default)]
pub struct LoungeCodec {
    last_aid: Option<u64>,
}

impl LoungeCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest array id seen so far, sent back as `AID` on the next poll.
    pub fn last_aid(&self) -> Option<u64> {
        self.last_aid
    }

    fn events_from_chunk(&mut self, chunk: Value) -> Result<Vec<RawEvent>> {
        let Value::Array(entries) = chunk else {
            return Err(LoungeError::protocol("chunk is not a JSON array"));
        };

        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            let (aid, event) = match entry.as_array().map(Vec::as_slice) {
                Some([aid, event, ..]) => (aid, event),
                _ => {
                    trace!(entry = %entry, "Skipping malformed lounge entry");
                    continue;
                }
            };

            if let Some(aid) = aid.as_u64() {
                self.last_aid = Some(self.last_aid.map_or(aid, |last| last.max(aid)));
            }

            let Some(parts) = event.as_array() else {
                continue;
            };
            let Some(name) = parts.first().and_then(Value::as_str) else {
                continue;
            };
            let payload = parts.get(1).cloned().unwrap_or(Value::Null);
            events.push(RawEvent::new(name, payload));
        }

        Ok(events)
    }
}

impl Decoder for LoungeCodec {
    type Item = Vec<RawEvent>;
    type Error = LoungeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(start) = src.iter().position(|b| !b.is_ascii_whitespace()) else {
            src.clear();
            return Ok(None);
        };
        src.advance(start);

        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_LENGTH_LINE {
                return Err(LoungeError::protocol("missing chunk length line"));
            }
            return Ok(None);
        };
        if newline > MAX_LENGTH_LINE {
            return Err(LoungeError::protocol("chunk length line too long"));
        }

        let length_line = std::str::from_utf8(&src[..newline])
            .map_err(|_| LoungeError::protocol("chunk length is not UTF-8"))?
            .trim();
        if length_line.parse::<usize>().is_err() {
            return Err(LoungeError::protocol(format!(
                "invalid chunk length: {length_line}"
            )));
        }

        let mut values =
            serde_json::Deserializer::from_slice(&src[newline + 1..]).into_iter::<Value>();
        let chunk = match values.next() {
            None => return Ok(None),
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => return Err(e.into()),
        };
        let consumed = newline + 1 + values.byte_offset();
        src.advance(consumed);

        self.events_from_chunk(chunk).map(Some)
    }
}
