//! Record-oriented decoding of the reply wire format.
//!
//! The backend pushes newline-separated text records over a single response
//! body. Each payload record carries a fixed `data: ` prefix followed by
//! either a JSON fragment with a `content` field or the literal `[DONE]`
//! terminator. Network chunks can split a record anywhere, including inside
//! a multi-byte UTF-8 sequence, so incomplete bytes carry over between
//! calls.

use log::debug;
use serde::Deserialize;

/// Fixed prefix carried by every payload record.
pub const DATA_PREFIX: &str = "data: ";

/// Literal token that ends a reply stream.
pub const DONE_TOKEN: &str = "[DONE]";

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental content fragment; the caller accumulates the running
    /// full text.
    Delta(String),
    /// Explicit end-of-stream marker.
    Done,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for one reply stream.
///
/// Holds no state across streams except the carry-over buffer for the
/// record currently split across chunks. One garbled record never aborts
/// the stream; it is dropped and decoding continues with the next record.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning every frame it completed.
    ///
    /// The final (possibly incomplete) record stays buffered for the next
    /// call. Input after `[DONE]` is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let record: Vec<u8> = self.buffer.drain(..=pos).collect();
            match decode_record(&record[..record.len() - 1]) {
                Some(StreamFrame::Done) => {
                    self.done = true;
                    frames.push(StreamFrame::Done);
                    return frames;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        frames
    }

    /// True once the explicit end marker has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

fn decode_record(record: &[u8]) -> Option<StreamFrame> {
    let Ok(line) = std::str::from_utf8(record) else {
        debug!("Dropping stream record with invalid UTF-8");
        return None;
    };
    let line = line.strip_suffix('\r').unwrap_or(line);
    // Records without the payload prefix (keepalives, event names) carry no
    // content for us.
    let payload = line.strip_prefix(DATA_PREFIX)?;

    if payload == DONE_TOKEN {
        return Some(StreamFrame::Done);
    }

    match serde_json::from_str::<DeltaPayload>(payload) {
        Ok(DeltaPayload {
            content: Some(text),
        }) if !text.is_empty() => Some(StreamFrame::Delta(text)),
        Ok(_) => None,
        Err(err) => {
            debug!("Dropping malformed stream record: {}, data: {}", err, payload);
            None
        }
    }
}
