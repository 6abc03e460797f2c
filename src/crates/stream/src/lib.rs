//! Parlor Stream Decoding
//!
//! Turns the raw incremental byte stream of a reply into discrete content
//! deltas. Owns nothing but a carry-over buffer; resilient to records that
//! arrive split across network chunks or garbled.

pub mod decoder;

pub use decoder::{SseDecoder, StreamFrame, DATA_PREFIX, DONE_TOKEN};
