//! Server-sent-event line reader
//!
//! Turns the raw response body into a stream of decoded payloads. The body
//! is consumed in a single pass; dropping the returned stream drops the
//! underlying response and releases the connection.

use super::StreamPayload;
use crate::error::TurnError;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Decoded payloads; an `Err` item is a connection-level failure
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<StreamPayload, TurnError>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Wrap a response body as a payload stream
pub fn payload_stream(body: ByteStream) -> PayloadStream {
    let lines = FramedRead::new(
        StreamReader::new(body),
        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
    );

    Box::pin(lines.filter_map(|line| {
        futures::future::ready(match line {
            Ok(line) => decode_line(&line).map(Ok),
            Err(e) => Some(Err(line_error(e))),
        })
    }))
}

/// Decode a single body line. Returns `None` for lines that carry no payload:
/// blank lines, non-data lines, the termination sentinel and malformed JSON.
pub fn decode_line(line: &str) -> Option<StreamPayload> {
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str(data) {
        Ok(value) => StreamPayload::from_value(value),
        Err(e) => {
            tracing::warn!(error = %e, line = %data, "Skipping malformed stream payload");
            None
        }
    }
}

fn line_error(e: LinesCodecError) -> TurnError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            TurnError::transport("Stream line exceeded maximum length")
        }
        LinesCodecError::Io(e) => TurnError::transport(format!("Stream interrupted: {e}")),
    }
}
