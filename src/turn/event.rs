//! Events that drive a turn

use crate::error::TurnError;
use crate::llm::StreamPayload;

/// Something the stream produced
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// One decoded payload
    Payload(StreamPayload),
    /// The stream finished normally
    StreamEnded,
    /// The stream broke at the connection level
    StreamFailed(TurnError),
}
