use thiserror::Error;

use crate::types::TransportError;

/// Byte-cursor failures. The reader knows nothing about column types, so every
/// variant is about bytes: missing, malformed framing, or the source going away.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("truncated frame at offset {offset}: needed {needed} bytes, had {available}")]
    Truncated {
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("varint at offset {offset} exceeds 64 bits")]
    VarintOverflow { offset: u64 },

    #[error("transport failure: {0}")]
    Transport(TransportError),

    #[error("cancelled while awaiting transport")]
    Cancelled,
}
