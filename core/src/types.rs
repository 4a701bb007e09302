use std::fmt;

use thiserror::Error;

use crate::{framing::FrameError, schema::TypeParseError};

/// Failure reported by the transport collaborator (connection reset, HTTP error, ...).
///
/// Carried as text so the error stays `Clone` and free of transport-specific types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::new(e.to_string())
    }
}

/// Unified fetch error covering transport, framing, type, protocol and usage faults.
/// - Ergonomic `From<T>` impls enable `?` across the pipeline.
/// - `Clone` so a terminal failure can be re-surfaced on every later pull.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The byte source ended mid-frame.
    #[error("stream truncated at offset {offset}: needed {needed} bytes, had {available}")]
    StreamTruncated { offset: u64, needed: usize, available: usize },

    /// Declared counts or offsets are inconsistent with the decoded content.
    #[error("protocol error at offset {offset}{}: {reason}", column_suffix(.column))]
    Protocol {
        offset: u64,
        column: Option<String>,
        reason: String,
    },

    /// Unrecognized or malformed type string.
    #[error(transparent)]
    TypeParse(#[from] TypeParseError),

    /// Record lookup by a name the block does not carry.
    #[error("column not found: {name}")]
    ColumnNotFound { name: String },

    /// Caller-initiated cancellation.
    #[error("stream cancelled")]
    Cancelled,

    /// Transport-level failure signal.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Generic high-level validation with a descriptive message.
    #[error("validation error: {0}")]
    Validation(String),
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(name) => format!(" (column `{name}`)"),
        None => String::new(),
    }
}

impl FetchError {
    pub fn protocol(offset: u64, reason: impl Into<String>) -> Self {
        FetchError::Protocol { offset, column: None, reason: reason.into() }
    }

    /// Attach the column being decoded, unless a nested decoder already did.
    pub fn in_column(self, name: &str) -> Self {
        match self {
            FetchError::Protocol { offset, column: None, reason } => FetchError::Protocol {
                offset,
                column: Some(name.to_string()),
                reason,
            },
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Fatal faults terminate the stream; usage faults and cancellation do not
    /// indicate anything wrong with the data itself.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FetchError::ColumnNotFound { .. } | FetchError::Cancelled)
    }
}

impl From<FrameError> for FetchError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Truncated { offset, needed, available } => {
                FetchError::StreamTruncated { offset, needed, available }
            }
            FrameError::VarintOverflow { offset } => {
                FetchError::protocol(offset, "varint exceeds 64 bits")
            }
            FrameError::Transport(t) => FetchError::Transport(t),
            FrameError::Cancelled => FetchError::Cancelled,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        FetchError::Transport(e)
    }
}
