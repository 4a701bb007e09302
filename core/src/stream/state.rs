//! stream/state.rs
//!
//! Lifecycle of one result stream.
//!
//! `Idle → Active → {Exhausted | Errored | Cancelled}`. Terminal phases are
//! absorbing: once entered, later transitions are ignored and the stored
//! outcome is replayed.

use std::fmt;

use crate::types::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    /// No block requested yet.
    Idle,
    /// Blocks are being decoded and rows handed out.
    Active,
    /// The source ended cleanly at a block boundary.
    Exhausted,
    /// A fatal fault was surfaced; it is replayed on every pull.
    Errored,
    /// The caller cancelled the stream.
    Cancelled,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Exhausted | StreamPhase::Errored | StreamPhase::Cancelled)
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamPhase::Idle => "idle",
            StreamPhase::Active => "active",
            StreamPhase::Exhausted => "exhausted",
            StreamPhase::Errored => "errored",
            StreamPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct StreamState {
    phase: StreamPhase,
    blocks_consumed: u64,
    /// Next row index within the current block.
    cursor: usize,
    error: Option<FetchError>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Idle,
            blocks_consumed: 0,
            cursor: 0,
            error: None,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn blocks_consumed(&self) -> u64 {
        self.blocks_consumed
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Claim the next row index of the current block.
    pub fn advance(&mut self) -> usize {
        let row = self.cursor;
        self.cursor += 1;
        row
    }

    pub fn activate(&mut self) {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Active;
        }
    }

    /// A new block became current.
    pub fn begin_block(&mut self) {
        if !self.is_terminal() {
            self.blocks_consumed += 1;
            self.cursor = 0;
        }
    }

    pub fn exhaust(&mut self) {
        if !self.is_terminal() {
            self.phase = StreamPhase::Exhausted;
        }
    }

    pub fn fail(&mut self, error: FetchError) {
        if !self.is_terminal() {
            self.phase = StreamPhase::Errored;
            self.error = Some(error);
        }
    }

    pub fn cancel(&mut self) {
        if !self.is_terminal() {
            self.phase = StreamPhase::Cancelled;
        }
    }

    /// Outcome replayed by a terminal stream; `None` while still running.
    pub fn terminal_outcome(&self) -> Option<Result<(), FetchError>> {
        match self.phase {
            StreamPhase::Idle | StreamPhase::Active => None,
            StreamPhase::Exhausted => Some(Ok(())),
            StreamPhase::Cancelled => Some(Err(FetchError::Cancelled)),
            StreamPhase::Errored => Some(Err(self
                .error
                .clone()
                .unwrap_or_else(|| FetchError::Validation("stream errored".into())))),
        }
    }
}
