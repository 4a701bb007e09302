//! telemetry/counters.rs
//! Mutable counters collected while a result stream is decoded.
//!
//! Converted into an immutable `TelemetrySnapshot` on demand.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Deterministic counters for one result stream.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub chunks_received: u64,
    pub bytes_received: u64,
    pub blocks_decoded: u64,
    pub columns_decoded: u64,
    pub rows_decoded: u64,
    pub rows_yielded: u64,
    pub type_cache_hits: u64,
    pub type_cache_misses: u64,
}

impl TelemetryCounters {
    /// Record one decoded block.
    pub fn add_block(&mut self, columns: usize, rows: usize) {
        self.blocks_decoded += 1;
        self.columns_decoded += columns as u64;
        self.rows_decoded += rows as u64;
    }

    pub fn add_row(&mut self) {
        self.rows_yielded += 1;
    }

    /// Overwrite transport totals with the frame reader's running figures.
    pub fn set_transport(&mut self, chunks: u64, bytes: u64) {
        self.chunks_received = chunks;
        self.bytes_received = bytes;
    }

    pub fn set_type_cache(&mut self, hits: u64, misses: u64) {
        self.type_cache_hits = hits;
        self.type_cache_misses = misses;
    }

    /// Average decoded block size in rows.
    pub fn rows_per_block(&self) -> f64 {
        if self.blocks_decoded == 0 {
            0.0
        } else {
            self.rows_decoded as f64 / self.blocks_decoded as f64
        }
    }

    pub fn merge(&mut self, other: &TelemetryCounters) {
        *self += other.clone();
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks_received   += rhs.chunks_received;
        self.bytes_received    += rhs.bytes_received;
        self.blocks_decoded    += rhs.blocks_decoded;
        self.columns_decoded   += rhs.columns_decoded;
        self.rows_decoded      += rhs.rows_decoded;
        self.rows_yielded      += rhs.rows_yielded;
        self.type_cache_hits   += rhs.type_cache_hits;
        self.type_cache_misses += rhs.type_cache_misses;
    }
}
