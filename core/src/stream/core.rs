//! stream/core.rs
//!
//! Per-stream configuration.
//!
//! Design notes:
//! - Optional fields, resolved against `constants` defaults.
//! - Decode limits turn absurd declared sizes into protocol errors before
//!   anything is allocated for them.

use crate::constants::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOCK_COLUMNS, DEFAULT_MAX_BLOCK_ROWS,
    DEFAULT_MAX_STRING_LEN, MAX_BUFFER_CAPACITY, MIN_BUFFER_CAPACITY,
};
use crate::types::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Initial capacity of the frame reader's tail buffer.
    pub initial_buffer_capacity: Option<usize>,

    /// Longest accepted string payload (names, type strings, cells).
    pub max_string_len: Option<usize>,

    /// Largest accepted declared row count per block.
    pub max_block_rows: Option<usize>,

    /// Largest accepted declared column count per block.
    pub max_block_columns: Option<usize>,

    /// Whether to record per-stage timings.
    /// - `None` or `Some(false)` → counters only.
    /// - `Some(true)` → counters plus stage times.
    pub collect_metrics: Option<bool>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: Some(DEFAULT_BUFFER_CAPACITY),
            max_string_len: Some(DEFAULT_MAX_STRING_LEN),
            max_block_rows: Some(DEFAULT_MAX_BLOCK_ROWS),
            max_block_columns: Some(DEFAULT_MAX_BLOCK_COLUMNS),
            collect_metrics: Some(false),
        }
    }
}

impl FetchConfig {
    pub fn new(
        initial_buffer_capacity: Option<usize>,
        max_string_len: Option<usize>,
        max_block_rows: Option<usize>,
        max_block_columns: Option<usize>,
        collect_metrics: Option<bool>,
    ) -> Self {
        Self {
            initial_buffer_capacity: initial_buffer_capacity.or(Some(DEFAULT_BUFFER_CAPACITY)),
            max_string_len: max_string_len.or(Some(DEFAULT_MAX_STRING_LEN)),
            max_block_rows: max_block_rows.or(Some(DEFAULT_MAX_BLOCK_ROWS)),
            max_block_columns: max_block_columns.or(Some(DEFAULT_MAX_BLOCK_COLUMNS)),
            collect_metrics: collect_metrics.or(Some(false)),
        }
    }

    pub fn with_metrics() -> Self {
        Self { collect_metrics: Some(true), ..Self::default() }
    }

    pub fn buffer_capacity(&self) -> usize {
        self.initial_buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn string_limit(&self) -> usize {
        self.max_string_len.unwrap_or(DEFAULT_MAX_STRING_LEN)
    }

    pub fn row_limit(&self) -> usize {
        self.max_block_rows.unwrap_or(DEFAULT_MAX_BLOCK_ROWS)
    }

    pub fn column_limit(&self) -> usize {
        self.max_block_columns.unwrap_or(DEFAULT_MAX_BLOCK_COLUMNS)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.collect_metrics.unwrap_or(false)
    }

    /// Reject settings outside the supported ranges.
    pub fn validate(&self) -> Result<(), FetchError> {
        let capacity = self.buffer_capacity();
        if !(MIN_BUFFER_CAPACITY..=MAX_BUFFER_CAPACITY).contains(&capacity) {
            return Err(FetchError::Validation(format!(
                "initial_buffer_capacity {capacity} outside {MIN_BUFFER_CAPACITY}..={MAX_BUFFER_CAPACITY}"
            )));
        }
        if self.string_limit() == 0 {
            return Err(FetchError::Validation("max_string_len must be positive".into()));
        }
        if self.row_limit() == 0 {
            return Err(FetchError::Validation("max_block_rows must be positive".into()));
        }
        if self.column_limit() == 0 {
            return Err(FetchError::Validation("max_block_columns must be positive".into()));
        }
        Ok(())
    }
}
