//! telemetry/snapshot.rs
//!
//! Immutable telemetry snapshot of one result stream.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;
use crate::telemetry::timers::{Stage, StageTimes, TelemetryTimer};

/// Counters, throughput and stage timings at the moment of capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub chunks_received: u64,
    pub bytes_received: u64,
    pub blocks_decoded: u64,
    pub columns_decoded: u64,
    pub rows_decoded: u64,
    pub rows_yielded: u64,
    pub type_cache_hits: u64,
    pub type_cache_misses: u64,
    pub rows_per_sec: f64,
    pub bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();
        let secs = elapsed.as_secs_f64();
        let per_sec = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };

        Self {
            chunks_received: counters.chunks_received,
            bytes_received: counters.bytes_received,
            blocks_decoded: counters.blocks_decoded,
            columns_decoded: counters.columns_decoded,
            rows_decoded: counters.rows_decoded,
            rows_yielded: counters.rows_yielded,
            type_cache_hits: counters.type_cache_hits,
            type_cache_misses: counters.type_cache_misses,
            rows_per_sec: per_sec(counters.rows_yielded),
            bytes_per_sec: per_sec(counters.bytes_received),
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    pub fn has_all_stages(&self, expected: &[Stage]) -> bool {
        self.stage_times.has_all(expected)
    }

    /// Internal consistency:
    /// - no more rows yielded than decoded
    /// - a type string is parsed at most once per distinct string, so
    ///   misses never exceed the number of decoded columns
    pub fn sanity_check(&self) -> bool {
        self.rows_yielded <= self.rows_decoded && self.type_cache_misses <= self.columns_decoded
    }
}
