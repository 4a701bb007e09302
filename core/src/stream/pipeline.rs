//! stream/pipeline.rs
//!
//! Pull-based row stream: frame reader → block decoder → row views.
//!
//! Design notes:
//! - The caller drives everything through `next_row`; a new block is decoded
//!   only once the current one has handed out all its rows.
//! - Suspension happens only inside frame reader reads.
//! - Cancellation is checked before every row and raced against every
//!   transport await; it releases the transport and discards buffered bytes.
//! - Terminal outcomes are sticky: every later pull replays them.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};

use crate::block::{Block, BlockDecoder, DecodeLimits};
use crate::framing::FrameReader;
use crate::rows::FromBlockRow;
use crate::stream::cancel::CancellationToken;
use crate::stream::core::FetchConfig;
use crate::stream::state::{StreamPhase, StreamState};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::{FetchError, TransportError};

pub struct RowStream<S, R> {
    reader: FrameReader<S>,
    decoder: BlockDecoder,
    state: StreamState,
    current: Option<Arc<Block>>,
    cancel: CancellationToken,
    counters: TelemetryCounters,
    timer: TelemetryTimer,
    collect_metrics: bool,
    _row: PhantomData<fn() -> R>,
}

impl<S, R> RowStream<S, R>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin + Send,
    R: FromBlockRow,
{
    pub fn new(source: S, config: &FetchConfig) -> Self {
        Self::with_cancellation(source, config, CancellationToken::new())
    }

    /// Build a stream that also stops when `token` is cancelled.
    pub fn with_cancellation(source: S, config: &FetchConfig, token: CancellationToken) -> Self {
        let reader = FrameReader::new(source, config.buffer_capacity()).with_cancellation(token.clone());
        Self {
            reader,
            decoder: BlockDecoder::new(DecodeLimits::from(config)),
            state: StreamState::new(),
            current: None,
            cancel: token,
            counters: TelemetryCounters::default(),
            timer: TelemetryTimer::new(),
            collect_metrics: config.metrics_enabled(),
            _row: PhantomData,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.state.phase()
    }

    pub fn blocks_consumed(&self) -> u64 {
        self.state.blocks_consumed()
    }

    /// Handle that cancels this stream from anywhere, including other tasks.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel now. A no-op on a stream that already terminated.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.enter_cancelled();
    }

    /// Next row, `Ok(None)` once the stream is exhausted.
    pub async fn next_row(&mut self) -> Result<Option<R>, FetchError> {
        loop {
            if let Some(outcome) = self.state.terminal_outcome() {
                return outcome.map(|()| None);
            }
            if self.cancel.is_cancelled() {
                self.enter_cancelled();
                continue;
            }

            let cursor = self.state.cursor();
            if let Some(block) = self.current.as_ref().filter(|b| cursor < b.row_count()) {
                let started = Instant::now();
                let row = R::from_block_row(block, self.state.advance());
                if self.collect_metrics {
                    self.timer.add_stage_time(Stage::Materialize, started.elapsed());
                }
                self.counters.add_row();
                return Ok(Some(row));
            }

            self.current = None;
            self.pull_block().await;
        }
    }

    /// Drain the stream into memory, in row order.
    pub async fn collect_all(mut self) -> Result<Vec<R>, FetchError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Adapt to `futures::Stream`; a terminal error is yielded once, then the stream ends.
    pub fn into_stream(self) -> BoxStream<'static, Result<R, FetchError>>
    where
        S: 'static,
        R: Send + 'static,
    {
        stream::unfold(Some(self), |pending| async move {
            let mut rows = pending?;
            match rows.next_row().await {
                Ok(Some(row)) => Some((Ok(row), Some(rows))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        let mut counters = self.counters.clone();
        counters.set_transport(self.reader.chunks_received(), self.reader.bytes_received());
        let cache = self.decoder.type_cache();
        counters.set_type_cache(cache.hits(), cache.misses());

        let mut timer = self.timer.clone();
        if self.collect_metrics {
            timer.stage_times.set(Stage::Read, self.reader.wait_time());
            timer.stage_times.set(Stage::Parse, self.decoder.parse_time());
        }
        TelemetrySnapshot::from(&counters, &timer)
    }

    // ---- Helpers ----

    /// Decode the next block and move the state machine accordingly.
    async fn pull_block(&mut self) {
        self.state.activate();

        let started = Instant::now();
        let waited = self.reader.wait_time();
        let parsed = self.decoder.parse_time();
        let result = self.decoder.decode_block(&mut self.reader).await;
        if self.collect_metrics {
            let busy = started
                .elapsed()
                .saturating_sub(self.reader.wait_time() - waited)
                .saturating_sub(self.decoder.parse_time() - parsed);
            self.timer.add_stage_time(Stage::Decode, busy);
        }

        match result {
            Ok(Some(block)) => {
                self.counters.add_block(block.column_count(), block.row_count());
                self.state.begin_block();
                // Header-only blocks carry no rows.
                if !block.is_empty() {
                    self.current = Some(Arc::new(block));
                }
            }
            Ok(None) => {
                debug!(
                    "[PIPELINE] exhausted: {} blocks, {} rows",
                    self.state.blocks_consumed(),
                    self.counters.rows_yielded
                );
                self.state.exhaust();
                self.release();
            }
            Err(FetchError::Cancelled) => self.enter_cancelled(),
            Err(e) => {
                warn!("[PIPELINE] stream failed at offset {}: {e}", self.reader.position());
                self.state.fail(e);
                self.release();
            }
        }
    }

    fn enter_cancelled(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!(
            "[PIPELINE] cancelled after {} rows ({} buffered bytes dropped)",
            self.counters.rows_yielded,
            self.reader.buffered_len()
        );
        self.state.cancel();
        self.release();
    }

    fn release(&mut self) {
        self.reader.release();
        self.current = None;
        self.timer.finish();
    }
}
