//! framing/reader.rs
//!
//! Byte cursor over a chunked asynchronous source.
//!
//! Design notes:
//! - Only the unconsumed tail is buffered; arriving chunks are appended to it.
//! - Reads suspend only when the buffered tail is too short.
//! - A read that cannot be satisfied before the source ends is `Truncated`.
//! - No knowledge of column types lives here.

use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use futures::future::{self, Either};
use futures::{Stream, StreamExt};
use log::trace;

use crate::framing::types::FrameError;
use crate::framing::varint::decode_varint;
use crate::stream::cancel::CancellationToken;
use crate::types::TransportError;

pub struct FrameReader<S> {
    source: Option<S>,
    buffer: BytesMut,
    cancel: Option<CancellationToken>,
    /// Stream offset of `buffer[0]`.
    position: u64,
    chunks_received: u64,
    bytes_received: u64,
    /// Time spent suspended on the source.
    wait_time: Duration,
}

impl<S> FrameReader<S>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    pub fn new(source: S, capacity: usize) -> Self {
        Self {
            source: Some(source),
            buffer: BytesMut::with_capacity(capacity),
            cancel: None,
            position: 0,
            chunks_received: 0,
            bytes_received: 0,
            wait_time: Duration::ZERO,
        }
    }

    /// Race every transport await against `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunks_received(&self) -> u64 {
        self.chunks_received
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Drop the transport and any partially read bytes.
    pub fn release(&mut self) {
        self.source = None;
        self.buffer = BytesMut::new();
    }

    /// Pull one more non-empty chunk into the buffer.
    /// Returns `false` once the source is exhausted.
    async fn fill(&mut self) -> Result<bool, FrameError> {
        loop {
            let Some(source) = self.source.as_mut() else {
                return Ok(false);
            };

            let started = Instant::now();
            let next = match &self.cancel {
                Some(token) => {
                    if token.is_cancelled() {
                        return Err(FrameError::Cancelled);
                    }
                    match future::select(token.cancelled(), source.next()).await {
                        Either::Left(((), _)) => return Err(FrameError::Cancelled),
                        Either::Right((item, _)) => item,
                    }
                }
                None => source.next().await,
            };
            self.wait_time += started.elapsed();

            match next {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.chunks_received += 1;
                    self.bytes_received += chunk.len() as u64;
                    trace!(
                        "[FRAME] chunk #{} ({} bytes, {} buffered)",
                        self.chunks_received,
                        chunk.len(),
                        self.buffer.len()
                    );
                    self.buffer.extend_from_slice(&chunk);
                    return Ok(true);
                }
                Some(Err(e)) => return Err(FrameError::Transport(e)),
                None => {
                    self.source = None;
                    return Ok(false);
                }
            }
        }
    }

    async fn ensure(&mut self, n: usize) -> Result<(), FrameError> {
        while self.buffer.len() < n {
            if !self.fill().await? {
                return Err(FrameError::Truncated {
                    offset: self.position,
                    needed: n,
                    available: self.buffer.len(),
                });
            }
        }
        Ok(())
    }

    /// Return exactly `n` bytes, awaiting more chunks as needed.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, FrameError> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        self.ensure(n).await?;
        self.position += n as u64;
        Ok(self.buffer.split_to(n).freeze())
    }

    pub async fn read_u8(&mut self) -> Result<u8, FrameError> {
        self.ensure(1).await?;
        self.position += 1;
        Ok(self.buffer.get_u8())
    }

    /// Decode the varint at the cursor without consuming it.
    ///
    /// `Ok(None)` means the source ended cleanly with nothing buffered, which
    /// is the normal end-of-stream boundary.
    pub async fn peek_varint(&mut self) -> Result<Option<u64>, FrameError> {
        loop {
            if let Some((value, _)) = decode_varint(&self.buffer, self.position)? {
                return Ok(Some(value));
            }
            if !self.fill().await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated {
                    offset: self.position,
                    needed: self.buffer.len() + 1,
                    available: self.buffer.len(),
                });
            }
        }
    }

    pub async fn read_varint(&mut self) -> Result<u64, FrameError> {
        loop {
            if let Some((value, len)) = decode_varint(&self.buffer, self.position)? {
                self.buffer.advance(len);
                self.position += len as u64;
                return Ok(value);
            }
            if !self.fill().await? {
                return Err(FrameError::Truncated {
                    offset: self.position,
                    needed: self.buffer.len() + 1,
                    available: self.buffer.len(),
                });
            }
        }
    }
}
