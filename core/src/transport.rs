//! transport.rs
//!
//! Seam to the byte-moving collaborator (HTTP client, socket, file replay).
//!
//! The transport sends a prepared query and hands back the response body as
//! an ordered stream of chunks. Connection handling, authentication,
//! compression and retries all live behind this trait.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::query::PreparedQuery;
use crate::types::TransportError;

/// Response body: chunks in arrival order, ended by `None` or an error item.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        query: &'a PreparedQuery,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute<'a>(
        &'a self,
        query: &'a PreparedQuery,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>> {
        (**self).execute(query)
    }
}

/// Chunk stream over an in-memory body, e.g. a recorded response.
pub fn chunks_from<I>(chunks: I) -> ChunkStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}
