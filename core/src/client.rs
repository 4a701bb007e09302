//! client.rs
//!
//! Public fetch API.
//!
//! Design notes:
//! - `fetch_rows` / `fetch` issue the query and return a lazy `RowStream`;
//!   nothing beyond the first transport response is awaited up front.
//! - A consumed stream is not rewindable; fetch again to rerun a query.
//! - The client holds no per-query state, so concurrent fetches are independent.

use log::debug;

use crate::query::Query;
use crate::rows::{Record, RowTuple};
use crate::stream::core::FetchConfig;
use crate::stream::pipeline::RowStream;
use crate::transport::{ChunkStream, Transport};
use crate::types::FetchError;
use crate::value::Value;

/// Row stream over a transport response.
pub type TupleStream = RowStream<ChunkStream, RowTuple>;
pub type RecordStream = RowStream<ChunkStream, Record>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Database queries run against unless the SQL names one.
    pub database: String,
    /// Server settings sent with every query; per-query settings win.
    pub settings: Vec<(String, String)>,
    pub fetch: FetchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: "default".to_string(),
            settings: Vec::new(),
            fetch: FetchConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.database.trim().is_empty() {
            return Err(FetchError::Validation("database name must not be empty".into()));
        }
        self.fetch.validate()
    }
}

pub struct Client<T> {
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    pub fn with_defaults(transport: T) -> Self {
        Self { transport, config: ClientConfig::default() }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn open(&self, query: Query) -> Result<ChunkStream, FetchError> {
        let prepared = query.prepare(&self.config.database, &self.config.settings)?;
        debug!(
            "[CLIENT] executing on `{}` with {} params, {} external tables",
            self.config.database,
            prepared.url_params.len(),
            prepared.external_data.len()
        );
        Ok(self.transport.execute(&prepared).await?)
    }

    /// Positional rows, decoded lazily.
    pub async fn fetch_rows(&self, query: impl Into<Query>) -> Result<TupleStream, FetchError> {
        let body = self.open(query.into()).await?;
        Ok(RowStream::new(body, &self.config.fetch))
    }

    /// Name-addressable rows, decoded lazily.
    pub async fn fetch(&self, query: impl Into<Query>) -> Result<RecordStream, FetchError> {
        let body = self.open(query.into()).await?;
        Ok(RowStream::new(body, &self.config.fetch))
    }

    /// Every record, in order.
    pub async fn fetch_all(&self, query: impl Into<Query>) -> Result<Vec<Record>, FetchError> {
        self.fetch(query).await?.collect_all().await
    }

    /// First record; the rest of the response is abandoned.
    pub async fn fetch_one(&self, query: impl Into<Query>) -> Result<Option<Record>, FetchError> {
        let mut rows = self.fetch(query).await?;
        let first = rows.next_row().await?;
        rows.cancel();
        Ok(first)
    }

    /// First column of the first record.
    pub async fn fetch_val(&self, query: impl Into<Query>) -> Result<Option<Value>, FetchError> {
        Ok(self.fetch_one(query).await?.and_then(|record| record.get_index(0)))
    }
}
