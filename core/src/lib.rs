//! chlite-core
//!
//! Streaming decoder for columnar Native query results.
//! Bytes → blocks → typed columns → rows, pulled on demand.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod value;

// Decode layers
pub mod framing;
pub mod schema;
pub mod block;
pub mod rows;
pub mod stream;
pub mod telemetry;

// Fetch API
pub mod query;
pub mod transport;
pub mod client;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::block::{Block, BlockDecoder, Column, ColumnData};
    pub use crate::client::{Client, ClientConfig, RecordStream, TupleStream};
    pub use crate::framing::FrameReader;
    pub use crate::query::{ExternalData, ExternalTable, PreparedQuery, Query};
    pub use crate::rows::{FromBlockRow, Record, RowTuple};
    pub use crate::schema::{parse_type, TypeCache, TypeDescriptor, TypeParseError};
    pub use crate::stream::{CancellationToken, FetchConfig, RowStream, StreamPhase};
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::transport::{ChunkStream, Transport};
    pub use crate::types::{FetchError, TransportError};
    pub use crate::value::{Decimal, Decimal256, Timestamp, Value};
    pub use uuid::Uuid;
}
