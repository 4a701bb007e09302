//! block/decode.rs
//!
//! Native block decoder.
//!
//! Design notes:
//! - Wire layout: `column_count, row_count, { name, type, data }*`.
//! - A block with zero rows carries no column data at all.
//! - Column data is read in two passes: the serialization-state prefixes of
//!   every LowCardinality node in the type tree, then the data streams.
//! - Columns are decoded into locals and the block is assembled only after
//!   the last one succeeds; a failure discards everything read for it.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use log::{debug, warn};
use uuid::Uuid;

use crate::block::lowcard::{decode_low_cardinality, read_state_prefixes};
use crate::block::types::{Block, Column, ColumnData};
use crate::framing::FrameReader;
use crate::schema::{decimal_width, EnumVariants, TypeCache, TypeDescriptor};
use crate::stream::core::FetchConfig;
use crate::types::{FetchError, TransportError};
use crate::utils::date_from_epoch_days;

/// Upper bound on speculative `Vec` preallocation from declared counts.
const PREALLOC_LIMIT: usize = 1 << 16;

/// Size limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_string_len: usize,
    pub max_block_rows: usize,
    pub max_block_columns: usize,
}

impl From<&FetchConfig> for DecodeLimits {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_string_len: config.string_limit(),
            max_block_rows: config.row_limit(),
            max_block_columns: config.column_limit(),
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

/// Decodes consecutive blocks of one result stream.
///
/// Owns the stream's type cache, so descriptors are parsed once per distinct
/// type string for the lifetime of the stream.
#[derive(Debug, Default)]
pub struct BlockDecoder {
    cache: TypeCache,
    limits: DecodeLimits,
    blocks_decoded: u64,
    parse_time: Duration,
}

impl BlockDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits, ..Self::default() }
    }

    pub fn type_cache(&self) -> &TypeCache {
        &self.cache
    }

    pub fn blocks_decoded(&self) -> u64 {
        self.blocks_decoded
    }

    /// Time spent parsing type strings not yet in the cache.
    pub fn parse_time(&self) -> Duration {
        self.parse_time
    }

    /// Decode the next block, or `None` at a clean end of stream.
    pub async fn decode_block<S>(
        &mut self,
        reader: &mut FrameReader<S>,
    ) -> Result<Option<Block>, FetchError>
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Unpin + Send,
    {
        if reader.peek_varint().await?.is_none() {
            debug!("[BLOCK] end of stream after {} blocks", self.blocks_decoded);
            return Ok(None);
        }

        let start = reader.position();
        let column_count = read_count(reader, self.limits.max_block_columns, "column count").await?;
        let row_count = read_count(reader, self.limits.max_block_rows, "row count").await?;

        let mut columns = Vec::with_capacity(column_count.min(PREALLOC_LIMIT));
        for _ in 0..column_count {
            let name = read_utf8(reader, self.limits.max_string_len).await?;
            let column = self
                .decode_column(reader, name.clone(), row_count)
                .await
                .map_err(|e| e.in_column(&name));
            match column {
                Ok(column) => columns.push(column),
                Err(e) => {
                    warn!("[BLOCK] block #{} failed: {e}", self.blocks_decoded);
                    return Err(e);
                }
            }
        }

        self.blocks_decoded += 1;
        debug!(
            "[BLOCK] #{}: {} columns x {} rows ({} bytes)",
            self.blocks_decoded,
            column_count,
            row_count,
            reader.position() - start
        );
        Ok(Some(Block::new(columns, row_count)))
    }

    async fn decode_column<S>(
        &mut self,
        reader: &mut FrameReader<S>,
        name: String,
        rows: usize,
    ) -> Result<Column, FetchError>
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Unpin + Send,
    {
        let type_name = read_utf8(reader, self.limits.max_string_len).await?;

        let started = Instant::now();
        let misses = self.cache.misses();
        let descriptor = self.cache.resolve(&type_name)?;
        if self.cache.misses() != misses {
            self.parse_time += started.elapsed();
        }

        let data = if rows == 0 {
            empty_column(&descriptor)
        } else {
            read_state_prefixes(reader, &descriptor).await?;
            decode_data(reader, &descriptor, rows, self.limits).await?
        };

        Ok(Column { name, type_name, descriptor, data })
    }
}

/// Decode `rows` values of `ty` (data streams only; prefixes already consumed).
pub(crate) fn decode_data<'a, S>(
    reader: &'a mut FrameReader<S>,
    ty: &'a TypeDescriptor,
    rows: usize,
    limits: DecodeLimits,
) -> BoxFuture<'a, Result<ColumnData, FetchError>>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin + Send,
{
    async move {
        use TypeDescriptor as T;
        let data = match ty {
            T::Bool => ColumnData::Bool(read_fixed(reader, rows, 1).await?.iter().map(|&b| b != 0).collect()),
            T::UInt8 => ColumnData::UInt8(read_fixed(reader, rows, 1).await?.to_vec()),
            T::Int8 => ColumnData::Int8(read_fixed(reader, rows, 1).await?.iter().map(|&b| b as i8).collect()),
            T::UInt16 => ColumnData::UInt16(read_packed(reader, rows, 2, LittleEndian::read_u16_into).await?),
            T::UInt32 => ColumnData::UInt32(read_packed(reader, rows, 4, LittleEndian::read_u32_into).await?),
            T::UInt64 => ColumnData::UInt64(read_packed(reader, rows, 8, LittleEndian::read_u64_into).await?),
            T::UInt128 => ColumnData::UInt128(read_packed(reader, rows, 16, LittleEndian::read_u128_into).await?),
            T::Int16 => ColumnData::Int16(read_packed(reader, rows, 2, LittleEndian::read_i16_into).await?),
            T::Int32 => ColumnData::Int32(read_packed(reader, rows, 4, LittleEndian::read_i32_into).await?),
            T::Int64 => ColumnData::Int64(read_packed(reader, rows, 8, LittleEndian::read_i64_into).await?),
            T::Int128 => ColumnData::Int128(read_packed(reader, rows, 16, LittleEndian::read_i128_into).await?),
            T::Float32 => ColumnData::Float32(read_packed(reader, rows, 4, LittleEndian::read_f32_into).await?),
            T::Float64 => ColumnData::Float64(read_packed(reader, rows, 8, LittleEndian::read_f64_into).await?),
            T::UInt256 => ColumnData::UInt256(read_arrays::<_, 32>(reader, rows).await?),
            T::Int256 => ColumnData::Int256(read_arrays::<_, 32>(reader, rows).await?),
            T::String => ColumnData::String(read_strings(reader, rows, limits.max_string_len).await?),
            T::FixedString(n) => {
                let raw = read_fixed(reader, rows, *n).await?;
                ColumnData::FixedString((0..rows).map(|i| raw.slice(i * n..(i + 1) * n)).collect())
            }
            T::Uuid => {
                let mut values = read_arrays::<_, 16>(reader, rows).await?;
                // Each 8-byte half travels as a little-endian u64.
                for v in values.iter_mut() {
                    v[..8].reverse();
                    v[8..].reverse();
                }
                ColumnData::Uuid(values.into_iter().map(Uuid::from_bytes).collect())
            }
            T::Date => {
                let offset = reader.position();
                let days = read_packed(reader, rows, 2, LittleEndian::read_u16_into).await?;
                ColumnData::Date(to_dates(days.into_iter().map(i64::from), offset)?)
            }
            T::Date32 => {
                let offset = reader.position();
                let days = read_packed(reader, rows, 4, LittleEndian::read_i32_into).await?;
                ColumnData::Date(to_dates(days.into_iter().map(i64::from), offset)?)
            }
            T::DateTime { timezone } => {
                let seconds = read_packed(reader, rows, 4, LittleEndian::read_u32_into).await?;
                ColumnData::DateTime {
                    ticks: seconds.into_iter().map(i64::from).collect(),
                    precision: 0,
                    timezone: timezone.as_deref().map(Arc::from),
                }
            }
            T::DateTime64 { precision, timezone } => ColumnData::DateTime {
                ticks: read_packed(reader, rows, 8, LittleEndian::read_i64_into).await?,
                precision: *precision,
                timezone: timezone.as_deref().map(Arc::from),
            },
            T::Decimal { precision, scale } => match decimal_width(*precision) {
                32 => ColumnData::Decimal256 {
                    raw: read_arrays::<_, 32>(reader, rows).await?,
                    scale: *scale,
                },
                width => ColumnData::Decimal {
                    mantissas: read_decimals(reader, rows, width).await?,
                    scale: *scale,
                },
            },
            T::Enum8(variants) => {
                let offset = reader.position();
                let raw = read_fixed(reader, rows, 1).await?;
                let codes = raw.iter().map(|&b| i16::from(b as i8)).collect();
                enum_column(codes, variants, offset)?
            }
            T::Enum16(variants) => {
                let offset = reader.position();
                let codes = read_packed(reader, rows, 2, LittleEndian::read_i16_into).await?;
                enum_column(codes, variants, offset)?
            }
            T::Ipv4 => {
                let raw = read_packed(reader, rows, 4, LittleEndian::read_u32_into).await?;
                ColumnData::Ipv4(raw.into_iter().map(Ipv4Addr::from).collect())
            }
            T::Ipv6 => {
                let raw = read_arrays::<_, 16>(reader, rows).await?;
                ColumnData::Ipv6(raw.into_iter().map(Ipv6Addr::from).collect())
            }
            T::Json => {
                let mut docs = Vec::with_capacity(rows.min(PREALLOC_LIMIT));
                for _ in 0..rows {
                    let offset = reader.position();
                    let raw = read_bytes(reader, limits.max_string_len).await?;
                    let doc = serde_json::from_slice(&raw)
                        .map_err(|e| FetchError::protocol(offset, format!("invalid JSON document: {e}")))?;
                    docs.push(doc);
                }
                ColumnData::Json(docs)
            }
            T::Nothing => {
                read_fixed(reader, rows, 1).await?;
                ColumnData::Nothing(rows)
            }
            T::Nullable(inner) => {
                let nulls = read_fixed(reader, rows, 1).await?.iter().map(|&b| b != 0).collect();
                let inner = decode_data(reader, inner, rows, limits).await?;
                ColumnData::Nullable { nulls, inner: Box::new(inner) }
            }
            T::Array(inner) => {
                let offsets = read_offsets(reader, rows).await?;
                let total = total_items(&offsets, reader.position())?;
                let items = decode_data(reader, inner, total, limits).await?;
                ColumnData::Array { offsets, items: Box::new(items) }
            }
            T::Tuple { elements, .. } => {
                let mut columns = Vec::with_capacity(elements.len());
                for element in elements {
                    columns.push(decode_data(reader, element, rows, limits).await?);
                }
                ColumnData::Tuple(columns)
            }
            T::Map(key, value) => {
                let offsets = read_offsets(reader, rows).await?;
                let total = total_items(&offsets, reader.position())?;
                let keys = decode_data(reader, key, total, limits).await?;
                let values = decode_data(reader, value, total, limits).await?;
                ColumnData::Map { offsets, keys: Box::new(keys), values: Box::new(values) }
            }
            T::LowCardinality(inner) => decode_low_cardinality(reader, inner, rows, limits).await?,
        };
        Ok(data)
    }
    .boxed()
}

/// Zero-row buffer shaped like `ty`.
pub(crate) fn empty_column(ty: &TypeDescriptor) -> ColumnData {
    use TypeDescriptor as T;
    match ty {
        T::Bool => ColumnData::Bool(Vec::new()),
        T::UInt8 => ColumnData::UInt8(Vec::new()),
        T::UInt16 => ColumnData::UInt16(Vec::new()),
        T::UInt32 => ColumnData::UInt32(Vec::new()),
        T::UInt64 => ColumnData::UInt64(Vec::new()),
        T::UInt128 => ColumnData::UInt128(Vec::new()),
        T::UInt256 => ColumnData::UInt256(Vec::new()),
        T::Int8 => ColumnData::Int8(Vec::new()),
        T::Int16 => ColumnData::Int16(Vec::new()),
        T::Int32 => ColumnData::Int32(Vec::new()),
        T::Int64 => ColumnData::Int64(Vec::new()),
        T::Int128 => ColumnData::Int128(Vec::new()),
        T::Int256 => ColumnData::Int256(Vec::new()),
        T::Float32 => ColumnData::Float32(Vec::new()),
        T::Float64 => ColumnData::Float64(Vec::new()),
        T::String => ColumnData::String(Vec::new()),
        T::FixedString(_) => ColumnData::FixedString(Vec::new()),
        T::Uuid => ColumnData::Uuid(Vec::new()),
        T::Date | T::Date32 => ColumnData::Date(Vec::new()),
        T::DateTime { timezone } => ColumnData::DateTime {
            ticks: Vec::new(),
            precision: 0,
            timezone: timezone.as_deref().map(Arc::from),
        },
        T::DateTime64 { precision, timezone } => ColumnData::DateTime {
            ticks: Vec::new(),
            precision: *precision,
            timezone: timezone.as_deref().map(Arc::from),
        },
        T::Decimal { precision, scale } if decimal_width(*precision) == 32 => ColumnData::Decimal256 {
            raw: Vec::new(),
            scale: *scale,
        },
        T::Decimal { scale, .. } => ColumnData::Decimal { mantissas: Vec::new(), scale: *scale },
        T::Enum8(variants) | T::Enum16(variants) => ColumnData::Enum {
            codes: Vec::new(),
            variants: variants.clone(),
        },
        T::Ipv4 => ColumnData::Ipv4(Vec::new()),
        T::Ipv6 => ColumnData::Ipv6(Vec::new()),
        T::Json => ColumnData::Json(Vec::new()),
        T::Nothing => ColumnData::Nothing(0),
        T::Nullable(inner) => ColumnData::Nullable {
            nulls: Vec::new(),
            inner: Box::new(empty_column(inner)),
        },
        T::Array(inner) => ColumnData::Array {
            offsets: Vec::new(),
            items: Box::new(empty_column(inner)),
        },
        T::Tuple { elements, .. } => ColumnData::Tuple(elements.iter().map(empty_column).collect()),
        T::Map(key, value) => ColumnData::Map {
            offsets: Vec::new(),
            keys: Box::new(empty_column(key)),
            values: Box::new(empty_column(value)),
        },
        T::LowCardinality(inner) => ColumnData::LowCardinality {
            dictionary: Box::new(empty_column(inner.without_nullable())),
            indices: Vec::new(),
            nullable: inner.is_nullable(),
        },
    }
}

// ---- Helpers ----

async fn read_count<S>(reader: &mut FrameReader<S>, limit: usize, what: &str) -> Result<usize, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let offset = reader.position();
    let value = reader.read_varint().await?;
    match usize::try_from(value) {
        Ok(n) if n <= limit => Ok(n),
        _ => Err(FetchError::protocol(offset, format!("{what} {value} exceeds limit {limit}"))),
    }
}

/// Length-prefixed byte string.
pub(crate) async fn read_bytes<S>(reader: &mut FrameReader<S>, max_len: usize) -> Result<Bytes, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let len = read_count(reader, max_len, "string length").await?;
    Ok(reader.read_exact(len).await?)
}

async fn read_utf8<S>(reader: &mut FrameReader<S>, max_len: usize) -> Result<String, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let offset = reader.position();
    let raw = read_bytes(reader, max_len).await?;
    String::from_utf8(raw.to_vec()).map_err(|_| FetchError::protocol(offset, "header string is not valid UTF-8"))
}

async fn read_strings<S>(reader: &mut FrameReader<S>, rows: usize, max_len: usize) -> Result<Vec<Bytes>, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let mut values = Vec::with_capacity(rows.min(PREALLOC_LIMIT));
    for _ in 0..rows {
        values.push(read_bytes(reader, max_len).await?);
    }
    Ok(values)
}

/// `rows * width` contiguous bytes.
pub(crate) async fn read_fixed<S>(reader: &mut FrameReader<S>, rows: usize, width: usize) -> Result<Bytes, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let total = rows
        .checked_mul(width)
        .ok_or_else(|| FetchError::protocol(reader.position(), format!("{rows} values of {width} bytes overflow")))?;
    Ok(reader.read_exact(total).await?)
}

/// Packed little-endian array, unpacked with one of byteorder's `read_*_into`.
pub(crate) async fn read_packed<S, T>(
    reader: &mut FrameReader<S>,
    rows: usize,
    width: usize,
    unpack: fn(&[u8], &mut [T]),
) -> Result<Vec<T>, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
    T: Default + Clone,
{
    let raw = read_fixed(reader, rows, width).await?;
    let mut values = vec![T::default(); rows];
    unpack(&raw, &mut values);
    Ok(values)
}

async fn read_arrays<S, const N: usize>(reader: &mut FrameReader<S>, rows: usize) -> Result<Vec<[u8; N]>, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let raw = read_fixed(reader, rows, N).await?;
    Ok(raw
        .chunks_exact(N)
        .map(|chunk| {
            let mut value = [0u8; N];
            value.copy_from_slice(chunk);
            value
        })
        .collect())
}

/// `Decimal(1..=38)` mantissas widened to i128.
async fn read_decimals<S>(reader: &mut FrameReader<S>, rows: usize, width: usize) -> Result<Vec<i128>, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    match width {
        4 => Ok(read_packed(reader, rows, 4, LittleEndian::read_i32_into)
            .await?
            .into_iter()
            .map(i128::from)
            .collect()),
        8 => Ok(read_packed(reader, rows, 8, LittleEndian::read_i64_into)
            .await?
            .into_iter()
            .map(i128::from)
            .collect()),
        _ => read_packed(reader, rows, 16, LittleEndian::read_i128_into).await,
    }
}

/// Cumulative u64 offsets, checked for monotonicity.
pub(crate) async fn read_offsets<S>(reader: &mut FrameReader<S>, rows: usize) -> Result<Vec<u64>, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let start = reader.position();
    let offsets = read_packed(reader, rows, 8, LittleEndian::read_u64_into).await?;
    let mut previous = 0u64;
    for (i, &offset) in offsets.iter().enumerate() {
        if offset < previous {
            return Err(FetchError::protocol(
                start + (i * 8) as u64,
                format!("array offset {offset} at row {i} is below previous offset {previous}"),
            ));
        }
        previous = offset;
    }
    Ok(offsets)
}

fn total_items(offsets: &[u64], offset: u64) -> Result<usize, FetchError> {
    let last = offsets.last().copied().unwrap_or(0);
    usize::try_from(last).map_err(|_| FetchError::protocol(offset, format!("array item count {last} overflows")))
}

fn to_dates(days: impl Iterator<Item = i64>, offset: u64) -> Result<Vec<chrono::NaiveDate>, FetchError> {
    days.map(|d| {
        date_from_epoch_days(d).ok_or_else(|| FetchError::protocol(offset, format!("day number {d} out of range")))
    })
    .collect()
}

fn enum_column(codes: Vec<i16>, variants: &EnumVariants, offset: u64) -> Result<ColumnData, FetchError> {
    if let Some(code) = codes.iter().find(|&&c| variants.label(c).is_none()) {
        return Err(FetchError::protocol(offset, format!("enum code {code} has no label")));
    }
    Ok(ColumnData::Enum { codes, variants: variants.clone() })
}
