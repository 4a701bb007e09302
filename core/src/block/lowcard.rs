//! block/lowcard.rs
//!
//! LowCardinality columns: a per-block dictionary of distinct keys plus one
//! index per row.
//!
//! Wire layout:
//! - prefix (once per LowCardinality node, before any data of the column):
//!   `version: u64`
//! - data: `serialization_type: u64, key_count: u64, keys, index_count: u64, indices`
//!
//! Only self-contained dictionaries are accepted. For `LowCardinality(Nullable(T))`
//! keys are plain `T` and index 0 stands for null.

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use futures::Stream;

use crate::block::decode::{decode_data, empty_column, read_fixed, read_packed, DecodeLimits};
use crate::block::types::ColumnData;
use crate::constants::low_cardinality::{
    HAS_ADDITIONAL_KEYS, INDEX_TYPE_MASK, INDEX_U16, INDEX_U32, INDEX_U64, INDEX_U8,
    NEED_GLOBAL_DICTIONARY, SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS,
};
use crate::framing::FrameReader;
use crate::schema::TypeDescriptor;
use crate::types::{FetchError, TransportError};

/// Number of LowCardinality nodes whose state prefix precedes the column data.
fn prefix_count(ty: &TypeDescriptor) -> usize {
    use TypeDescriptor as T;
    match ty {
        T::LowCardinality(_) => 1,
        T::Nullable(inner) | T::Array(inner) => prefix_count(inner),
        T::Tuple { elements, .. } => elements.iter().map(prefix_count).sum(),
        T::Map(key, value) => prefix_count(key) + prefix_count(value),
        _ => 0,
    }
}

async fn read_u64<S>(reader: &mut FrameReader<S>) -> Result<u64, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let raw = reader.read_exact(8).await?;
    Ok(LittleEndian::read_u64(&raw))
}

/// Consume and check the key-version prefixes of every LowCardinality node in `ty`.
pub(crate) async fn read_state_prefixes<S>(
    reader: &mut FrameReader<S>,
    ty: &TypeDescriptor,
) -> Result<(), FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    for _ in 0..prefix_count(ty) {
        let offset = reader.position();
        let version = read_u64(reader).await?;
        if version != SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS {
            return Err(FetchError::protocol(
                offset,
                format!("unsupported LowCardinality key version {version}"),
            ));
        }
    }
    Ok(())
}

pub(crate) async fn decode_low_cardinality<S>(
    reader: &mut FrameReader<S>,
    inner: &TypeDescriptor,
    rows: usize,
    limits: DecodeLimits,
) -> Result<ColumnData, FetchError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin + Send,
{
    let nullable = inner.is_nullable();
    let key_type = inner.without_nullable();

    // Nested inside an empty array: nothing is written.
    if rows == 0 {
        return Ok(ColumnData::LowCardinality {
            dictionary: Box::new(empty_column(key_type)),
            indices: Vec::new(),
            nullable,
        });
    }

    let offset = reader.position();
    let serialization = read_u64(reader).await?;
    if serialization & NEED_GLOBAL_DICTIONARY != 0 {
        return Err(FetchError::protocol(offset, "LowCardinality global dictionary is not supported"));
    }
    if serialization & HAS_ADDITIONAL_KEYS == 0 {
        return Err(FetchError::protocol(offset, "LowCardinality block carries no dictionary keys"));
    }
    let index_width = match serialization & INDEX_TYPE_MASK {
        INDEX_U8 => 1,
        INDEX_U16 => 2,
        INDEX_U32 => 4,
        INDEX_U64 => 8,
        other => {
            return Err(FetchError::protocol(offset, format!("unknown LowCardinality index type {other}")));
        }
    };

    let offset = reader.position();
    let key_count = read_u64(reader).await?;
    let key_count = usize::try_from(key_count)
        .ok()
        .filter(|&n| n <= limits.max_block_rows)
        .ok_or_else(|| FetchError::protocol(offset, format!("dictionary size {key_count} exceeds limit")))?;
    let dictionary = decode_data(reader, key_type, key_count, limits).await?;

    let offset = reader.position();
    let index_count = read_u64(reader).await?;
    if index_count != rows as u64 {
        return Err(FetchError::protocol(
            offset,
            format!("LowCardinality index count {index_count} does not match row count {rows}"),
        ));
    }

    let offset = reader.position();
    let indices: Vec<u64> = match index_width {
        1 => read_fixed(reader, rows, 1).await?.iter().map(|&b| u64::from(b)).collect(),
        2 => read_packed(reader, rows, 2, LittleEndian::read_u16_into)
            .await?
            .into_iter()
            .map(u64::from)
            .collect(),
        4 => read_packed(reader, rows, 4, LittleEndian::read_u32_into)
            .await?
            .into_iter()
            .map(u64::from)
            .collect(),
        _ => read_packed(reader, rows, 8, LittleEndian::read_u64_into).await?,
    };

    if let Some((row, index)) = indices.iter().enumerate().find(|&(_, &i)| i >= key_count as u64) {
        return Err(FetchError::protocol(
            offset + (row * index_width) as u64,
            format!("dictionary index {index} out of range for {key_count} keys"),
        ));
    }

    Ok(ColumnData::LowCardinality {
        dictionary: Box::new(dictionary),
        indices,
        nullable,
    })
}
