//! block/types.rs
//!
//! Decoded blocks and their column buffers.
//!
//! Design notes:
//! - Buffers are column-major and typed per leaf kind; `Value`s are built
//!   only when a row view asks for a cell.
//! - Every buffer of a block holds exactly `row_count` logical entries.
//! - The name index is built once per block and shared by all its rows.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::schema::{EnumVariants, TypeDescriptor};
use crate::value::{Decimal, Decimal256, Timestamp, Value};

/// Typed, column-major storage for one column (or one nested sub-column).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<bool>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    UInt128(Vec<u128>),
    UInt256(Vec<[u8; 32]>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int128(Vec<i128>),
    Int256(Vec<[u8; 32]>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Raw string payloads; UTF-8 is checked per cell.
    String(Vec<Bytes>),
    /// Raw fixed-size payloads, NUL padding included.
    FixedString(Vec<Bytes>),
    Uuid(Vec<Uuid>),
    Date(Vec<NaiveDate>),
    DateTime {
        ticks: Vec<i64>,
        precision: u8,
        timezone: Option<Arc<str>>,
    },
    Decimal { mantissas: Vec<i128>, scale: u8 },
    /// `Decimal(39..=76)`: little-endian 256-bit mantissas.
    Decimal256 { raw: Vec<[u8; 32]>, scale: u8 },
    Enum { codes: Vec<i16>, variants: EnumVariants },
    Ipv4(Vec<Ipv4Addr>),
    Ipv6(Vec<Ipv6Addr>),
    Json(Vec<serde_json::Value>),
    /// Row count only; every cell is null.
    Nothing(usize),
    Nullable { nulls: Vec<bool>, inner: Box<ColumnData> },
    /// `offsets[i]` is the cumulative item count through row `i`.
    Array { offsets: Vec<u64>, items: Box<ColumnData> },
    Tuple(Vec<ColumnData>),
    Map {
        offsets: Vec<u64>,
        keys: Box<ColumnData>,
        values: Box<ColumnData>,
    },
    LowCardinality {
        dictionary: Box<ColumnData>,
        indices: Vec<u64>,
        /// Index 0 denotes null.
        nullable: bool,
    },
}

impl ColumnData {
    /// Number of logical entries.
    pub fn len(&self) -> usize {
        use ColumnData::*;
        match self {
            Bool(v) => v.len(),
            UInt8(v) => v.len(),
            UInt16(v) => v.len(),
            UInt32(v) => v.len(),
            UInt64(v) => v.len(),
            UInt128(v) => v.len(),
            UInt256(v) | Int256(v) => v.len(),
            Int8(v) => v.len(),
            Int16(v) => v.len(),
            Int32(v) => v.len(),
            Int64(v) => v.len(),
            Int128(v) => v.len(),
            Float32(v) => v.len(),
            Float64(v) => v.len(),
            String(v) | FixedString(v) => v.len(),
            Uuid(v) => v.len(),
            Date(v) => v.len(),
            DateTime { ticks, .. } => ticks.len(),
            Decimal { mantissas, .. } => mantissas.len(),
            Decimal256 { raw, .. } => raw.len(),
            Enum { codes, .. } => codes.len(),
            Ipv4(v) => v.len(),
            Ipv6(v) => v.len(),
            Json(v) => v.len(),
            Nothing(n) => *n,
            Nullable { nulls, .. } => nulls.len(),
            Array { offsets, .. } | Map { offsets, .. } => offsets.len(),
            Tuple(elements) => elements.first().map_or(0, ColumnData::len),
            LowCardinality { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the value at `row`.
    ///
    /// The decoder validates offsets and indices, so `row < len()` is the only
    /// precondition.
    pub fn value_at(&self, row: usize) -> Value {
        use ColumnData as C;
        match self {
            C::Bool(v) => Value::Bool(v[row]),
            C::UInt8(v) => Value::UInt8(v[row]),
            C::UInt16(v) => Value::UInt16(v[row]),
            C::UInt32(v) => Value::UInt32(v[row]),
            C::UInt64(v) => Value::UInt64(v[row]),
            C::UInt128(v) => Value::UInt128(v[row]),
            C::UInt256(v) => Value::UInt256(v[row]),
            C::Int8(v) => Value::Int8(v[row]),
            C::Int16(v) => Value::Int16(v[row]),
            C::Int32(v) => Value::Int32(v[row]),
            C::Int64(v) => Value::Int64(v[row]),
            C::Int128(v) => Value::Int128(v[row]),
            C::Int256(v) => Value::Int256(v[row]),
            C::Float32(v) => Value::Float32(v[row]),
            C::Float64(v) => Value::Float64(v[row]),
            C::String(v) => string_value(&v[row]),
            C::FixedString(v) => {
                let raw = &v[row];
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                string_value(&raw[..end])
            }
            C::Uuid(v) => Value::Uuid(v[row]),
            C::Date(v) => Value::Date(v[row]),
            C::DateTime { ticks, precision, timezone } => Value::DateTime(Timestamp {
                ticks: ticks[row],
                precision: *precision,
                timezone: timezone.clone(),
            }),
            C::Decimal { mantissas, scale } => Value::Decimal(Decimal::new(mantissas[row], *scale)),
            C::Decimal256 { raw, scale } => Value::Decimal256(Decimal256::new(raw[row], *scale)),
            C::Enum { codes, variants } => {
                let code = codes[row];
                Value::Enum {
                    label: variants.label(code).unwrap_or_default().to_string(),
                    code,
                }
            }
            C::Ipv4(v) => Value::Ipv4(v[row]),
            C::Ipv6(v) => Value::Ipv6(v[row]),
            C::Json(v) => Value::Json(v[row].clone()),
            C::Nothing(_) => Value::Null,
            C::Nullable { nulls, inner } => {
                if nulls[row] {
                    Value::Null
                } else {
                    inner.value_at(row)
                }
            }
            C::Array { offsets, items } => {
                let (start, end) = slice_bounds(offsets, row);
                Value::Array((start..end).map(|i| items.value_at(i)).collect())
            }
            C::Tuple(elements) => Value::Tuple(elements.iter().map(|e| e.value_at(row)).collect()),
            C::Map { offsets, keys, values } => {
                let (start, end) = slice_bounds(offsets, row);
                Value::Map(
                    (start..end)
                        .map(|i| (keys.value_at(i), values.value_at(i)))
                        .collect(),
                )
            }
            C::LowCardinality { dictionary, indices, nullable } => {
                let index = indices[row] as usize;
                if *nullable && index == 0 {
                    Value::Null
                } else {
                    dictionary.value_at(index)
                }
            }
        }
    }
}

fn string_value(raw: &[u8]) -> Value {
    match std::str::from_utf8(raw) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::Bytes(raw.to_vec()),
    }
}

fn slice_bounds(offsets: &[u64], row: usize) -> (usize, usize) {
    let start = if row == 0 { 0 } else { offsets[row - 1] as usize };
    (start, offsets[row] as usize)
}

/// One named, typed column of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Type string exactly as received.
    pub type_name: String,
    pub descriptor: Arc<TypeDescriptor>,
    pub data: ColumnData,
}

/// Fully decoded block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    columns: Vec<Column>,
    row_count: usize,
    names: Arc<HashMap<String, usize>>,
}

impl Block {
    /// Build a block; the first column carrying a given name wins lookups.
    pub fn new(columns: Vec<Column>, row_count: usize) -> Self {
        let mut names = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            names.entry(column.name.clone()).or_insert(i);
        }
        Self { columns, row_count, names: Arc::new(names) }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Cell at (`row`, `column`), or `None` when either is out of range.
    pub fn value(&self, row: usize, column: usize) -> Option<Value> {
        if row >= self.row_count {
            return None;
        }
        self.columns.get(column).map(|c| c.data.value_at(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data: ColumnData) -> Column {
        Column {
            name: name.to_string(),
            type_name: "UInt8".to_string(),
            descriptor: Arc::new(TypeDescriptor::UInt8),
            data,
        }
    }

    #[test]
    fn duplicate_names_resolve_to_first() {
        let block = Block::new(
            vec![
                column("x", ColumnData::UInt8(vec![1])),
                column("x", ColumnData::UInt8(vec![2])),
            ],
            1,
        );
        assert_eq!(block.column_index("x"), Some(0));
        assert_eq!(block.value(0, 1), Some(Value::UInt8(2)));
        assert_eq!(block.value(1, 0), None);
    }

    #[test]
    fn array_rows_slice_between_offsets() {
        let data = ColumnData::Array {
            offsets: vec![2, 2, 3],
            items: Box::new(ColumnData::UInt8(vec![7, 8, 9])),
        };
        assert_eq!(data.len(), 3);
        assert_eq!(data.value_at(0), Value::Array(vec![Value::UInt8(7), Value::UInt8(8)]));
        assert_eq!(data.value_at(1), Value::Array(vec![]));
        assert_eq!(data.value_at(2), Value::Array(vec![Value::UInt8(9)]));
    }

    #[test]
    fn fixed_string_drops_trailing_nuls() {
        let data = ColumnData::FixedString(vec![Bytes::from_static(b"ab\0\0")]);
        assert_eq!(data.value_at(0), Value::String("ab".into()));
    }
}
