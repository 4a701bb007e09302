//! Shared test support: a Native block encoder, chunk splitters and a
//! scripted transport.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chlite_core::prelude::*;
use chlite_core::schema::decimal_width;
use chlite_core::transport::chunks_from;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;

// ---- Varints ----

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn varint(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(&mut out, value);
    out
}

fn write_str(out: &mut Vec<u8>, s: &[u8]) {
    write_varint(out, s.len() as u64);
    out.extend_from_slice(s);
}

// ---- Block encoder ----

/// One column for [`encode_block`]: name, type string, one value per row.
pub struct TestColumn {
    pub name: String,
    pub type_name: String,
    pub values: Vec<Value>,
}

pub fn col(name: &str, type_name: &str, values: Vec<Value>) -> TestColumn {
    TestColumn { name: name.to_string(), type_name: type_name.to_string(), values }
}

/// Encode one Native block. All columns must carry the same number of values.
pub fn encode_block(columns: &[TestColumn]) -> Vec<u8> {
    let rows = columns.first().map_or(0, |c| c.values.len());
    let mut out = Vec::new();
    write_varint(&mut out, columns.len() as u64);
    write_varint(&mut out, rows as u64);
    for column in columns {
        assert_eq!(column.values.len(), rows, "ragged test block");
        write_str(&mut out, column.name.as_bytes());
        write_str(&mut out, column.type_name.as_bytes());
        if rows > 0 {
            let ty = parse_type(&column.type_name).expect("test type parses");
            for _ in 0..low_cardinality_nodes(&ty) {
                out.extend_from_slice(&1u64.to_le_bytes());
            }
            write_data(&mut out, &ty, &column.values);
        }
    }
    out
}

/// Concatenate several encoded blocks into one body.
pub fn encode_stream(blocks: &[Vec<TestColumn>]) -> Vec<u8> {
    blocks.iter().flat_map(|b| encode_block(b)).collect()
}

fn low_cardinality_nodes(ty: &TypeDescriptor) -> usize {
    match ty {
        TypeDescriptor::LowCardinality(_) => 1,
        TypeDescriptor::Nullable(inner) | TypeDescriptor::Array(inner) => low_cardinality_nodes(inner),
        TypeDescriptor::Tuple { elements, .. } => elements.iter().map(low_cardinality_nodes).sum(),
        TypeDescriptor::Map(k, v) => low_cardinality_nodes(k) + low_cardinality_nodes(v),
        _ => 0,
    }
}

/// Placeholder written under a null.
pub fn default_value(ty: &TypeDescriptor) -> Value {
    use TypeDescriptor as T;
    match ty {
        T::Bool => Value::Bool(false),
        T::UInt8 => Value::UInt8(0),
        T::UInt16 => Value::UInt16(0),
        T::UInt32 => Value::UInt32(0),
        T::UInt64 => Value::UInt64(0),
        T::UInt128 => Value::UInt128(0),
        T::UInt256 => Value::UInt256([0; 32]),
        T::Int8 => Value::Int8(0),
        T::Int16 => Value::Int16(0),
        T::Int32 => Value::Int32(0),
        T::Int64 => Value::Int64(0),
        T::Int128 => Value::Int128(0),
        T::Int256 => Value::Int256([0; 32]),
        T::Float32 => Value::Float32(0.0),
        T::Float64 => Value::Float64(0.0),
        T::String | T::FixedString(_) => Value::String(String::new()),
        T::Json => Value::Json(serde_json::json!({})),
        T::Uuid => Value::Uuid(Uuid::nil()),
        T::Date | T::Date32 => Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        T::DateTime { .. } | T::DateTime64 { .. } => {
            Value::DateTime(Timestamp { ticks: 0, precision: 0, timezone: None })
        }
        T::Decimal { precision, scale } if decimal_width(*precision) == 32 => {
            Value::Decimal256(Decimal256::new([0; 32], *scale))
        }
        T::Decimal { scale, .. } => Value::Decimal(Decimal::new(0, *scale)),
        T::Enum8(v) | T::Enum16(v) => {
            let (label, code) = v.iter().next().expect("enum has variants");
            Value::Enum { label: label.to_string(), code }
        }
        T::Ipv4 => Value::Ipv4(std::net::Ipv4Addr::UNSPECIFIED),
        T::Ipv6 => Value::Ipv6(std::net::Ipv6Addr::UNSPECIFIED),
        T::Nothing | T::Nullable(_) => Value::Null,
        T::Array(_) => Value::Array(Vec::new()),
        T::Map(..) => Value::Map(Vec::new()),
        T::Tuple { elements, .. } => Value::Tuple(elements.iter().map(default_value).collect()),
        T::LowCardinality(inner) => default_value(inner),
    }
}

fn days(date: &NaiveDate) -> i64 {
    date.signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days()
}

pub fn write_data(out: &mut Vec<u8>, ty: &TypeDescriptor, values: &[Value]) {
    use TypeDescriptor as T;
    match ty {
        T::Nullable(inner) => {
            for v in values {
                out.push(u8::from(v.is_null()));
            }
            let placeholders: Vec<Value> = values
                .iter()
                .map(|v| if v.is_null() { default_value(inner) } else { v.clone() })
                .collect();
            write_data(out, inner, &placeholders);
        }
        T::Array(inner) => {
            let mut total = 0u64;
            let mut items = Vec::new();
            for v in values {
                let Value::Array(xs) = v else { panic!("expected array, got {v:?}") };
                total += xs.len() as u64;
                out.extend_from_slice(&total.to_le_bytes());
                items.extend(xs.iter().cloned());
            }
            write_data(out, inner, &items);
        }
        T::Tuple { elements, .. } => {
            for (i, element) in elements.iter().enumerate() {
                let column: Vec<Value> = values
                    .iter()
                    .map(|v| match v {
                        Value::Tuple(xs) => xs[i].clone(),
                        other => panic!("expected tuple, got {other:?}"),
                    })
                    .collect();
                write_data(out, element, &column);
            }
        }
        T::Map(key, value) => {
            let mut total = 0u64;
            let (mut keys, mut vals) = (Vec::new(), Vec::new());
            for v in values {
                let Value::Map(entries) = v else { panic!("expected map, got {v:?}") };
                total += entries.len() as u64;
                out.extend_from_slice(&total.to_le_bytes());
                for (k, x) in entries {
                    keys.push(k.clone());
                    vals.push(x.clone());
                }
            }
            write_data(out, key, &keys);
            write_data(out, value, &vals);
        }
        T::LowCardinality(inner) => write_low_cardinality(out, inner, values),
        _ => {
            for v in values {
                write_leaf(out, ty, v);
            }
        }
    }
}

fn write_low_cardinality(out: &mut Vec<u8>, inner: &TypeDescriptor, values: &[Value]) {
    if values.is_empty() {
        return;
    }
    let nullable = inner.is_nullable();
    let key_type = inner.without_nullable();

    let mut keys: Vec<Value> = Vec::new();
    if nullable {
        keys.push(default_value(key_type));
    }
    let mut indices = Vec::with_capacity(values.len());
    for v in values {
        if nullable && v.is_null() {
            indices.push(0u64);
            continue;
        }
        let start = usize::from(nullable);
        let pos = match keys[start..].iter().position(|k| k == v) {
            Some(p) => p + start,
            None => {
                keys.push(v.clone());
                keys.len() - 1
            }
        };
        indices.push(pos as u64);
    }

    let (code, width) = if keys.len() <= 0xFF { (0u64, 1) } else { (1u64, 2) };
    out.extend_from_slice(&((1u64 << 9) | code).to_le_bytes());
    out.extend_from_slice(&(keys.len() as u64).to_le_bytes());
    write_data(out, key_type, &keys);
    out.extend_from_slice(&(values.len() as u64).to_le_bytes());
    for index in indices {
        out.extend_from_slice(&index.to_le_bytes()[..width]);
    }
}

fn write_leaf(out: &mut Vec<u8>, ty: &TypeDescriptor, value: &Value) {
    use TypeDescriptor as T;
    match (ty, value) {
        (T::Bool, Value::Bool(b)) => out.push(u8::from(*b)),
        (T::UInt8, Value::UInt8(v)) => out.push(*v),
        (T::UInt16, Value::UInt16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::UInt32, Value::UInt32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::UInt64, Value::UInt64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::UInt128, Value::UInt128(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::UInt256, Value::UInt256(v)) | (T::Int256, Value::Int256(v)) => out.extend_from_slice(v),
        (T::Int8, Value::Int8(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Int16, Value::Int16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Int32, Value::Int32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Int64, Value::Int64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Int128, Value::Int128(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Float32, Value::Float32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::Float64, Value::Float64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (T::String, Value::String(s)) => write_str(out, s.as_bytes()),
        (T::String, Value::Bytes(b)) => write_str(out, b),
        (T::FixedString(n), Value::String(s)) => {
            let mut raw = s.as_bytes().to_vec();
            raw.resize(*n, 0);
            out.extend_from_slice(&raw);
        }
        (T::Json, Value::Json(doc)) => write_str(out, doc.to_string().as_bytes()),
        (T::Uuid, Value::Uuid(id)) => {
            let mut raw = *id.as_bytes();
            raw[..8].reverse();
            raw[8..].reverse();
            out.extend_from_slice(&raw);
        }
        (T::Date, Value::Date(d)) => out.extend_from_slice(&(days(d) as u16).to_le_bytes()),
        (T::Date32, Value::Date(d)) => out.extend_from_slice(&(days(d) as i32).to_le_bytes()),
        (T::DateTime { .. }, Value::DateTime(ts)) => out.extend_from_slice(&(ts.ticks as u32).to_le_bytes()),
        (T::DateTime64 { .. }, Value::DateTime(ts)) => out.extend_from_slice(&ts.ticks.to_le_bytes()),
        (T::Decimal { precision, .. }, Value::Decimal(d)) => match decimal_width(*precision) {
            4 => out.extend_from_slice(&(d.mantissa as i32).to_le_bytes()),
            8 => out.extend_from_slice(&(d.mantissa as i64).to_le_bytes()),
            16 => out.extend_from_slice(&d.mantissa.to_le_bytes()),
            _ => out.extend_from_slice(&Decimal256::from_i128(d.mantissa, d.scale).raw),
        },
        (T::Decimal { .. }, Value::Decimal256(d)) => out.extend_from_slice(&d.raw),
        (T::Enum8(_), Value::Enum { code, .. }) => out.push(*code as i8 as u8),
        (T::Enum16(_), Value::Enum { code, .. }) => out.extend_from_slice(&code.to_le_bytes()),
        (T::Ipv4, Value::Ipv4(ip)) => out.extend_from_slice(&u32::from(*ip).to_le_bytes()),
        (T::Ipv6, Value::Ipv6(ip)) => out.extend_from_slice(&ip.octets()),
        (T::Nothing, Value::Null) => out.push(0),
        (ty, value) => panic!("cannot encode {value:?} as {ty}"),
    }
}

// ---- Chunking ----

pub fn split_every(body: &[u8], size: usize) -> Vec<Bytes> {
    body.chunks(size.max(1)).map(Bytes::copy_from_slice).collect()
}

/// Split at the given ascending cut points.
pub fn split_at_points(body: &[u8], cuts: &[usize]) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.min(body.len());
        if cut > start {
            chunks.push(Bytes::copy_from_slice(&body[start..cut]));
            start = cut;
        }
    }
    chunks.push(Bytes::copy_from_slice(&body[start..]));
    chunks
}

pub fn source(chunks: Vec<Bytes>) -> ChunkStream {
    chunks_from(chunks)
}

/// Chunks followed by a transport failure.
pub fn failing_source(chunks: Vec<Bytes>, message: &str) -> ChunkStream {
    let error = TransportError::new(message);
    stream::iter(chunks.into_iter().map(Ok))
        .chain(stream::once(async move { Err(error) }))
        .boxed()
}

/// Chunks, then a source that never yields again.
pub fn stalled_source(chunks: Vec<Bytes>) -> ChunkStream {
    stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()).boxed()
}

pub fn tuple_stream(chunks: Vec<Bytes>) -> RowStream<ChunkStream, RowTuple> {
    RowStream::new(source(chunks), &FetchConfig::default())
}

pub fn record_stream(chunks: Vec<Bytes>) -> RowStream<ChunkStream, Record> {
    RowStream::new(source(chunks), &FetchConfig::default())
}

// ---- Transport ----

/// Replays a fixed response body and records every query it receives.
pub struct ScriptedTransport {
    chunks: Vec<Bytes>,
    pub seen: Mutex<Vec<PreparedQuery>>,
}

impl ScriptedTransport {
    pub fn new(chunks: Vec<Bytes>) -> Arc<Self> {
        Arc::new(Self { chunks, seen: Mutex::new(Vec::new()) })
    }
}

impl Transport for ScriptedTransport {
    fn execute<'a>(
        &'a self,
        query: &'a PreparedQuery,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>> {
        self.seen.lock().unwrap().push(query.clone());
        let body = source(self.chunks.clone());
        async move { Ok(body) }.boxed()
    }
}

/// Transport that refuses every query.
pub struct DownTransport;

impl Transport for DownTransport {
    fn execute<'a>(
        &'a self,
        _query: &'a PreparedQuery,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>> {
        async { Err(TransportError::new("connection refused")) }.boxed()
    }
}

// ---- Fixtures ----

/// `id UInt32 [1,2,3]`, `name Nullable(String) ["a", NULL, "c"]`.
pub fn id_name_block() -> Vec<TestColumn> {
    vec![
        col("id", "UInt32", vec![Value::UInt32(1), Value::UInt32(2), Value::UInt32(3)]),
        col(
            "name",
            "Nullable(String)",
            vec![Value::String("a".into()), Value::Null, Value::String("c".into())],
        ),
    ]
}
