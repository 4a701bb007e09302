//! value.rs
//!
//! Decoded cell values.
//!
//! Design notes:
//! - One tagged variant per leaf/composite kind, so callers pattern-match
//!   instead of inspecting types at runtime.
//! - 256-bit integers and `Decimal(39..=76)` mantissas stay as raw little-endian
//!   bytes; text rendering is exact.
//! - `Serialize` renders dates, timestamps, UUIDs, decimals and IPs as strings,
//!   matching the JSON shape the server itself emits for them.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::utils::{wide_int_to_i128, wide_int_to_string};

/// Fixed-point decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub mantissa: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(i32::from(self.scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        write_scaled(f, self.mantissa < 0, &digits, self.scale)
    }
}

/// `Decimal(39..=76, S)` value: 256-bit two's complement mantissa, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal256 {
    pub raw: [u8; 32],
    pub scale: u8,
}

impl Decimal256 {
    pub fn new(raw: [u8; 32], scale: u8) -> Self {
        Self { raw, scale }
    }

    /// Sign-extend a 128-bit mantissa.
    pub fn from_i128(mantissa: i128, scale: u8) -> Self {
        let mut raw = if mantissa < 0 { [0xFF; 32] } else { [0; 32] };
        raw[..16].copy_from_slice(&mantissa.to_le_bytes());
        Self { raw, scale }
    }

    /// Narrow to a 128-bit decimal when the mantissa fits.
    pub fn to_decimal(&self) -> Option<Decimal> {
        wide_int_to_i128(&self.raw).map(|m| Decimal::new(m, self.scale))
    }

    pub fn to_f64(&self) -> f64 {
        let mantissa: f64 = wide_int_to_string(&self.raw, true).parse().unwrap_or(f64::NAN);
        mantissa / 10f64.powi(i32::from(self.scale))
    }
}

impl fmt::Display for Decimal256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = wide_int_to_string(&self.raw, true);
        match text.strip_prefix('-') {
            Some(digits) => write_scaled(f, true, digits, self.scale),
            None => write_scaled(f, false, &text, self.scale),
        }
    }
}

/// Place the decimal point `scale` digits from the right of `digits`.
fn write_scaled(f: &mut fmt::Formatter<'_>, negative: bool, digits: &str, scale: u8) -> fmt::Result {
    let sign = if negative { "-" } else { "" };
    let scale = usize::from(scale);
    if scale == 0 {
        return write!(f, "{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    write!(f, "{sign}{int_part}.{frac_part}")
}

/// Point in time as stored on the wire: ticks of `10^-precision` seconds
/// since the Unix epoch, plus the column's declared time zone label.
///
/// The label is carried as metadata; `to_utc` does not apply it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub ticks: i64,
    pub precision: u8,
    pub timezone: Option<Arc<str>>,
}

impl Timestamp {
    pub fn from_seconds(seconds: i64, timezone: Option<Arc<str>>) -> Self {
        Self { ticks: seconds, precision: 0, timezone }
    }

    fn ticks_per_second(&self) -> i64 {
        10i64.pow(u32::from(self.precision))
    }

    pub fn seconds(&self) -> i64 {
        self.ticks.div_euclid(self.ticks_per_second())
    }

    pub fn subsec_nanos(&self) -> u32 {
        let frac = self.ticks.rem_euclid(self.ticks_per_second());
        (frac * 10i64.pow(9 - u32::from(self.precision.min(9)))) as u32
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds(), self.subsec_nanos())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(at) = self.to_utc() else {
            return write!(f, "{} ticks", self.ticks);
        };
        write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S"))?;
        if self.precision > 0 {
            let frac = self.ticks.rem_euclid(self.ticks_per_second());
            write!(f, ".{:0width$}", frac, width = usize::from(self.precision))?;
        }
        Ok(())
    }
}

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    /// Little-endian bytes.
    UInt256([u8; 32]),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    /// Little-endian two's complement bytes.
    Int256([u8; 32]),
    Float32(f32),
    Float64(f64),
    String(String),
    /// String payload that is not valid UTF-8.
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(Timestamp),
    Decimal(Decimal),
    Decimal256(Decimal256),
    Enum { label: String, code: i16 },
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    /// Key/value pairs in wire order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer that fits in i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::Int128(v) => i64::try_from(*v).ok(),
            Value::UInt8(v) => Some(i64::from(*v)),
            Value::UInt16(v) => Some(i64::from(*v)),
            Value::UInt32(v) => Some(i64::from(*v)),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::UInt128(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Any non-negative integer that fits in u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt8(v) => Some(u64::from(*v)),
            Value::UInt16(v) => Some(u64::from(*v)),
            Value::UInt32(v) => Some(u64::from(*v)),
            Value::UInt64(v) => Some(*v),
            Value::UInt128(v) => u64::try_from(*v).ok(),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::Decimal(d) => Some(d.to_f64()),
            Value::Decimal256(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            Value::Enum { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::DateTime(t) => Some(t),
            _ => None,
        }
    }

    /// Decimal of any width whose mantissa fits in 128 bits.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Decimal256(d) => d.to_decimal(),
            _ => None,
        }
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Plain text rendering (no quoting); used for map keys and diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::UInt128(v) => write!(f, "{v}"),
            Value::UInt256(v) => f.write_str(&wide_int_to_string(v, false)),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Int128(v) => write!(f, "{v}"),
            Value::Int256(v) => f.write_str(&wide_int_to_string(v, true)),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(t) => write!(f, "{t}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Decimal256(d) => write!(f, "{d}"),
            Value::Enum { label, .. } => f.write_str(label),
            Value::Ipv4(ip) => write!(f, "{ip}"),
            Value::Ipv6(ip) => write!(f, "{ip}"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Array(items) => write_list(f, "[", items, "]"),
            Value::Tuple(items) => write_list(f, "(", items, ")"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::UInt8(v) => serializer.serialize_u8(*v),
            Value::UInt16(v) => serializer.serialize_u16(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            Value::UInt64(v) => serializer.serialize_u64(*v),
            // Wide integers outside the 64-bit range travel as text.
            Value::UInt128(v) => match u64::try_from(*v) {
                Ok(n) => serializer.serialize_u64(n),
                Err(_) => serializer.collect_str(v),
            },
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Int128(v) => match i64::try_from(*v) {
                Ok(n) => serializer.serialize_i64(n),
                Err(_) => serializer.collect_str(v),
            },
            Value::Float32(v) => serializer.serialize_f32(*v),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Json(v) => v.serialize(serializer),
            Value::Array(items) | Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
            // Everything else travels as its text form.
            other => serializer.collect_str(other),
        }
    }
}

// ---- Conversions (parameter binding) ----

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_from_scalar! {
    bool => Bool,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    NaiveDate => Date,
    Decimal => Decimal,
    Decimal256 => Decimal256,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
    Uuid => Uuid,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::DateTime(Timestamp::from_seconds(v.and_utc().timestamp(), None))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}
