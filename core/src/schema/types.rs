use std::fmt;

use thiserror::Error;

use crate::constants::decimal::{MAX_PRECISION_128, MAX_PRECISION_32, MAX_PRECISION_64};

/// Errors raised while parsing a column type string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot parse type `{input}` at position {position}: {reason}")]
pub struct TypeParseError {
    /// The raw type string as received from the server.
    pub input: String,
    /// Byte offset into `input` where parsing stopped.
    pub position: usize,
    pub reason: String,
}

/// Ordered label/code pairs of an `Enum8`/`Enum16` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariants {
    variants: Vec<(String, i16)>,
}

impl EnumVariants {
    pub fn new(variants: Vec<(String, i16)>) -> Self {
        Self { variants }
    }

    pub fn label(&self, code: i16) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i16)> {
        self.variants.iter().map(|(label, code)| (label.as_str(), *code))
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Structured form of a column type.
///
/// Composite kinds own their children, so every descriptor is an acyclic tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Uuid,
    /// Days since epoch, u16.
    Date,
    /// Days since epoch, i32.
    Date32,
    /// Seconds since epoch, u32.
    DateTime { timezone: Option<String> },
    /// Ticks of 10^-precision seconds since epoch, i64.
    DateTime64 { precision: u8, timezone: Option<String> },
    Decimal { precision: u8, scale: u8 },
    Enum8(EnumVariants),
    Enum16(EnumVariants),
    Ipv4,
    Ipv6,
    /// JSON document carried as a length-prefixed string.
    Json,
    /// Placeholder type of untyped NULL literals.
    Nothing,
    Nullable(Box<TypeDescriptor>),
    Array(Box<TypeDescriptor>),
    Tuple {
        elements: Vec<TypeDescriptor>,
        /// Element names, present only when every element is named.
        names: Option<Vec<String>>,
    },
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    LowCardinality(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Byte width of one value for fixed-width leaves, `None` otherwise.
    pub fn fixed_width(&self) -> Option<usize> {
        use TypeDescriptor::*;
        let width = match self {
            Bool | Int8 | UInt8 | Enum8(_) | Nothing => 1,
            Int16 | UInt16 | Date | Enum16(_) => 2,
            Int32 | UInt32 | Float32 | Date32 | DateTime { .. } | Ipv4 => 4,
            Int64 | UInt64 | Float64 | DateTime64 { .. } => 8,
            Int128 | UInt128 | Uuid | Ipv6 => 16,
            Int256 | UInt256 => 32,
            FixedString(n) => *n,
            Decimal { precision, .. } => decimal_width(*precision),
            _ => return None,
        };
        Some(width)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDescriptor::Nullable(_))
    }

    /// Strip one `Nullable` wrapper, if any.
    pub fn without_nullable(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Nullable(inner) => inner,
            other => other,
        }
    }
}

/// Storage width of a decimal with the given precision.
pub fn decimal_width(precision: u8) -> usize {
    if precision <= MAX_PRECISION_32 {
        4
    } else if precision <= MAX_PRECISION_64 {
        8
    } else if precision <= MAX_PRECISION_128 {
        16
    } else {
        32
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write_delimited(f, s, '\'')
}

fn write_delimited(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    write!(f, "{quote}")?;
    for ch in s.chars() {
        if ch == quote || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    write!(f, "{quote}")
}

/// Tuple element name, backtick-quoted unless it is a plain identifier.
fn write_element_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        f.write_str(name)
    } else {
        write_delimited(f, name, '`')
    }
}

fn write_enum(f: &mut fmt::Formatter<'_>, name: &str, variants: &EnumVariants) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, (label, code)) in variants.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_quoted(f, label)?;
        write!(f, " = {code}")?;
    }
    f.write_str(")")
}

/// Canonical type string; parsing it yields an equal descriptor.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TypeDescriptor::*;
        match self {
            Bool => f.write_str("Bool"),
            Int8 => f.write_str("Int8"),
            Int16 => f.write_str("Int16"),
            Int32 => f.write_str("Int32"),
            Int64 => f.write_str("Int64"),
            Int128 => f.write_str("Int128"),
            Int256 => f.write_str("Int256"),
            UInt8 => f.write_str("UInt8"),
            UInt16 => f.write_str("UInt16"),
            UInt32 => f.write_str("UInt32"),
            UInt64 => f.write_str("UInt64"),
            UInt128 => f.write_str("UInt128"),
            UInt256 => f.write_str("UInt256"),
            Float32 => f.write_str("Float32"),
            Float64 => f.write_str("Float64"),
            String => f.write_str("String"),
            FixedString(n) => write!(f, "FixedString({n})"),
            Uuid => f.write_str("UUID"),
            Date => f.write_str("Date"),
            Date32 => f.write_str("Date32"),
            DateTime { timezone: None } => f.write_str("DateTime"),
            DateTime { timezone: Some(tz) } => {
                f.write_str("DateTime(")?;
                write_quoted(f, tz)?;
                f.write_str(")")
            }
            DateTime64 { precision, timezone } => {
                write!(f, "DateTime64({precision}")?;
                if let Some(tz) = timezone {
                    f.write_str(", ")?;
                    write_quoted(f, tz)?;
                }
                f.write_str(")")
            }
            Decimal { precision, scale } => write!(f, "Decimal({precision}, {scale})"),
            Enum8(v) => write_enum(f, "Enum8", v),
            Enum16(v) => write_enum(f, "Enum16", v),
            Ipv4 => f.write_str("IPv4"),
            Ipv6 => f.write_str("IPv6"),
            Json => f.write_str("JSON"),
            Nothing => f.write_str("Nothing"),
            Nullable(inner) => write!(f, "Nullable({inner})"),
            Array(inner) => write!(f, "Array({inner})"),
            Tuple { elements, names } => {
                f.write_str("Tuple(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(name) = names.as_ref().and_then(|n| n.get(i)) {
                        write_element_name(f, name)?;
                        f.write_str(" ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(")")
            }
            Map(key, value) => write!(f, "Map({key}, {value})"),
            LowCardinality(inner) => write!(f, "LowCardinality({inner})"),
        }
    }
}
