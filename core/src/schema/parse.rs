//! schema/parse.rs
//!
//! Recursive-descent parser for column type strings.
//!
//! Grammar:
//! ```text
//! type  := IDENT [ '(' arg { ',' arg } ')' ]
//! arg   := INT | STRING [ '=' INT ] | NAME type | type
//! NAME  := IDENT | '`' chars '`'
//! ```
//! Parsing is total: the whole input is consumed or a `TypeParseError` names
//! the position where it stopped.

use crate::constants::decimal::{
    MAX_PRECISION_128, MAX_PRECISION_256, MAX_PRECISION_32, MAX_PRECISION_64,
};
use crate::constants::MAX_DATETIME64_PRECISION;
use crate::schema::types::{EnumVariants, TypeDescriptor, TypeParseError};

/// Parse a type string such as `Array(Nullable(String))` into a descriptor.
pub fn parse_type(input: &str) -> Result<TypeDescriptor, TypeParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { input, tokens, pos: 0 };

    let ty = parser.parse_type()?;
    if let Some((_, at)) = parser.tokens.get(parser.pos) {
        return Err(parser.error(*at, "unexpected trailing input"));
    }
    Ok(ty)
}

// ============================================================
// Lexer
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    /// Backtick-quoted element name.
    QuotedIdent(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Eq,
}

fn tokenize(input: &str) -> Result<Vec<(Token<'_>, usize)>, TypeParseError> {
    let err = |position: usize, reason: &str| TypeParseError {
        input: input.to_string(),
        position,
        reason: reason.to_string(),
    };

    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => tokens.push((Token::LParen, start)),
            b')' => tokens.push((Token::RParen, start)),
            b',' => tokens.push((Token::Comma, start)),
            b'=' => tokens.push((Token::Eq, start)),
            b'\'' => {
                let (text, end) = scan_quoted(input, start, b'\'').map_err(|(at, reason)| err(at, reason))?;
                tokens.push((Token::Str(text), start));
                i = end;
            }
            b'`' => {
                let (text, end) = scan_quoted(input, start, b'`').map_err(|(at, reason)| err(at, reason))?;
                tokens.push((Token::QuotedIdent(text), start));
                i = end;
            }
            b'-' | b'0'..=b'9' => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let literal = &input[start..i];
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| err(start, "invalid integer literal"))?;
                tokens.push((Token::Int(value), start));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((Token::Ident(&input[start..i]), start));
                continue;
            }
            _ => return Err(err(start, "unexpected character")),
        }
        i += 1;
    }

    Ok(tokens)
}

/// Body of a `quote`-delimited literal starting at `start`, with backslash
/// escapes and doubled quotes resolved. Returns the text and the index of the
/// closing quote.
fn scan_quoted(input: &str, start: usize, quote: u8) -> Result<(String, usize), (usize, &'static str)> {
    let bytes = input.as_bytes();
    let mut text = String::new();
    let mut i = start + 1;
    loop {
        let Some(&c) = bytes.get(i) else {
            return Err((start, "unterminated quoted literal"));
        };
        match c {
            b'\\' => {
                let Some(escaped) = input[i + 1..].chars().next() else {
                    return Err((i, "dangling escape"));
                };
                text.push(escaped);
                i += 1 + escaped.len_utf8();
            }
            c if c == quote && bytes.get(i + 1) == Some(&quote) => {
                text.push(char::from(quote));
                i += 2;
            }
            c if c == quote => return Ok((text, i)),
            _ => {
                // Copy the whole UTF-8 sequence starting here.
                let ch = input[i..].chars().next().unwrap_or('\u{FFFD}');
                text.push(ch);
                i += ch.len_utf8();
            }
        }
    }
}

// ============================================================
// Parser
// ============================================================

#[derive(Debug)]
enum Arg {
    Type(TypeDescriptor),
    Named(String, TypeDescriptor),
    Int(i64),
    Str(String),
    EnumPair(String, i64),
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(Token<'a>, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, position: usize, reason: impl Into<String>) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            position,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + ahead).map(|(t, _)| t)
    }

    /// Position of the current token, or end of input.
    fn here(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, at)| *at)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<(Token<'a>, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_type(&mut self) -> Result<TypeDescriptor, TypeParseError> {
        let (name, at) = match self.bump() {
            Some((Token::Ident(name), at)) => (name, at),
            Some((_, at)) => return Err(self.error(at, "expected type name")),
            None => return Err(self.error(self.input.len(), "expected type name")),
        };

        let args = if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.parse_args()?
        } else {
            Vec::new()
        };

        self.build(name, at, args)
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, TypeParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }

        loop {
            args.push(self.parse_arg()?);
            match self.bump() {
                Some((Token::Comma, _)) => continue,
                Some((Token::RParen, _)) => return Ok(args),
                Some((_, at)) => return Err(self.error(at, "expected `,` or `)`")),
                None => return Err(self.error(self.input.len(), "unclosed parameter list")),
            }
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, TypeParseError> {
        match self.peek() {
            Some(Token::Int(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(Arg::Int(v))
            }
            Some(Token::Str(_)) => {
                let Some((Token::Str(text), _)) = self.bump() else {
                    return Err(self.error(self.here(), "expected string literal"));
                };
                if self.peek() == Some(&Token::Eq) {
                    self.pos += 1;
                    match self.bump() {
                        Some((Token::Int(code), _)) => Ok(Arg::EnumPair(text, code)),
                        Some((_, at)) => Err(self.error(at, "expected enum code")),
                        None => Err(self.error(self.input.len(), "expected enum code")),
                    }
                } else {
                    Ok(Arg::Str(text))
                }
            }
            Some(Token::QuotedIdent(_)) => {
                let Some((Token::QuotedIdent(name), _)) = self.bump() else {
                    return Err(self.error(self.here(), "expected element name"));
                };
                Ok(Arg::Named(name, self.parse_type()?))
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::Ident(_)) = self.peek_at(1) {
                    let name = name.to_string();
                    self.pos += 1;
                    Ok(Arg::Named(name, self.parse_type()?))
                } else {
                    Ok(Arg::Type(self.parse_type()?))
                }
            }
            _ => Err(self.error(self.here(), "expected type parameter")),
        }
    }

    fn build(&self, name: &str, at: usize, args: Vec<Arg>) -> Result<TypeDescriptor, TypeParseError> {
        use TypeDescriptor as T;

        let leaf = match name {
            "Bool" | "Boolean" => Some(T::Bool),
            "Int8" => Some(T::Int8),
            "Int16" => Some(T::Int16),
            "Int32" => Some(T::Int32),
            "Int64" => Some(T::Int64),
            "Int128" => Some(T::Int128),
            "Int256" => Some(T::Int256),
            "UInt8" => Some(T::UInt8),
            "UInt16" => Some(T::UInt16),
            "UInt32" => Some(T::UInt32),
            "UInt64" => Some(T::UInt64),
            "UInt128" => Some(T::UInt128),
            "UInt256" => Some(T::UInt256),
            "Float32" => Some(T::Float32),
            "Float64" => Some(T::Float64),
            "String" => Some(T::String),
            "UUID" => Some(T::Uuid),
            "Date" => Some(T::Date),
            "Date32" => Some(T::Date32),
            "IPv4" => Some(T::Ipv4),
            "IPv6" => Some(T::Ipv6),
            "JSON" => Some(T::Json),
            "Nothing" => Some(T::Nothing),
            _ => None,
        };
        if let Some(leaf) = leaf {
            if !args.is_empty() {
                return Err(self.error(at, format!("{name} takes no parameters")));
            }
            return Ok(leaf);
        }

        match name {
            "Nullable" => Ok(T::Nullable(Box::new(self.single_type(name, at, args)?))),
            "Array" => Ok(T::Array(Box::new(self.single_type(name, at, args)?))),
            "LowCardinality" => Ok(T::LowCardinality(Box::new(self.single_type(name, at, args)?))),
            "Map" => {
                let mut types = self.types_only(name, at, args)?;
                if types.len() != 2 {
                    return Err(self.error(at, format!("Map expects 2 parameters, got {}", types.len())));
                }
                let value = types.pop();
                let key = types.pop();
                match (key, value) {
                    (Some(k), Some(v)) => Ok(T::Map(Box::new(k), Box::new(v))),
                    _ => Err(self.error(at, "Map expects 2 parameters")),
                }
            }
            "Tuple" => self.build_tuple(at, args),
            "FixedString" => match args.as_slice() {
                [Arg::Int(n)] if *n > 0 => Ok(T::FixedString(*n as usize)),
                _ => Err(self.error(at, "FixedString expects one positive length")),
            },
            "DateTime" => match args.as_slice() {
                [] => Ok(T::DateTime { timezone: None }),
                [Arg::Str(tz)] => Ok(T::DateTime { timezone: Some(tz.clone()) }),
                _ => Err(self.error(at, "DateTime expects an optional timezone")),
            },
            "DateTime64" => {
                let (precision, timezone) = match args.as_slice() {
                    [Arg::Int(p)] => (*p, None),
                    [Arg::Int(p), Arg::Str(tz)] => (*p, Some(tz.clone())),
                    _ => return Err(self.error(at, "DateTime64 expects precision and optional timezone")),
                };
                if !(0..=i64::from(MAX_DATETIME64_PRECISION)).contains(&precision) {
                    return Err(self.error(at, format!("DateTime64 precision {precision} out of range")));
                }
                Ok(T::DateTime64 { precision: precision as u8, timezone })
            }
            "Decimal" => match args.as_slice() {
                [Arg::Int(p), Arg::Int(s)] => self.decimal(at, *p, *s),
                _ => Err(self.error(at, "Decimal expects precision and scale")),
            },
            "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
                let precision = match name {
                    "Decimal32" => MAX_PRECISION_32,
                    "Decimal64" => MAX_PRECISION_64,
                    "Decimal128" => MAX_PRECISION_128,
                    _ => MAX_PRECISION_256,
                };
                match args.as_slice() {
                    [Arg::Int(s)] => self.decimal(at, i64::from(precision), *s),
                    _ => Err(self.error(at, format!("{name} expects a scale"))),
                }
            }
            "Enum8" => Ok(T::Enum8(self.enum_variants(name, at, args, i64::from(i8::MIN), i64::from(i8::MAX))?)),
            "Enum16" => Ok(T::Enum16(self.enum_variants(name, at, args, i64::from(i16::MIN), i64::from(i16::MAX))?)),
            _ => Err(self.error(at, format!("unknown type `{name}`"))),
        }
    }

    fn single_type(&self, name: &str, at: usize, args: Vec<Arg>) -> Result<TypeDescriptor, TypeParseError> {
        let mut types = self.types_only(name, at, args)?;
        match (types.pop(), types.is_empty()) {
            (Some(inner), true) => Ok(inner),
            _ => Err(self.error(at, format!("{name} expects exactly 1 parameter"))),
        }
    }

    fn types_only(&self, name: &str, at: usize, args: Vec<Arg>) -> Result<Vec<TypeDescriptor>, TypeParseError> {
        args.into_iter()
            .map(|arg| match arg {
                Arg::Type(t) => Ok(t),
                _ => Err(self.error(at, format!("{name} expects type parameters"))),
            })
            .collect()
    }

    fn build_tuple(&self, at: usize, args: Vec<Arg>) -> Result<TypeDescriptor, TypeParseError> {
        if args.is_empty() {
            return Err(self.error(at, "Tuple expects at least 1 element"));
        }

        let named = matches!(args.first(), Some(Arg::Named(..)));
        let mut elements = Vec::with_capacity(args.len());
        let mut names = Vec::new();

        for arg in args {
            match (arg, named) {
                (Arg::Named(n, t), true) => {
                    names.push(n);
                    elements.push(t);
                }
                (Arg::Type(t), false) => elements.push(t),
                _ => return Err(self.error(at, "Tuple elements must be all named or all unnamed")),
            }
        }

        Ok(TypeDescriptor::Tuple {
            elements,
            names: named.then_some(names),
        })
    }

    fn decimal(&self, at: usize, precision: i64, scale: i64) -> Result<TypeDescriptor, TypeParseError> {
        if !(1..=i64::from(MAX_PRECISION_256)).contains(&precision) {
            return Err(self.error(at, format!("decimal precision {precision} out of range")));
        }
        if !(0..=precision).contains(&scale) {
            return Err(self.error(at, format!("decimal scale {scale} out of range")));
        }
        Ok(TypeDescriptor::Decimal {
            precision: precision as u8,
            scale: scale as u8,
        })
    }

    fn enum_variants(
        &self,
        name: &str,
        at: usize,
        args: Vec<Arg>,
        min: i64,
        max: i64,
    ) -> Result<EnumVariants, TypeParseError> {
        if args.is_empty() {
            return Err(self.error(at, format!("{name} expects at least 1 variant")));
        }

        let mut variants = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::EnumPair(label, code) if (min..=max).contains(&code) => {
                    variants.push((label, code as i16));
                }
                Arg::EnumPair(label, code) => {
                    return Err(self.error(at, format!("{name} code {code} for '{label}' out of range")));
                }
                _ => return Err(self.error(at, format!("{name} expects 'label' = code pairs"))),
            }
        }
        Ok(EnumVariants::new(variants))
    }
}
