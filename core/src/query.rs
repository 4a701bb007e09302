//! query.rs
//!
//! Query text, bound parameters and per-query settings.
//!
//! Parameters travel out of band as `param_<name>` pairs and are referenced
//! in SQL as `{name:Type}`. Rendering rules:
//! - top level: `NULL`, booleans as `1`/`0`, numbers and strings verbatim
//! - inside collections: `null`, `true`/`false`, strings single-quoted
//! - dates, timestamps, UUIDs, decimals and IPs as their text form
//!
//! External tables ride along as `<name>_format` / `<name>_structure` pairs plus
//! a JSONCompactEachRow body the transport attaches under `<name>`.

use std::fmt::Write as _;

use crate::types::FetchError;
use crate::value::Value;

/// Output format this crate decodes.
pub const NATIVE_FORMAT: &str = "Native";

/// Format of external table bodies.
pub const EXTERNAL_FORMAT: &str = "JSONCompactEachRow";

/// JSON columns arrive as plain strings instead of the binary object layout.
const JSON_AS_STRING: (&str, &str) = ("output_format_native_write_json_as_string", "1");

/// Client-side rows shipped with a query and readable from SQL as `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTable {
    pub name: String,
    /// `(column, type)` pairs in column order.
    pub structure: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
}

impl ExternalTable {
    /// `col Type, col Type`
    pub fn structure_text(&self) -> String {
        self.structure
            .iter()
            .map(|(column, ty)| format!("{column} {ty}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One compact JSON array per row, newline terminated.
    pub fn body(&self) -> Result<String, FetchError> {
        let mut out = String::new();
        for row in &self.rows {
            let line = serde_json::to_string(row).map_err(|e| {
                FetchError::Validation(format!("external table `{}`: {e}", self.name))
            })?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    fn validate(&self) -> Result<(), FetchError> {
        let valid_name = self.name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(FetchError::Validation(format!("invalid external table name `{}`", self.name)));
        }
        if self.structure.is_empty() {
            return Err(FetchError::Validation(format!("external table `{}` has no columns", self.name)));
        }
        if let Some((i, row)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != self.structure.len()) {
            return Err(FetchError::Validation(format!(
                "external table `{}` row {i} has {} values, expected {}",
                self.name,
                row.len(),
                self.structure.len()
            )));
        }
        Ok(())
    }
}

/// External table payload as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalData {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<(String, Value)>,
    settings: Vec<(String, String)>,
    external: Vec<ExternalTable>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            settings: Vec::new(),
            external: Vec::new(),
        }
    }

    /// Bind `{name:Type}`; rebinding a name replaces its value.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    /// Per-query server setting; overrides a client default of the same name.
    pub fn setting(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        upsert(&mut self.settings, name.into(), value.to_string());
        self
    }

    /// Attach rows the query can read as table `name`; reusing a name replaces it.
    pub fn external_table<N, T, C>(mut self, name: impl Into<String>, structure: Vec<(N, T)>, rows: Vec<Vec<C>>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
        C: Into<Value>,
    {
        let table = ExternalTable {
            name: name.into(),
            structure: structure.into_iter().map(|(c, t)| (c.into(), t.into())).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        };
        match self.external.iter_mut().find(|t| t.name == table.name) {
            Some(slot) => *slot = table,
            None => self.external.push(table),
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    pub fn external_tables(&self) -> &[ExternalTable] {
        &self.external
    }

    /// Resolve against client defaults into what the transport sends.
    pub fn prepare(&self, database: &str, default_settings: &[(String, String)]) -> Result<PreparedQuery, FetchError> {
        let mut url_params = vec![
            ("database".to_string(), database.to_string()),
            ("default_format".to_string(), NATIVE_FORMAT.to_string()),
            (JSON_AS_STRING.0.to_string(), JSON_AS_STRING.1.to_string()),
        ];
        for (name, value) in default_settings.iter().chain(&self.settings) {
            upsert(&mut url_params, name.clone(), value.clone());
        }

        let mut external_data = Vec::with_capacity(self.external.len());
        for table in &self.external {
            table.validate()?;
            url_params.push((format!("{}_format", table.name), EXTERNAL_FORMAT.to_string()));
            url_params.push((format!("{}_structure", table.name), table.structure_text()));
            external_data.push(ExternalData { name: table.name.clone(), body: table.body()? });
        }

        for (name, value) in &self.params {
            url_params.push((format!("param_{name}"), render_param(value)));
        }
        Ok(PreparedQuery { sql: self.sql.clone(), url_params, external_data })
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::new(sql)
    }
}

/// Query as handed to the transport: SQL body, ordered URL parameters and
/// external table payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub sql: String,
    pub url_params: Vec<(String, String)>,
    pub external_data: Vec<ExternalData>,
}

impl PreparedQuery {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.url_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn upsert(pairs: &mut Vec<(String, String)>, name: String, value: String) {
    match pairs.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = value,
        None => pairs.push((name, value)),
    }
}

/// Text form of a top-level parameter value.
pub fn render_param(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Array(_) | Value::Tuple(_) | Value::Map(_) => {
            let mut out = String::new();
            write_nested(&mut out, value);
            out
        }
        other => other.to_string(),
    }
}

fn write_nested(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::UInt8(_)
        | Value::UInt16(_)
        | Value::UInt32(_)
        | Value::UInt64(_)
        | Value::UInt128(_)
        | Value::UInt256(_)
        | Value::Int8(_)
        | Value::Int16(_)
        | Value::Int32(_)
        | Value::Int64(_)
        | Value::Int128(_)
        | Value::Int256(_)
        | Value::Float32(_)
        | Value::Float64(_) => {
            let _ = write!(out, "{value}");
        }
        Value::Array(items) => write_items(out, '[', items, ']'),
        Value::Tuple(items) => write_items(out, '(', items, ')'),
        Value::Map(entries) => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_quoted(out, &k.to_string());
                out.push(':');
                write_nested(out, v);
            }
            out.push('}');
        }
        other => write_quoted(out, &other.to_string()),
    }
}

fn write_items(out: &mut String, open: char, items: &[Value], close: char) {
    out.push(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_nested(out, item);
    }
    out.push(close);
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_override_defaults() {
        let defaults = vec![("max_threads".to_string(), "4".to_string())];
        let prepared = Query::new("SELECT 1")
            .setting("max_threads", 8)
            .prepare("analytics", &defaults)
            .unwrap();

        assert_eq!(prepared.param("database"), Some("analytics"));
        assert_eq!(prepared.param("default_format"), Some("Native"));
        assert_eq!(prepared.param("max_threads"), Some("8"));
        assert_eq!(prepared.param("output_format_native_write_json_as_string"), Some("1"));
    }

    #[test]
    fn json_as_string_can_be_overridden() {
        let prepared = Query::new("SELECT 1")
            .setting("output_format_native_write_json_as_string", 0)
            .prepare("default", &[])
            .unwrap();
        assert_eq!(prepared.param("output_format_native_write_json_as_string"), Some("0"));
        let count = prepared
            .url_params
            .iter()
            .filter(|(n, _)| n == "output_format_native_write_json_as_string")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn rebinding_replaces() {
        let q = Query::new("SELECT {x:UInt8}").bind("x", 1u8).bind("x", 2u8);
        assert_eq!(q.params(), &[("x".to_string(), Value::UInt8(2))]);
    }
}
