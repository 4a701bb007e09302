//! rows/record.rs
//!
//! Name-addressable row view.
//!
//! Name lookups go through the block's shared name index; a name the block
//! does not carry is a `ColumnNotFound` usage fault that leaves the stream
//! untouched.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::block::Block;
use crate::rows::{FromBlockRow, RowTuple};
use crate::types::FetchError;
use crate::value::Value;

#[derive(Clone)]
pub struct Record {
    block: Arc<Block>,
    row: usize,
}

impl Record {
    pub fn len(&self) -> usize {
        self.block.column_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.block.column_names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.block.column_index(name).is_some()
    }

    /// Value of the column called `name`.
    pub fn get(&self, name: &str) -> Result<Value, FetchError> {
        self.block
            .column_index(name)
            .and_then(|index| self.block.value(self.row, index))
            .ok_or_else(|| FetchError::ColumnNotFound { name: name.to_string() })
    }

    /// Positional access, same as [`RowTuple::get`].
    pub fn get_index(&self, index: usize) -> Option<Value> {
        self.block.value(self.row, index)
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.get_index(i)).collect()
    }

    /// `(name, value)` pairs in column order.
    pub fn entries(&self) -> Vec<(&str, Value)> {
        self.block
            .column_names()
            .enumerate()
            .filter_map(|(i, name)| self.get_index(i).map(|v| (name, v)))
            .collect()
    }

    /// Positional view of the same row.
    pub fn as_tuple(&self) -> RowTuple {
        RowTuple::from_block_row(&self.block, self.row)
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing a Value tree into serde_json cannot fail: all map keys are strings.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl FromBlockRow for Record {
    fn from_block_row(block: &Arc<Block>, row: usize) -> Self {
        Self { block: Arc::clone(block), row }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.entries() == other.entries()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.entries() {
            map.entry(&name, &value);
        }
        map.finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in &entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
