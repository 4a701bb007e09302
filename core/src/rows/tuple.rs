//! rows/tuple.rs
//! Positional row view.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::block::Block;
use crate::rows::FromBlockRow;
use crate::value::Value;

/// One row, addressed by column position in block order.
#[derive(Clone)]
pub struct RowTuple {
    block: Arc<Block>,
    row: usize,
}

impl RowTuple {
    pub fn len(&self) -> usize {
        self.block.column_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of this row within its block.
    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.block.value(self.row, index)
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn values(&self) -> Vec<Value> {
        self.iter().collect()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values()
    }
}

impl FromBlockRow for RowTuple {
    fn from_block_row(block: &Arc<Block>, row: usize) -> Self {
        Self { block: Arc::clone(block), row }
    }
}

impl PartialEq for RowTuple {
    fn eq(&self, other: &Self) -> bool {
        self.values() == other.values()
    }
}

impl fmt::Debug for RowTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RowTuple").field(&self.values()).finish()
    }
}

impl Serialize for RowTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.iter() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}
