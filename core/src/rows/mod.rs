//! rows/mod.rs
//! Row views over decoded blocks.
//!
//! Both presentations hold the block behind an `Arc` plus a row index; cells
//! are materialized on access.

use std::sync::Arc;

use crate::block::Block;

pub mod tuple;
pub mod record;

pub use tuple::RowTuple;
pub use record::Record;

/// A row presentation that can be built from one row of a block.
pub trait FromBlockRow: Sized {
    fn from_block_row(block: &Arc<Block>, row: usize) -> Self;
}
