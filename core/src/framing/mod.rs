//! framing/mod.rs
//! Byte-level layer: chunk buffering, exact reads and varints.

pub mod types;
pub mod varint;
pub mod reader;

pub use types::*;
pub use varint::*;
pub use reader::*;
