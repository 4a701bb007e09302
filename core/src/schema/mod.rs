//! schema/mod.rs
//! Column type descriptors: structure, parser and per-stream cache.

pub mod types;
pub mod parse;
pub mod cache;

pub use types::*;
pub use parse::*;
pub use cache::*;
