//! block/mod.rs
//! Native block decoding: typed column buffers and the decoder driving them.

pub mod types;
pub mod decode;
pub mod lowcard;

pub use types::*;
pub use decode::{BlockDecoder, DecodeLimits};
