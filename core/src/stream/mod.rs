//! stream/mod.rs
//! Streaming fetch pipeline: configuration, lifecycle, cancellation and the row stream.

pub mod cancel;
pub mod core;
pub mod state;
pub mod pipeline;

pub use cancel::*;
pub use self::core::*;
pub use state::*;
pub use pipeline::*;
