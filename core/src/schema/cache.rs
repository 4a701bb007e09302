//! schema/cache.rs
//!
//! Per-stream memo of parsed type strings.
//!
//! The same type string recurs in every block of a result set, so lookups are
//! keyed by the exact string and hand out shared descriptors. The cache lives
//! and dies with one stream; nothing is shared across queries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::parse::parse_type;
use crate::schema::types::{TypeDescriptor, TypeParseError};

#[derive(Debug, Default)]
pub struct TypeCache {
    entries: HashMap<String, Arc<TypeDescriptor>>,
    hits: u64,
    misses: u64,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the descriptor for `type_name`, parsing it on first sight.
    /// Failed parses are not cached.
    pub fn resolve(&mut self, type_name: &str) -> Result<Arc<TypeDescriptor>, TypeParseError> {
        if let Some(descriptor) = self.entries.get(type_name) {
            self.hits += 1;
            return Ok(Arc::clone(descriptor));
        }

        self.misses += 1;
        let descriptor = Arc::new(parse_type(type_name)?);
        self.entries.insert(type_name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
