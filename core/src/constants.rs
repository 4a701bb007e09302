//! constants.rs
//! Wire constants, decode limits and configuration defaults.

/// Maximum encoded length of a u64 varint (7 payload bits per byte).
pub const MAX_VARINT_LEN: usize = 10;

/// Defaults when Option<T> is None
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024; // 64 KiB
pub const DEFAULT_MAX_STRING_LEN: usize = 1 << 30; // 1 GiB
pub const DEFAULT_MAX_BLOCK_ROWS: usize = 1 << 26;
pub const DEFAULT_MAX_BLOCK_COLUMNS: usize = 1 << 16;

/// Sanity bounds accepted by `FetchConfig::validate`.
pub const MIN_BUFFER_CAPACITY: usize = 1024;
pub const MAX_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// Epoch (1970-01-01) expressed in days from the common era, for chrono conversions.
pub const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Largest DateTime64 precision the server emits.
pub const MAX_DATETIME64_PRECISION: u8 = 9;

/// Decimal precision ceilings per storage width.
pub mod decimal {
    pub const MAX_PRECISION_32: u8 = 9;
    pub const MAX_PRECISION_64: u8 = 18;
    pub const MAX_PRECISION_128: u8 = 38;
    pub const MAX_PRECISION_256: u8 = 76;
}

/// LowCardinality column layout markers.
pub mod low_cardinality {
    /// Only key serialization version understood by this decoder.
    pub const SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS: u64 = 1;

    /// Low byte of the serialization type selects the index width.
    pub const INDEX_TYPE_MASK: u64 = 0xFF;
    pub const NEED_GLOBAL_DICTIONARY: u64 = 1 << 8;
    pub const HAS_ADDITIONAL_KEYS: u64 = 1 << 9;

    pub const INDEX_U8: u64 = 0;
    pub const INDEX_U16: u64 = 1;
    pub const INDEX_U32: u64 = 2;
    pub const INDEX_U64: u64 = 3;
}
