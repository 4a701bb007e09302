//! framing/varint.rs
//!
//! Base-128 unsigned varints: little-endian groups of 7 bits, high bit set on
//! every byte except the last.

use crate::constants::MAX_VARINT_LEN;
use crate::framing::types::FrameError;

/// Decode a varint from the front of `buf`.
///
/// # Returns
/// - `Ok(Some((value, len)))` when a complete varint is present.
/// - `Ok(None)` when `buf` ends before the terminating byte.
/// - `Err(VarintOverflow)` when the encoding does not fit in a u64.
///
/// `offset` is the stream position of `buf[0]`, used only for error context.
#[inline]
pub fn decode_varint(buf: &[u8], offset: u64) -> Result<Option<(u64, usize)>, FrameError> {
    let mut value = 0u64;

    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let group = u64::from(byte & 0x7F);

        // The tenth byte may only contribute the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && (byte & 0x80 != 0 || group > 1) {
            return Err(FrameError::VarintOverflow { offset });
        }

        value |= group << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    Ok(None)
}
