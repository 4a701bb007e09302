use chrono::NaiveDate;

use crate::constants::UNIX_EPOCH_DAYS_FROM_CE;

/// Calendar date for a day count relative to 1970-01-01.
pub fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    let days = i32::try_from(days).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Decimal text of a little-endian 256-bit integer.
pub fn wide_int_to_string(le: &[u8; 32], signed: bool) -> String {
    let negative = signed && le[31] & 0x80 != 0;

    // Four little-endian u64 limbs; two's complement negate when negative.
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(&le[i * 8..i * 8 + 8]);
        *limb = u64::from_le_bytes(word);
    }
    if negative {
        let mut carry = true;
        for limb in limbs.iter_mut() {
            *limb = !*limb;
            if carry {
                let (v, overflow) = limb.overflowing_add(1);
                *limb = v;
                carry = overflow;
            }
        }
    }

    let mut digits = Vec::new();
    while limbs.iter().any(|&l| l != 0) {
        let mut rem: u128 = 0;
        for limb in limbs.iter_mut().rev() {
            let cur = (rem << 64) | u128::from(*limb);
            *limb = (cur / 10) as u64;
            rem = cur % 10;
        }
        digits.push(b'0' + rem as u8);
    }
    if digits.is_empty() {
        digits.push(b'0');
    }
    if negative {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Interpret a little-endian 256-bit two's complement integer as i128, if it fits.
pub fn wide_int_to_i128(le: &[u8; 32]) -> Option<i128> {
    let mut low = [0u8; 16];
    low.copy_from_slice(&le[..16]);
    let value = i128::from_le_bytes(low);

    // Upper half must be pure sign extension of the lower half.
    let fill = if value < 0 { 0xFF } else { 0x00 };
    le[16..].iter().all(|&b| b == fill).then_some(value)
}
