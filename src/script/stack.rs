//! Script-number and boolean encodings over stack items.
//!
//! Stack items are plain byte strings; numbers are minimal-length little-endian
//! with the sign carried in the high bit of the final byte, and booleans are
//! "any non-zero byte, ignoring a negative-zero sign bit".

/// Maximum operand length for arithmetic opcodes, in bytes.
pub const NUM_MAX_LEN: usize = 4;

/// Maximum operand length for CHECKLOCKTIMEVERIFY/CHECKSEQUENCEVERIFY, in bytes.
pub const LOCKTIME_NUM_MAX_LEN: usize = 5;

/// Encodes a number as a minimal-length stack item.
///
/// Zero encodes to the empty item; the sign occupies the high bit of the last
/// byte, with a padding byte appended when the magnitude already uses it.
///
/// # Examples
/// ```
/// use scriptvm::script::stack::encode_num;
/// assert_eq!(encode_num(0), Vec::<u8>::new());
/// assert_eq!(encode_num(1), vec![1]);
/// assert_eq!(encode_num(-1), vec![0x81]);
/// assert_eq!(encode_num(127), vec![0x7f]);
/// assert_eq!(encode_num(128), vec![0x80, 0x00]);
/// ```
#[must_use]
pub fn encode_num(val: i64) -> Vec<u8> {
    if val == 0 {
        return vec![];
    }
    let negative = val < 0;
    let mut magnitude = val.unsigned_abs();
    let mut bytes = Vec::with_capacity(9);
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    // The high bit of the last byte is the sign; pad if the magnitude uses it
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    bytes
}

/// Decodes a stack item as a number of at most `max_len` bytes.
///
/// Returns `None` when the item is too long. Non-minimal encodings within the
/// length bound are accepted, matching consensus behavior without the
/// MINIMALDATA rule.
///
/// # Examples
/// ```
/// use scriptvm::script::stack::{decode_num, NUM_MAX_LEN};
/// assert_eq!(decode_num(&[], NUM_MAX_LEN), Some(0));
/// assert_eq!(decode_num(&[0x81], NUM_MAX_LEN), Some(-1));
/// assert_eq!(decode_num(&[1, 0, 0, 0, 0], NUM_MAX_LEN), None);
/// ```
#[must_use]
pub fn decode_num(item: &[u8], max_len: usize) -> Option<i64> {
    if item.len() > max_len {
        return None;
    }
    if item.is_empty() {
        return Some(0);
    }
    let mut n: i64 = 0;
    for (i, &byte) in item.iter().enumerate() {
        n |= (byte as i64) << (8 * i);
    }
    let last = item[item.len() - 1];
    if last & 0x80 != 0 {
        n &= !(0x80i64 << (8 * (item.len() - 1)));
        Some(-n)
    } else {
        Some(n)
    }
}

/// Decodes a stack item as a boolean (non-zero true).
///
/// All-zero items are false, as is "negative zero" (zeros with only the sign
/// bit set in the final byte).
///
/// # Examples
/// ```
/// use scriptvm::script::stack::decode_bool;
/// assert!(decode_bool(&[1]));
/// assert!(!decode_bool(&[]));
/// assert!(!decode_bool(&[0, 0, 0x80]));
/// ```
#[must_use]
pub fn decode_bool(item: &[u8]) -> bool {
    if item.is_empty() {
        return false;
    }
    for &byte in &item[..item.len() - 1] {
        if byte != 0 {
            return true;
        }
    }
    (item[item.len() - 1] & 0x7f) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_bool_tests() {
        assert_eq!(decode_bool(&[1]), true);
        assert_eq!(decode_bool(&[255, 0, 0, 0]), true);
        assert_eq!(decode_bool(&[0, 0, 0, 129]), true);
        assert_eq!(decode_bool(&[0]), false);
        assert_eq!(decode_bool(&[0, 0, 0, 0]), false);
        assert_eq!(decode_bool(&[0, 0, 0, 128]), false);
        assert_eq!(decode_bool(&[]), false);
    }

    #[test]
    fn encode_num_tests() {
        assert_eq!(encode_num(0), Vec::<u8>::new());
        assert_eq!(encode_num(1), vec![1]);
        assert_eq!(encode_num(-1), vec![0x81]);
        assert_eq!(encode_num(16), vec![16]);
        assert_eq!(encode_num(127), vec![0x7f]);
        assert_eq!(encode_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_num(-128), vec![0x80, 0x80]);
        assert_eq!(encode_num(255), vec![0xff, 0x00]);
        assert_eq!(encode_num(256), vec![0x00, 0x01]);
        assert_eq!(encode_num(500_000_000), vec![0x00, 0x65, 0xcd, 0x1d]);
    }

    #[test]
    fn round_trip() {
        for n in [
            0i64,
            1,
            -1,
            1_111,
            -1_111,
            111_111,
            -111_111,
            2_147_483_647,
            -2_147_483_647,
        ] {
            assert_eq!(decode_num(&encode_num(n), NUM_MAX_LEN), Some(n));
        }
    }

    #[test]
    fn decode_num_lengths() {
        // Non-minimal but within bounds is accepted
        assert_eq!(decode_num(&[0, 0, 0, 0], NUM_MAX_LEN), Some(0));
        assert_eq!(decode_num(&[1, 0, 0, 0], NUM_MAX_LEN), Some(1));
        // Too long for arithmetic, fine for locktimes
        let five = [0, 0, 0, 0, 1];
        assert_eq!(decode_num(&five, NUM_MAX_LEN), None);
        assert_eq!(decode_num(&five, LOCKTIME_NUM_MAX_LEN), Some(1 << 32));
    }

    #[test]
    fn locktime_range() {
        // Locktimes above 2^31 need the fifth byte
        let locktime = 4_000_000_000i64;
        let encoded = encode_num(locktime);
        assert_eq!(encoded.len(), 5);
        assert_eq!(decode_num(&encoded, LOCKTIME_NUM_MAX_LEN), Some(locktime));
    }
}
