//! ASCII-hex helpers for the bus payloads.

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Value of one hex digit, either case.
pub fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

pub fn decode_byte(hi: u8, lo: u8) -> Option<u8> {
    Some(nibble(hi)? << 4 | nibble(lo)?)
}

/// Upper-case digit pair for `byte`.
pub fn encode_byte(byte: u8) -> [u8; 2] {
    [DIGITS[usize::from(byte >> 4)], DIGITS[usize::from(byte & 0x0F)]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_both_cases() {
        assert_eq!(decode_byte(b'a', b'F'), Some(0xAF));
        assert_eq!(decode_byte(b'0', b'7'), Some(0x07));
        assert_eq!(decode_byte(b'G', b'0'), None);
    }

    #[test]
    fn encodes_upper_case() {
        assert_eq!(encode_byte(0x3C), *b"3C");
        assert_eq!(encode_byte(0xF0), *b"F0");
    }
}
