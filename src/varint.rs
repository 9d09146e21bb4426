//! Variable-length Integer Encoding (Varint)
//!
//! Unsigned LEB128: 7 data bits per byte, high bit set when more bytes follow.
//! Small numbers (0-127) take one byte, a full u64 takes at most ten.
//!
//! The offset index stores `(local_seq, byte_position)` as two varints, so an
//! entry for a young segment is usually 2-4 bytes instead of 16.

use bytes::{Buf, BufMut};

/// Longest encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Encode an unsigned integer as a varint
pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode an unsigned varint
///
/// Returns `None` if the buffer ends mid-varint or the encoding overflows a
/// u64. The buffer is left advanced past whatever was consumed.
pub fn decode_u64(buf: &mut impl Buf) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if !buf.has_remaining() {
            return None;
        }

        let byte = buf.get_u8();
        if shift == 63 && byte > 1 {
            return None;
        }
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Some(value);
        }

        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_single_byte_values() {
        let mut buf = BytesMut::new();
        encode_u64(&mut buf, 0);
        encode_u64(&mut buf, 127);

        assert_eq!(&buf[..], &[0x00, 0x7F]);
    }

    #[test]
    fn test_multi_byte_value() {
        let mut buf = BytesMut::new();
        encode_u64(&mut buf, 300);

        assert_eq!(&buf[..], &[0xAC, 0x02]);

        let mut cursor = buf.as_ref();
        assert_eq!(decode_u64(&mut cursor), Some(300));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_u64_max() {
        let mut buf = BytesMut::new();
        encode_u64(&mut buf, u64::MAX);

        assert_eq!(buf.len(), MAX_VARINT_LEN);

        let mut cursor = buf.as_ref();
        assert_eq!(decode_u64(&mut cursor), Some(u64::MAX));
    }

    #[test]
    fn test_truncated_input() {
        let mut cursor: &[u8] = &[0xAC];
        assert_eq!(decode_u64(&mut cursor), None);

        let mut empty: &[u8] = &[];
        assert_eq!(decode_u64(&mut empty), None);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut cursor: &[u8] = &[0xFF; 11];
        assert_eq!(decode_u64(&mut cursor), None);
    }
}
