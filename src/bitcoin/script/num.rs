//! Script number encoding.
//!
//! Numbers on the script stack are sign-magnitude, little-endian, minimally encoded: the
//! byte order of OpenSSL's MPI format reversed. Zero is the empty byte string and the
//! high bit of the last byte carries the sign.

use crate::{Error, Result};
use bytes::Bytes;

/// Decode a stack item as a number.
///
/// `max_size` bounds the operand length; arithmetic opcodes use 4, the locktime opcodes 5.
pub fn decode_script_num(bytes: &[u8], max_size: usize) -> Result<i64> {
    if bytes.len() > max_size {
        return Err(Error::ScriptNumberTooLarge);
    }
    if bytes.is_empty() {
        return Ok(0);
    }

    let mut result = 0i64;
    for (i, &byte) in bytes.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }

    // the high bit of the most significant byte is the sign
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        result &= !(0x80i64 << (8 * (bytes.len() - 1)));
        result = -result;
    }
    Ok(result)
}

/// Encode a number as a minimal stack item.
pub fn encode_script_num(value: i64) -> Bytes {
    if value == 0 {
        return Bytes::new();
    }

    let mut bytes = Vec::new();
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    // if the high bit of the top byte is taken, the sign needs its own byte
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    Bytes::from(bytes)
}

/// Cast a stack item to a boolean: true iff any byte is non-zero, except that a trailing
/// 0x80 alone (negative zero) is false.
pub fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, &byte) in bytes.iter().enumerate() {
        if byte != 0 {
            return !(i == bytes.len() - 1 && byte == 0x80);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for v in [
            0i64, 1, -1, 127, -127, 128, -128, 255, -255, 256, 32767, -32767, 8388608,
            2147483647, -2147483647,
        ] {
            let encoded = encode_script_num(v);
            assert_eq!(decode_script_num(&encoded, 4).unwrap(), v, "value {}", v);
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_script_num(0), Bytes::new());
        assert_eq!(encode_script_num(1), Bytes::from_static(&[0x01]));
        assert_eq!(encode_script_num(-1), Bytes::from_static(&[0x81]));
        assert_eq!(encode_script_num(127), Bytes::from_static(&[0x7f]));
        // 128 needs a second byte because the high bit is the sign
        assert_eq!(encode_script_num(128), Bytes::from_static(&[0x80, 0x00]));
        assert_eq!(encode_script_num(-128), Bytes::from_static(&[0x80, 0x80]));
        assert_eq!(encode_script_num(256), Bytes::from_static(&[0x00, 0x01]));
    }

    #[test]
    fn oversize_operand_rejected() {
        assert!(decode_script_num(&[1, 2, 3, 4, 5], 4).is_err());
        assert!(decode_script_num(&[1, 2, 3, 4, 5], 5).is_ok());
    }

    #[test]
    fn non_minimal_decodes() {
        // decoding is permissive about padding
        assert_eq!(decode_script_num(&[0x01, 0x00], 4).unwrap(), 1);
        assert_eq!(decode_script_num(&[0x01, 0x80], 4).unwrap(), -1);
    }

    #[test]
    fn boolean_cast() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0]));
        assert!(!cast_to_bool(&[0, 0]));
        assert!(!cast_to_bool(&[0x80])); // negative zero
        assert!(!cast_to_bool(&[0, 0x80])); // longer negative zero
        assert!(cast_to_bool(&[1]));
        assert!(cast_to_bool(&[0x81])); // negative one
        assert!(cast_to_bool(&[0, 1]));
        assert!(cast_to_bool(&[0x80, 0])); // 0x80 not in final position
    }
}
