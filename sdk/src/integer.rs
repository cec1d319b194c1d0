//! Canonical byte codec for signed arbitrary-precision integers.
//!
//! On-chain quantities are carried as a sign byte followed by the big-endian
//! magnitude. The layout is fixed by the chain and must match byte for byte:
//!
//! ```text
//! [0x02 | 0x03] [magnitude bytes ...]
//! ```
//!
//! `0x02` marks zero or positive values and `0x03` negative ones. Zero is the
//! single byte `[0x02]` with no magnitude.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::error::SdkError;

/// Sign byte for zero and positive integers.
pub const SIGN_NON_NEGATIVE: u8 = 0x02;

/// Sign byte for negative integers.
pub const SIGN_NEGATIVE: u8 = 0x03;

/// Encodes a signed integer into its canonical byte form.
#[must_use]
pub fn bigint_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return vec![SIGN_NON_NEGATIVE];
    }

    let (sign, magnitude) = value.to_bytes_be();
    let mut bytes = Vec::with_capacity(magnitude.len() + 1);
    bytes.push(if sign == Sign::Minus {
        SIGN_NEGATIVE
    } else {
        SIGN_NON_NEGATIVE
    });
    bytes.extend_from_slice(&magnitude);
    bytes
}

/// Decodes the canonical byte form back into a signed integer.
///
/// Sequences of length zero or one decode to zero. Otherwise bit 0 of the
/// first byte selects the sign and the remaining bytes are the magnitude.
#[must_use]
pub fn bytes_to_bigint(bytes: &[u8]) -> BigInt {
    match bytes.split_first() {
        Some((marker, magnitude)) if !magnitude.is_empty() => {
            let sign = if marker & 1 == 1 {
                Sign::Minus
            } else {
                Sign::Plus
            };
            BigInt::from_bytes_be(sign, magnitude)
        }
        _ => BigInt::zero(),
    }
}

/// Encodes bytes as standard padded base64.
#[must_use]
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard padded base64 into bytes.
///
/// # Errors
///
/// Returns [`SdkError::InvalidBase64`] if the input is not valid base64.
pub fn base64_to_bytes(encoded: &str) -> Result<Vec<u8>, SdkError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| SdkError::InvalidBase64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(s: &str) -> BigInt {
        s.parse().expect("valid integer literal")
    }

    #[test]
    fn test_encode_fixed_vectors() {
        assert_eq!(bigint_to_bytes(&BigInt::from(0)), vec![0x02]);
        assert_eq!(bigint_to_bytes(&BigInt::from(1)), vec![0x02, 0x01]);
        assert_eq!(bigint_to_bytes(&BigInt::from(-1)), vec![0x03, 0x01]);
        assert_eq!(bigint_to_bytes(&BigInt::from(255)), vec![0x02, 0xFF]);
        assert_eq!(bigint_to_bytes(&BigInt::from(-255)), vec![0x03, 0xFF]);
    }

    #[test]
    fn test_encode_pads_odd_hex_length() {
        // 0x100 has three hex digits and gains a leading zero nibble
        assert_eq!(bigint_to_bytes(&BigInt::from(256)), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_beyond_u64() {
        assert_eq!(
            bigint_to_bytes(&big("18446744073709551616")),
            vec![0x02, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            bigint_to_bytes(&big("10000000000000000000000000000")),
            vec![0x02, 32, 79, 206, 94, 62, 37, 2, 97, 16, 0, 0, 0]
        );
        assert_eq!(
            bigint_to_bytes(&big("-20000000000000000000000000000")),
            vec![0x03, 64, 159, 156, 188, 124, 74, 4, 194, 32, 0, 0, 0]
        );
    }

    #[test]
    fn test_round_trip() {
        let values = [
            "0",
            "1",
            "-1",
            "255",
            "-255",
            "256",
            "-65536",
            "9223372036854775807",
            "-9223372036854775808",
            "18446744073709551616",
            "10000000000000000000000000000",
            "-20000000000000000000000000000",
        ];
        for value in values {
            let n = big(value);
            assert_eq!(bytes_to_bigint(&bigint_to_bytes(&n)), n, "value {value}");
        }
    }

    #[test]
    fn test_decode_short_sequences_are_zero() {
        assert_eq!(bytes_to_bigint(&[]), BigInt::zero());
        assert_eq!(bytes_to_bigint(&[0x02]), BigInt::zero());
        assert_eq!(bytes_to_bigint(&[0x03]), BigInt::zero());
    }

    #[test]
    fn test_decode_uses_low_bit_for_sign() {
        assert_eq!(bytes_to_bigint(&[0x03, 0x01, 0x00]), BigInt::from(-256));
        assert_eq!(bytes_to_bigint(&[0x02, 0x01, 0x00]), BigInt::from(256));
    }

    #[test]
    fn test_base64_fixed_strings() {
        assert_eq!(bytes_to_base64(&[0x02]), "Ag==");
        assert_eq!(bytes_to_base64(&[0x03, 0x01]), "AwE=");
        assert_eq!(bytes_to_base64(&[0x02, 0xFF]), "Av8=");
        assert_eq!(
            base64_to_bytes("AiBPzl4+JQJhEAAAAA==").expect("valid base64"),
            vec![0x02, 32, 79, 206, 94, 62, 37, 2, 97, 16, 0, 0, 0]
        );
        assert_eq!(
            base64_to_bytes("A0CfnLx8SgTCIAAAAA==").expect("valid base64"),
            vec![0x03, 64, 159, 156, 188, 124, 74, 4, 194, 32, 0, 0, 0]
        );
    }

    #[test]
    fn test_base64_round_trip() {
        let samples: [&[u8]; 5] = [&[], &[0x02], &[0x03, 0xFF], &[0, 1, 2, 3, 4], &[0xFF; 33]];
        for bytes in samples {
            let encoded = bytes_to_base64(bytes);
            assert_eq!(base64_to_bytes(&encoded).expect("round trip"), bytes);
        }
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(matches!(
            base64_to_bytes("not base64!"),
            Err(SdkError::InvalidBase64(_))
        ));
    }
}
