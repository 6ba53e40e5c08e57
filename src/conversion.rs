//! Conversions between EVM words, big integers and hex text.
//!
//! Every helper here is total: out-of-range input yields `None` instead of a
//! panic, mirroring the checked buffer helpers used throughout the codec.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};
use sha3::{Digest, Keccak256};

use crate::evm::WORD_SIZE;

/// Left-pad an unsigned integer to `length` big-endian bytes.
///
/// Returns `None` when the value needs more than `length` bytes.
pub fn uint_to_bytes(value: &BigUint, length: usize) -> Option<Vec<u8>> {
    if value.bits() > (length as u64) * 8 {
        return None;
    }
    let raw = if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    };
    let mut out = vec![0u8; length - raw.len()];
    out.extend_from_slice(&raw);
    Some(out)
}

/// Two's-complement encode a signed integer into `length` big-endian bytes.
pub fn int_to_bytes(value: &BigInt, length: usize) -> Option<Vec<u8>> {
    let raw = value.to_signed_bytes_be();
    if raw.len() > length {
        return None;
    }
    let fill = if value.sign() == Sign::Minus { 0xff } else { 0x00 };
    let mut out = vec![fill; length - raw.len()];
    out.extend_from_slice(&raw);
    Some(out)
}

/// Encode a `usize` (lengths, offsets) as a full word.
pub fn usize_to_word(value: usize) -> Vec<u8> {
    let mut word = vec![0u8; WORD_SIZE - 8];
    word.extend_from_slice(&(value as u64).to_be_bytes());
    word
}

pub fn uint_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Interpret bytes as a two's-complement signed integer; empty input is zero.
pub fn int_from_bytes(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_be(bytes)
}

pub fn to_usize(value: &BigUint) -> Option<usize> {
    value.to_usize()
}

/// `10^places` as a big integer.
pub fn ten_to(places: u32) -> BigInt {
    num_traits::pow(BigInt::from(10u8), places as usize)
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse hex with or without a `0x` prefix.
pub fn from_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = text.strip_prefix("0x").unwrap_or(text);
    if trimmed.len() % 2 == 1 {
        return hex::decode(format!("0{trimmed}"));
    }
    hex::decode(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_padding() {
        let bytes = uint_to_bytes(&BigUint::from(1u8), 32).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[31], 1);
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert!(uint_to_bytes(&BigUint::from(256u32), 1).is_none());
        assert_eq!(uint_to_bytes(&BigUint::zero(), 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_twos_complement() {
        let bytes = int_to_bytes(&BigInt::from(-1), 32).unwrap();
        assert!(bytes.iter().all(|b| *b == 0xff));
        assert_eq!(int_from_bytes(&bytes), BigInt::from(-1));
        let bytes = int_to_bytes(&BigInt::from(-128), 1).unwrap();
        assert_eq!(bytes, vec![0x80]);
        assert!(int_to_bytes(&BigInt::from(128), 1).is_none());
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            to_hex_string(&keccak256(&[])),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
