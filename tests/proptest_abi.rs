//! Property-based tests for ABI encoding and decoding.
//!
//! These tests verify that decode(encode(x)) == x for random inputs, and
//! that the encodings keep their head/tail shape.

use proptest::prelude::*;

use evm_codec::allocate::Allocations;
use evm_codec::conversion::{to_usize, uint_from_bytes, usize_to_word};
use evm_codec::encode::{encode_abi, encode_mapping_key, encode_tuple_abi};
use evm_codec::format::{Type, UserDefinedTypes, Value, parse_type};
use evm_codec::decode_abi_bytes;

fn roundtrip(ty: &Type, value: Value) -> Result<String, anyhow::Error> {
    let types = UserDefinedTypes::new();
    let allocations = Allocations::new(&types);
    let expected = value.to_string();
    let bytes = encode_tuple_abi(&[value], &allocations.abi).ok_or_else(|| anyhow::anyhow!("not encodable"))?;
    let decoded = decode_abi_bytes(ty, &bytes, &types, &allocations)?;
    assert_eq!(decoded.to_string(), expected);
    Ok(decoded.to_string())
}

proptest! {
    #[test]
    fn roundtrip_uint64(val in any::<u64>()) {
        let text = roundtrip(&Type::uint(64), Value::uint(64, val)).unwrap();
        prop_assert_eq!(text, val.to_string());
    }

    #[test]
    fn roundtrip_int32(val in any::<i32>()) {
        let text = roundtrip(&Type::int(32), Value::int(32, val)).unwrap();
        prop_assert_eq!(text, val.to_string());
    }

    #[test]
    fn roundtrip_bool(val in any::<bool>()) {
        let text = roundtrip(&Type::Bool, Value::bool(val)).unwrap();
        prop_assert_eq!(text, val.to_string());
    }

    #[test]
    fn roundtrip_bytes4(val in any::<[u8; 4]>()) {
        let value = Value::fixed_bytes(val.to_vec());
        roundtrip(&Type::fixed_bytes(4), value).unwrap();
    }

    #[test]
    fn roundtrip_string(s in ".*") {
        let text = roundtrip(&Type::string(), Value::string(s.clone())).unwrap();
        prop_assert_eq!(text, format!("{s:?}"));
    }

    #[test]
    fn roundtrip_tuple_u8_string(a in any::<u8>(), s in "[a-z]{0,80}") {
        let types = UserDefinedTypes::new();
        let ty = parse_type("(uint8,string)", &types).unwrap();
        let value = Value::tuple(vec![Value::uint(8, a), Value::string(s.clone())]);
        let text = roundtrip(&ty, value).unwrap();
        prop_assert_eq!(text, format!("({a}, {s:?})"));
    }
}

proptest! {
    /// The head of a (uint256,string,uint256) tuple is three words and the
    /// string's offset points just past it.
    #[test]
    fn tail_offset_follows_head(a in any::<u64>(), s in "[a-z]{0,100}", b in any::<u64>()) {
        let allocations = Allocations::new(&UserDefinedTypes::new());
        let value = Value::tuple(vec![Value::uint(256, a), Value::string(s.clone()), Value::uint(256, b)]);
        let encoded = encode_abi(&value, &allocations.abi).unwrap();

        prop_assert_eq!(encoded.len() % 32, 0);
        prop_assert_eq!(&encoded[..32], &usize_to_word(a as usize)[..]);
        let offset = to_usize(&uint_from_bytes(&encoded[32..64])).unwrap();
        prop_assert_eq!(offset, 96);
        let length = to_usize(&uint_from_bytes(&encoded[offset..offset + 32])).unwrap();
        prop_assert_eq!(length, s.len());
        prop_assert_eq!(&encoded[offset + 32..offset + 32 + length], s.as_bytes());
        prop_assert_eq!(encoded.len(), 96 + 32 + s.len().div_ceil(32) * 32);
    }

    /// Strings hash as their raw bytes, unlike their ABI encoding.
    #[test]
    fn mapping_key_of_string_is_unpadded(s in "[a-z]{1,64}") {
        let allocations = Allocations::new(&UserDefinedTypes::new());
        let key = Value::string(s.clone());
        prop_assert_eq!(encode_mapping_key(&key).unwrap(), s.as_bytes().to_vec());
        prop_assert_ne!(encode_mapping_key(&key), encode_abi(&key, &allocations.abi));
    }

    /// Value types hash as their ABI word.
    #[test]
    fn mapping_key_of_uint_is_its_word(val in any::<u64>()) {
        let allocations = Allocations::new(&UserDefinedTypes::new());
        let key = Value::uint(256, val);
        prop_assert_eq!(encode_mapping_key(&key), encode_abi(&key, &allocations.abi));
    }
}
