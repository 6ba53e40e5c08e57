//! Mapping-key encoding.
//!
//! Value types encode exactly as in the ABI. Dynamic bytes and strings are
//! hashed as their raw content, with no length word and no padding.

use num_bigint::BigUint;

use super::abi::encode_basic;
use crate::conversion::{to_hex_string, uint_to_bytes};
use crate::evm::WORD_SIZE;
use crate::format::{BytesKind, Payload, StringValue, Type, Value};
use crate::pointer::{Slot, slot_address};

/// Encode a mapping key for hashing into a slot address.
pub fn encode_mapping_key(key: &Value) -> Option<Vec<u8>> {
    match (&key.ty, key.payload()?) {
        (
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            },
            Payload::Bytes(bytes),
        ) => Some(bytes.clone()),
        (Type::String { .. }, Payload::String(text)) => Some(text.as_bytes().to_vec()),
        _ => encode_basic(key),
    }
}

/// A `(type, value)` rendering of a mapping key for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub ty: String,
    pub value: String,
}

/// Describe a key the way a hashing tool would be given it.
///
/// Booleans print as type `uint` since the hash preimage has no boolean
/// primitive. Static bytes and fixed-point keys print as their padded word.
pub fn key_info_for_printing(key: &Value) -> Option<KeyInfo> {
    let info = |ty: &str, value: String| {
        Some(KeyInfo {
            ty: ty.to_string(),
            value,
        })
    };
    match key.payload()? {
        Payload::Uint(value) => info("uint", value.to_string()),
        Payload::Int(value) => info("int", value.to_string()),
        Payload::Bool(value) => info("uint", if *value { "1" } else { "0" }.to_string()),
        Payload::Enum { index, .. } => info("uint", index.to_string()),
        Payload::Address(address) => info("address", address.to_checksum()),
        Payload::Contract(contract) => info("address", contract.address().to_checksum()),
        Payload::String(StringValue::Valid(text)) => info("string", text.clone()),
        Payload::String(StringValue::Malformed(bytes)) => info("bytes", to_hex_string(bytes)),
        Payload::Bytes(bytes) => match &key.ty {
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            } => info("bytes", to_hex_string(bytes)),
            _ => info("bytes32", to_hex_string(&encode_basic(key)?)),
        },
        Payload::Fixed(_) => info("bytes32", to_hex_string(&encode_basic(key)?)),
        _ => None,
    }
}

/// Address of `mapping[key]` for a mapping stored at `mapping_slot_address`.
pub fn mapping_slot(key: &Value, mapping_slot_address: &BigUint) -> Option<[u8; WORD_SIZE]> {
    let slot = Slot::mapping(&Slot::new(mapping_slot_address.clone()), key.clone());
    let address = uint_to_bytes(&slot_address(&slot)?, WORD_SIZE)?;
    address.try_into().ok()
}
