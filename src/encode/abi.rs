//! ABI encoding.
//!
//! Scalars take one word. Dynamic bytes and strings are a length word
//! followed by the data padded to a word boundary. Arrays, structs and
//! tuples use the head/tail layout: static elements sit in the head, dynamic
//! elements leave an offset in the head (relative to the start of the
//! enclosing tuple) and append their encoding to the tail.

use num_bigint::{BigInt, BigUint};

use super::EncodeError;
use crate::allocate::{AbiAllocations, abi_size_info};
use crate::conversion::{
    from_hex, int_to_bytes, keccak256, to_hex_string, uint_to_bytes, usize_to_word,
};
use crate::evm::{ADDRESS_SIZE, WORD_SIZE};
use crate::format::{
    ArrayKind, BytesKind, Content, FunctionValue, Payload, Type, Value, ValueError, Visibility,
};

/// ABI-encode a value, or `None` if it is not encodable.
pub fn encode_abi(value: &Value, allocations: &AbiAllocations) -> Option<Vec<u8>> {
    try_encode_abi(value, allocations).ok()
}

/// ABI-encode a value, reporting why it is not encodable.
pub fn try_encode_abi(value: &Value, allocations: &AbiAllocations) -> Result<Vec<u8>, EncodeError> {
    let payload = match &value.content {
        // the hash is the best available stand-in for an indexed reference
        Content::Error(ValueError::IndexedReferenceType { raw, .. }) => {
            return from_hex(raw).map_err(|err| EncodeError::ErrorValue(err.to_string()));
        }
        Content::Error(error) => return Err(EncodeError::ErrorValue(error.to_string())),
        Content::Value(payload) => payload,
    };
    match &value.ty {
        Type::Mapping { .. } => Err(EncodeError::Mapping),
        Type::Magic { .. } => Err(EncodeError::Magic),
        Type::Function(function) if function.visibility == Visibility::Internal => {
            Err(EncodeError::InternalFunction)
        }
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => match payload {
            Payload::Bytes(bytes) => Ok(pad_and_prepend_length(bytes)),
            Payload::String(text) => Ok(pad_and_prepend_length(text.as_bytes())),
            other => Err(mismatch(&value.ty, other)),
        },
        Type::Array { kind, .. } => match payload {
            Payload::Array {
                reference: Some(_), ..
            } => Err(EncodeError::Circular),
            Payload::Array { elements, .. } => {
                let encoded = tuple_abi(elements.iter(), allocations)?;
                Ok(match kind {
                    ArrayKind::Dynamic => {
                        let mut out = usize_to_word(elements.len());
                        out.extend(encoded);
                        out
                    }
                    ArrayKind::Static { .. } => encoded,
                })
            }
            other => Err(mismatch(&value.ty, other)),
        },
        Type::Struct { .. } | Type::Tuple { .. } => match payload {
            Payload::Struct {
                reference: Some(_), ..
            } => Err(EncodeError::Circular),
            Payload::Struct { members, .. } | Payload::Tuple(members) => {
                tuple_abi(members.iter().map(|member| &member.value), allocations)
            }
            other => Err(mismatch(&value.ty, other)),
        },
        _ => basic(&value.ty, payload),
    }
}

/// Encode a fixed-width value as a single word.
pub fn encode_basic(value: &Value) -> Option<Vec<u8>> {
    match &value.content {
        Content::Value(payload) => basic(&value.ty, payload).ok(),
        Content::Error(_) => None,
    }
}

/// Head/tail encoding of a sequence of values.
pub fn encode_tuple_abi(values: &[Value], allocations: &AbiAllocations) -> Option<Vec<u8>> {
    tuple_abi(values.iter(), allocations).ok()
}

/// A length word followed by `bytes`, zero-padded to a word boundary.
pub fn pad_and_prepend_length(bytes: &[u8]) -> Vec<u8> {
    let padded_length = bytes.len().div_ceil(WORD_SIZE) * WORD_SIZE;
    let mut out = usize_to_word(bytes.len());
    out.extend_from_slice(bytes);
    out.resize(WORD_SIZE + padded_length, 0);
    out
}

/// The event topic for an indexed value: the word itself for value types,
/// the hash of the content for dynamic bytes and strings, and the recorded
/// hash for reference values that were only seen indexed.
pub fn encode_topic(value: &Value, allocations: &AbiAllocations) -> Option<Vec<u8>> {
    if let Content::Error(ValueError::IndexedReferenceType { raw, .. }) = &value.content {
        return from_hex(raw).ok();
    }
    match (&value.ty, value.payload()?) {
        (
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            },
            Payload::Bytes(bytes),
        ) => Some(keccak256(bytes).to_vec()),
        (Type::String { .. }, Payload::String(text)) => Some(keccak256(text.as_bytes()).to_vec()),
        (ty, _) if ty.is_reference() || matches!(ty, Type::Tuple { .. }) => None,
        _ => encode_abi(value, allocations),
    }
}

fn tuple_abi<'v>(
    values: impl Iterator<Item = &'v Value>,
    allocations: &AbiAllocations,
) -> Result<Vec<u8>, EncodeError> {
    let mut elements = Vec::new();
    for value in values {
        let encoding = try_encode_abi(value, allocations)?;
        let info = abi_size_info(&value.ty, allocations)
            .ok_or_else(|| EncodeError::UnknownUserDefinedType(value.ty.type_string()))?;
        elements.push((info.dynamic, encoding));
    }
    let head_size: usize = elements
        .iter()
        .map(|(dynamic, encoding)| if *dynamic { WORD_SIZE } else { encoding.len() })
        .sum();
    let mut heads = Vec::with_capacity(head_size);
    let mut tails = Vec::new();
    let mut offset_of_next_tail = head_size;
    for (dynamic, encoding) in elements {
        if dynamic {
            heads.extend(usize_to_word(offset_of_next_tail));
            offset_of_next_tail += encoding.len();
            tails.extend(encoding);
        } else {
            heads.extend(encoding);
        }
    }
    heads.extend(tails);
    Ok(heads)
}

fn basic(ty: &Type, payload: &Payload) -> Result<Vec<u8>, EncodeError> {
    match (ty, payload) {
        (Type::Uint { bits }, Payload::Uint(value)) => unsigned_word(value, *bits, ty),
        (Type::Int { bits }, Payload::Int(value)) => signed_word(value, *bits, ty),
        (Type::Enum { .. }, Payload::Enum { index, .. }) => {
            unsigned_word(&BigUint::from(*index), 256, ty)
        }
        (Type::Enum { .. }, Payload::Uint(value)) => unsigned_word(value, 256, ty),
        (Type::Bool, Payload::Bool(value)) => unsigned_word(&BigUint::from(u8::from(*value)), 8, ty),
        (
            Type::Bytes {
                kind: BytesKind::Static { length },
                ..
            },
            Payload::Bytes(bytes),
        ) => {
            if bytes.len() > usize::from(*length) {
                return Err(overflow(&to_hex_string(bytes), ty));
            }
            let mut out = bytes.clone();
            out.resize(WORD_SIZE, 0);
            Ok(out)
        }
        (Type::Address { .. } | Type::Contract { .. }, Payload::Address(address)) => {
            Ok(left_pad(address.as_bytes()))
        }
        (Type::Address { .. } | Type::Contract { .. }, Payload::Contract(contract)) => {
            Ok(left_pad(contract.address().as_bytes()))
        }
        (Type::Fixed { bits, places }, Payload::Fixed(decimal)) => {
            let scaled = decimal.rescale(u32::from(*places)).ok_or_else(|| EncodeError::PrecisionLoss {
                value: decimal.to_string(),
                type_string: ty.type_string(),
            })?;
            signed_word(&scaled, *bits, ty)
        }
        (Type::Ufixed { bits, places }, Payload::Fixed(decimal)) => {
            let scaled = decimal.rescale(u32::from(*places)).ok_or_else(|| EncodeError::PrecisionLoss {
                value: decimal.to_string(),
                type_string: ty.type_string(),
            })?;
            match scaled.to_biguint() {
                Some(unsigned) => unsigned_word(&unsigned, *bits, ty),
                None => Err(overflow(&decimal.to_string(), ty)),
            }
        }
        (
            Type::Function(_),
            Payload::Function(FunctionValue::External {
                contract, selector, ..
            }),
        ) => {
            let mut out = Vec::with_capacity(WORD_SIZE);
            out.extend_from_slice(contract.address().as_bytes());
            out.extend_from_slice(selector);
            out.resize(WORD_SIZE, 0);
            Ok(out)
        }
        (ty, payload) => Err(mismatch(ty, payload)),
    }
}

fn unsigned_word(value: &BigUint, bits: u16, ty: &Type) -> Result<Vec<u8>, EncodeError> {
    if value.bits() > u64::from(bits) {
        return Err(overflow(&value.to_string(), ty));
    }
    uint_to_bytes(value, WORD_SIZE).ok_or_else(|| overflow(&value.to_string(), ty))
}

fn signed_word(value: &BigInt, bits: u16, ty: &Type) -> Result<Vec<u8>, EncodeError> {
    let width = usize::from(bits / 8);
    int_to_bytes(value, width)
        .and_then(|_| int_to_bytes(value, WORD_SIZE))
        .ok_or_else(|| overflow(&value.to_string(), ty))
}

fn left_pad(bytes: &[u8; ADDRESS_SIZE]) -> Vec<u8> {
    let mut out = vec![0u8; WORD_SIZE - ADDRESS_SIZE];
    out.extend_from_slice(bytes);
    out
}

fn overflow(value: &str, ty: &Type) -> EncodeError {
    EncodeError::Overflow {
        value: value.to_string(),
        type_string: ty.type_string(),
    }
}

fn mismatch(ty: &Type, payload: &Payload) -> EncodeError {
    EncodeError::TypeMismatch {
        expected: ty.type_string(),
        got: payload.class_name().to_string(),
    }
}
