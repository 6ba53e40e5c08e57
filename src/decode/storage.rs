//! Storage layouts.
//!
//! Values pack into slots from the low-order end. Dynamic arrays keep their
//! length in their own slot and their elements at the hash of it; bytes and
//! strings of up to 31 bytes live inline with `2 * length` in the lowest
//! byte, longer ones keep `2 * length + 1` there and spill to the hash.
//!
//! Mappings cannot be enumerated: only entries whose key slots were
//! registered on the decoding context are decoded.
//!
//! A length read from storage that would span more than
//! [`MAX_STORAGE_WORDS`] words decodes as `OverlongArrayOrString`.

use num_bigint::BigUint;
use num_traits::One;

use super::basic::{decode_basic, decode_bytes};
use super::{Options, Step, decode_parts, error_value, read_or_error};
use crate::allocate::{StorageLength, storage_size_for_type};
use crate::conversion::{to_usize, uint_from_bytes};
use crate::decoder::{DecodingContext, MAX_STORAGE_WORDS};
use crate::evm::WORD_SIZE;
use crate::format::{
    ArrayKind, BytesKind, Location, MappingEntry, NamedValue, Payload, Type, Value, ValueError,
};
use crate::logging::trace;
use crate::pointer::{DataPointer, Slot, StoragePosition, StorageRange, slot_address};

pub(crate) fn decode_storage(
    ty: &Type,
    range: &StorageRange,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    if ty.is_reference() {
        decode_storage_reference(ty, &range.from.slot, context, options)
    } else {
        decode_basic(ty, &DataPointer::Storage(range.clone()), context, options)
    }
}

/// Decode a reference-typed value whose root is `slot`.
pub(crate) fn decode_storage_reference(
    ty: &Type,
    slot: &Slot,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match ty {
        Type::Array { base, kind, .. } => decode_storage_array(ty, base, *kind, slot, context, options),
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => decode_storage_bytes(ty, slot, context, options),
        Type::Struct { id, .. } => {
            let Some(allocation) = context.allocations.storage.get(id) else {
                return error_value(
                    ty,
                    ValueError::UserDefinedTypeNotFound {
                        type_string: ty.type_string(),
                    },
                    options,
                );
            };
            let members = decode_parts(&allocation.members, |member| {
                let range = StorageRange {
                    from: StoragePosition {
                        slot: Slot::child(slot, member.slot_offset),
                        index: member.index,
                    },
                    length: member.length.byte_length(),
                };
                let member_ty = member.ty.specify_location(Some(Location::Storage));
                Ok(NamedValue {
                    name: Some(member.name.clone()),
                    value: decode_storage(&member_ty, &range, context, options)?,
                })
            })?;
            Ok(Value::new(
                ty.clone(),
                Payload::Struct {
                    members,
                    reference: None,
                },
            ))
        }
        Type::Mapping { value, .. } => decode_storage_mapping(ty, value, slot, context, options),
        _ => error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: "storage".to_string(),
            },
            options,
        ),
    }
}

fn decode_storage_array(
    ty: &Type,
    base: &Type,
    kind: ArrayKind,
    slot: &Slot,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let (data_slot, length) = match kind {
        ArrayKind::Static { length } => (slot.clone(), length),
        ArrayKind::Dynamic => {
            let word = match read_word(ty, slot, context, options)? {
                Ok(word) => word,
                Err(value) => return Ok(value),
            };
            let length = uint_from_bytes(&word);
            match to_usize(&length) {
                Some(length) => (Slot::hashed(slot, 0u8), length),
                None => return error_value(ty, overlong(length), options),
            }
        }
    };
    let Some(base_size) = storage_size_for_type(base, &context.allocations.storage) else {
        return error_value(
            ty,
            ValueError::UserDefinedTypeNotFound {
                type_string: base.type_string(),
            },
            options,
        );
    };
    if words_for_elements(length, base_size).is_none_or(|words| words > MAX_STORAGE_WORDS) {
        trace!(length, "storage array longer than the decodable maximum");
        return error_value(ty, overlong(BigUint::from(length)), options);
    }
    let base = base.specify_location(Some(Location::Storage));
    let elements = decode_parts(0..length, |index| {
        decode_storage(&base, &element_range(&data_slot, index, base_size), context, options)
    })?;
    Ok(Value::new(
        ty.clone(),
        Payload::Array {
            elements,
            reference: None,
        },
    ))
}

/// Storage words spanned by `length` elements of the given size.
fn words_for_elements(length: usize, size: StorageLength) -> Option<usize> {
    match size {
        StorageLength::Words(words) => length.checked_mul(words),
        StorageLength::Bytes(bytes) => Some(length.div_ceil((WORD_SIZE / bytes.max(1)).max(1))),
    }
}

fn overlong(length: BigUint) -> ValueError {
    ValueError::OverlongArrayOrString {
        length,
        data_length: MAX_STORAGE_WORDS * WORD_SIZE,
    }
}

/// Where element `index` of an array starting at `data_slot` lives.
fn element_range(data_slot: &Slot, index: usize, size: StorageLength) -> StorageRange {
    match size {
        StorageLength::Words(words) => StorageRange {
            from: StoragePosition {
                slot: Slot::child(data_slot, index.saturating_mul(words)),
                index: 0,
            },
            length: words.saturating_mul(WORD_SIZE),
        },
        StorageLength::Bytes(bytes) => {
            let per_word = (WORD_SIZE / bytes.max(1)).max(1);
            let position = index % per_word;
            StorageRange {
                from: StoragePosition {
                    slot: Slot::child(data_slot, index / per_word),
                    index: WORD_SIZE.saturating_sub((position + 1) * bytes),
                },
                length: bytes,
            }
        }
    }
}

fn decode_storage_bytes(
    ty: &Type,
    slot: &Slot,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let word = match read_word(ty, slot, context, options)? {
        Ok(word) => word,
        Err(value) => return Ok(value),
    };
    let low = word.last().copied().unwrap_or_default();
    let range = if low % 2 == 0 {
        StorageRange {
            from: StoragePosition {
                slot: slot.clone(),
                index: 0,
            },
            length: usize::from(low / 2),
        }
    } else {
        let length = (uint_from_bytes(&word) - BigUint::one()) >> 1;
        let Some(length) = to_usize(&length).filter(|length| length.div_ceil(WORD_SIZE) <= MAX_STORAGE_WORDS) else {
            trace!(%length, "storage bytes longer than the decodable maximum");
            return error_value(ty, overlong(length), options);
        };
        StorageRange {
            from: StoragePosition {
                slot: Slot::hashed(slot, 0u8),
                index: 0,
            },
            length,
        }
    };
    if range.length == 0 {
        return Ok(super::basic::bytes_value(ty, Vec::new()));
    }
    decode_bytes(ty, &DataPointer::Storage(range), context, options)
}

fn decode_storage_mapping(
    ty: &Type,
    value_ty: &Type,
    slot: &Slot,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let Some(address) = slot_address(slot) else {
        return error_value(ty, ValueError::MappingNotDecodable, options);
    };
    let Some(value_size) = storage_size_for_type(value_ty, &context.allocations.storage) else {
        return error_value(
            ty,
            ValueError::UserDefinedTypeNotFound {
                type_string: value_ty.type_string(),
            },
            options,
        );
    };
    let value_ty = value_ty.specify_location(Some(Location::Storage));
    let keys: Vec<(&Slot, &Value)> = context
        .mapping_keys
        .iter()
        .filter_map(|key_slot| match (&key_slot.path, &key_slot.key) {
            (Some(path), Some(key)) if slot_address(path).as_ref() == Some(&address) => {
                Some((key_slot, key.as_ref()))
            }
            _ => None,
        })
        .collect();
    let entries = decode_parts(keys, |(key_slot, key)| {
        trace!(key = %key, "decoding mapping entry");
        let range = match value_size {
            StorageLength::Bytes(length) => StorageRange::low_bytes(key_slot.clone(), length),
            StorageLength::Words(words) => StorageRange {
                from: StoragePosition {
                    slot: key_slot.clone(),
                    index: 0,
                },
                length: words.saturating_mul(WORD_SIZE),
            },
        };
        Ok(MappingEntry {
            key: key.clone(),
            value: decode_storage(&value_ty, &range, context, options)?,
        })
    })?;
    Ok(Value::new(ty.clone(), Payload::Mapping(entries)))
}

fn read_word(
    ty: &Type,
    slot: &Slot,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Result<Vec<u8>, Value>> {
    let pointer = DataPointer::Storage(StorageRange::word(slot.clone()));
    read_or_error(ty, &pointer, context, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::conversion::{keccak256, usize_to_word};
    use crate::decode::Interrupt;
    use crate::decoder::Request;
    use crate::evm::{Contexts, EvmState};
    use crate::format::UserDefinedTypes;

    fn word_of(bytes: Vec<u8>) -> [u8; 32] {
        let mut word = [0u8; 32];
        for (out, byte) in word.iter_mut().zip(bytes) {
            *out = byte;
        }
        word
    }

    fn decode_with(state: EvmState, ty: &Type, slot: Slot, keys: Vec<Slot>) -> Step<Value> {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let mut context = DecodingContext::new(state, &types, &allocations, &contexts);
        for key in keys {
            context = context.with_mapping_key(key);
        }
        decode_storage(ty, &StorageRange::word(slot), &context, &Options::default())
    }

    #[test]
    fn test_short_string() {
        let mut word = b"hi".to_vec();
        word.resize(31, 0);
        word.push(4);
        let state = EvmState::new().with_storage_word(BigUint::default(), word_of(word));
        let value = decode_with(state, &Type::string(), Slot::new(0u8), Vec::new()).unwrap();
        assert_eq!(value.to_string(), "\"hi\"");
    }

    #[test]
    fn test_long_string_requests_hashed_slot() {
        let state = EvmState::new().with_storage_word(BigUint::default(), word_of(usize_to_word(2 * 40 + 1)));
        let result = decode_with(state, &Type::string(), Slot::new(0u8), Vec::new());
        let first = BigUint::from_bytes_be(&keccak256(&[0u8; 32]));
        let expected = vec![
            Request::Storage { slot: first.clone() },
            Request::Storage { slot: first + 1u8 },
        ];
        assert_eq!(result, Err(Interrupt::Suspend(expected)));
    }

    #[test]
    fn test_packed_static_array() {
        let mut word = [0u8; 32];
        word[31] = 1;
        word[30] = 2;
        word[29] = 3;
        let state = EvmState::new().with_storage_word(BigUint::from(7u8), word);
        let ty = Type::array(Type::uint(8), 3);
        let value = decode_with(state, &ty, Slot::new(7u8), Vec::new()).unwrap();
        assert_eq!(value.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_mapping_with_registered_key() {
        let key = Value::uint(256, 1u8);
        let mapping_slot = Slot::new(2u8);
        let key_slot = Slot::mapping(&mapping_slot, key.clone());
        let address = slot_address(&key_slot).unwrap();
        let state = EvmState::new().with_storage_word(address, word_of(usize_to_word(42)));
        let ty = Type::Mapping {
            key: Box::new(Type::uint(256)),
            value: Box::new(Type::uint(256)),
            location: Some(Location::Storage),
        };
        let value = decode_with(state, &ty, mapping_slot, vec![key_slot]).unwrap();
        assert_eq!(
            value.payload(),
            Some(&Payload::Mapping(vec![MappingEntry {
                key,
                value: Value::uint(256, 42u8)
            }]))
        );
    }
}
