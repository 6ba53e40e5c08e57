//! Stack words.
//!
//! Value types sit directly on the stack, with whatever garbage the
//! compiler left in the high-order bytes, so padding is never checked here.
//! Reference types are pointers: a memory address, a storage slot, or a
//! calldata offset (followed by a length word for dynamic values).
//! External function pointers take two words: address, then selector.

use super::basic::{decode_basic_bytes, decode_external_function};
use super::memory::decode_memory_reference_by_address;
use super::storage::decode_storage_reference;
use super::{Options, PaddingMode, Step, abi, error_value, read_or_error};
use crate::conversion::{to_hex_string, to_usize, uint_from_bytes};
use crate::decoder::DecodingContext;
use crate::evm::{ADDRESS_SIZE, Address, ByteSource, SELECTOR_SIZE, Selector, WORD_SIZE};
use crate::format::{ArrayKind, BytesKind, Location, Payload, Type, Value, ValueError, Visibility};
use crate::pointer::{DataPointer, Slot};

pub(crate) fn decode_stack(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let literal = match read_or_error(ty, pointer, context, options)? {
        Ok(literal) => literal,
        Err(value) => return Ok(value),
    };
    decode_literal(ty, &literal, context, options)
}

/// Decode words already taken off the stack.
pub(crate) fn decode_literal(
    ty: &Type,
    literal: &[u8],
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let first = literal.get(..WORD_SIZE).unwrap_or(literal);
    if ty.is_reference() {
        let location = ty.location();
        return match location {
            Some(Location::Memory) => {
                let address = uint_from_bytes(first);
                match to_usize(&address) {
                    Some(start) => decode_memory_reference_by_address(ty, start, context, &Options::default()),
                    None => error_value(ty, ValueError::OverlargePointer { raw: address }, options),
                }
            }
            Some(Location::Storage) => {
                let slot = Slot::new(uint_from_bytes(first));
                decode_storage_reference(ty, &slot, context, options)
            }
            Some(Location::Calldata) => decode_calldata_pointer(ty, literal, context, options),
            None => error_value(
                ty,
                ValueError::NotDecodableHere {
                    type_string: ty.type_string(),
                    location: "stack".to_string(),
                },
                options,
            ),
        };
    }
    if let Type::Function(function) = ty {
        if function.visibility == Visibility::External {
            return decode_external_function_words(ty, literal, context, options);
        }
    }
    let permissive = Options {
        padding: PaddingMode::Permissive,
        ..options.clone()
    };
    decode_basic_bytes(ty, first, context, &permissive)
}

/// Calldata pointers measure from the start of calldata; dynamic values
/// carry their length in the second word.
fn decode_calldata_pointer(
    ty: &Type,
    literal: &[u8],
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let mut words = literal.chunks(WORD_SIZE).map(uint_from_bytes);
    let offset = words.next().unwrap_or_default();
    let Some(start) = to_usize(&offset) else {
        return error_value(ty, ValueError::OverlargePointer { raw: offset }, options);
    };
    let dynamic = matches!(
        ty,
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        } | Type::String { .. }
            | Type::Array {
                kind: ArrayKind::Dynamic,
                ..
            }
    );
    let length_override = if dynamic {
        let length = words.next().unwrap_or_default();
        match to_usize(&length) {
            Some(length) => Some(length),
            None => {
                return error_value(
                    ty,
                    ValueError::OverlongArrayOrString {
                        length,
                        data_length: context.state.source_len(ByteSource::Calldata).unwrap_or_default(),
                    },
                    options,
                );
            }
        }
    } else {
        None
    };
    let calldata_options = Options {
        abi_pointer_base: 0,
        length_override,
        ..options.clone()
    };
    abi::decode_abi_reference_by_address(ty, ByteSource::Calldata, start, context, &calldata_options)
}

fn decode_external_function_words(
    ty: &Type,
    literal: &[u8],
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let address_word = literal.get(..WORD_SIZE).unwrap_or_default();
    let selector_word = literal.get(WORD_SIZE..).unwrap_or_default();
    let address_padding = address_word.len().saturating_sub(ADDRESS_SIZE);
    let selector_padding = selector_word.len().saturating_sub(SELECTOR_SIZE);
    let padded = address_word.iter().take(address_padding).all(|byte| *byte == 0)
        && selector_word.iter().take(selector_padding).all(|byte| *byte == 0);
    if options.padding == PaddingMode::Checked && !padded {
        return error_value(
            ty,
            ValueError::FunctionExternalStackPadding {
                raw_address: to_hex_string(address_word),
                raw_selector: to_hex_string(selector_word),
            },
            options,
        );
    }
    let address = Address::from_word(address_word).unwrap_or_default();
    let mut selector: Selector = [0u8; SELECTOR_SIZE];
    for (out, byte) in selector.iter_mut().zip(selector_word.iter().skip(selector_padding)) {
        *out = *byte;
    }
    let function = decode_external_function(address, selector, context)?;
    Ok(Value::new(ty.clone(), Payload::Function(function)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::conversion::usize_to_word;
    use crate::decode::decode;
    use crate::evm::{Contexts, EvmState};
    use crate::format::UserDefinedTypes;

    fn word(tail: &[u8]) -> [u8; 32] {
        let mut word = [0u8; 32];
        let start = 32 - tail.len();
        word[start..].copy_from_slice(tail);
        word
    }

    #[test]
    fn test_value_type_ignores_dirty_bytes() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let mut dirty = word(&[0x05]);
        dirty[0] = 0xff;
        let state = EvmState::new().with_stack(vec![dirty]);
        let context = DecodingContext::new(state, &types, &allocations, &contexts);
        let value = decode(&Type::uint(8), &DataPointer::stack(0), &context, &Options::default()).unwrap();
        assert_eq!(value, Value::uint(8, 5u8));
    }

    #[test]
    fn test_calldata_string_pointer() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let mut calldata = vec![0u8; 4];
        calldata.extend(b"hello");
        let state = EvmState::new()
            .with_calldata(calldata)
            .with_stack(vec![word(&[4]), word(&[5])]);
        let context = DecodingContext::new(state, &types, &allocations, &contexts);
        let ty = Type::string().specify_location(Some(Location::Calldata));
        let pointer = DataPointer::Stack { from: 0, to: 1 };
        let value = decode(&ty, &pointer, &context, &Options::default()).unwrap();
        assert_eq!(value.to_string(), "\"hello\"");
    }

    #[test]
    fn test_memory_pointer() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let mut memory = vec![0u8; 64];
        memory.extend(usize_to_word(2));
        let mut content = b"ok".to_vec();
        content.resize(32, 0);
        memory.extend(content);
        let state = EvmState::new()
            .with_memory(memory)
            .with_stack(vec![word(&[64])]);
        let context = DecodingContext::new(state, &types, &allocations, &contexts);
        let ty = Type::bytes().specify_location(Some(Location::Memory));
        let value = decode(&ty, &DataPointer::stack(0), &context, &Options::default()).unwrap();
        assert_eq!(value, Value::new(ty, Payload::Bytes(b"ok".to_vec())));
    }
}
