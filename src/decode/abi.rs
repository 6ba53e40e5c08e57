//! ABI head/tail decoding for calldata, event data and return data.
//!
//! Dynamic values occupy a head word holding an offset measured from
//! [`Options::abi_pointer_base`]; static values sit in place.

use num_bigint::BigUint;

use super::basic::{decode_basic, decode_bytes};
use super::{
    Interrupt, Options, Step, decode, error_value, missing_definition, not_decodable_here, read_or_error,
};
use crate::allocate::abi_size_info;
use crate::conversion::{to_usize, uint_from_bytes};
use crate::decoder::DecodingContext;
use crate::evm::{ByteSource, WORD_SIZE};
use crate::format::{
    ArrayKind, BytesKind, Location, MemberType, NamedValue, Payload, Type, Value, ValueError,
};
use crate::pointer::DataPointer;

pub(crate) fn decode_abi(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let is_aggregate = ty.is_reference() || matches!(ty, Type::Tuple { .. });
    if !is_aggregate {
        return decode_basic(ty, pointer, context, options);
    }
    let DataPointer::Bytes { source, start, .. } = pointer else {
        return not_decodable_here(ty, pointer, options);
    };
    if matches!(ty, Type::Mapping { .. }) {
        return error_value(ty, ValueError::MappingNotDecodable, options);
    }
    let Some(info) = abi_size_info(ty, &context.allocations.abi) else {
        return missing_definition(ty, options);
    };
    if !info.dynamic {
        return decode_abi_reference_static(ty, *source, *start, context, options);
    }

    let raw = match read_or_error(ty, pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(value),
    };
    let offset = uint_from_bytes(&raw);
    if options.strict {
        if let Some(available) = context.state.source_len(*source) {
            if offset > BigUint::from(available) {
                return Err(Interrupt::Stop {
                    error: ValueError::OverlargePointer { raw: offset },
                    allow_retry: false,
                });
            }
        }
    }
    let Some(start) = to_usize(&offset).and_then(|offset| offset.checked_add(options.abi_pointer_base))
    else {
        return error_value(ty, ValueError::OverlargePointer { raw: offset }, options);
    };
    decode_abi_reference_by_address(ty, *source, start, context, options)
}

/// Decode a dynamic aggregate whose tail starts at `start`.
pub(crate) fn decode_abi_reference_by_address(
    ty: &Type,
    source: ByteSource,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match ty {
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => {
            let (data_start, length) = match options.length_override {
                Some(length) => (start, length),
                None => match read_length(ty, source, start, context, options)? {
                    Ok(length) => (start.saturating_add(WORD_SIZE), length),
                    Err(value) => return Ok(value),
                },
            };
            let pointer = DataPointer::Bytes {
                source,
                start: data_start,
                length,
            };
            decode_bytes(ty, &pointer, context, options)
        }
        Type::Array { base, kind, .. } => {
            let (elements_start, length) = match kind {
                ArrayKind::Static { length } => (start, *length),
                ArrayKind::Dynamic => match options.length_override {
                    Some(length) => (start, length),
                    None => match read_length(ty, source, start, context, options)? {
                        Ok(length) => (start.saturating_add(WORD_SIZE), length),
                        Err(value) => return Ok(value),
                    },
                },
            };
            decode_abi_array(ty, base, length, source, elements_start, context, options)
        }
        Type::Struct { .. } => decode_abi_struct_by_position(ty, source, start, context, options),
        Type::Tuple { members } => decode_abi_tuple_by_position(ty, members, source, start, context, options),
        _ => error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: source.to_string(),
            },
            options,
        ),
    }
}

/// Static aggregates are laid out in place.
fn decode_abi_reference_static(
    ty: &Type,
    source: ByteSource,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match ty {
        Type::Array {
            base,
            kind: ArrayKind::Static { length },
            ..
        } => decode_abi_array(ty, base, *length, source, start, context, options),
        Type::Struct { .. } => decode_abi_struct_by_position(ty, source, start, context, options),
        Type::Tuple { members } => decode_abi_tuple_by_position(ty, members, source, start, context, options),
        _ => error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: source.to_string(),
            },
            options,
        ),
    }
}

/// Read a length word and check it against the resident data.
fn read_length(
    ty: &Type,
    source: ByteSource,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Result<usize, Value>> {
    let pointer = DataPointer::Bytes {
        source,
        start,
        length: WORD_SIZE,
    };
    let raw = match read_or_error(ty, &pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(Err(value)),
    };
    let length = uint_from_bytes(&raw);
    let available = context.state.source_len(source);
    let fits = match (to_usize(&length), available) {
        (Some(length), Some(available)) => length <= available,
        (Some(_), None) => true,
        (None, _) => false,
    };
    match to_usize(&length) {
        Some(length) if fits => Ok(Ok(length)),
        _ => {
            let error = ValueError::OverlongArrayOrString {
                length,
                data_length: available.unwrap_or_default(),
            };
            error_value(ty, error, options).map(Err)
        }
    }
}

fn decode_abi_array(
    ty: &Type,
    base: &Type,
    length: usize,
    source: ByteSource,
    elements_start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let Some(base_info) = abi_size_info(base, &context.allocations.abi) else {
        return missing_definition(ty, options);
    };
    let element_options = Options {
        abi_pointer_base: elements_start,
        length_override: None,
        ..options.clone()
    };
    let mut elements = Vec::with_capacity(length.min(1024));
    for index in 0..length {
        let pointer = DataPointer::Bytes {
            source,
            start: elements_start.saturating_add(index.saturating_mul(base_info.size)),
            length: base_info.size,
        };
        elements.push(decode(base, &pointer, context, &element_options)?);
    }
    Ok(Value::new(
        ty.clone(),
        Payload::Array {
            elements,
            reference: None,
        },
    ))
}

/// Member types are only marked `calldata` when decoding calldata; event
/// and return data carry no location.
fn member_location(source: ByteSource) -> Option<Location> {
    match source {
        ByteSource::Calldata => Some(Location::Calldata),
        _ => None,
    }
}

fn decode_abi_struct_by_position(
    ty: &Type,
    source: ByteSource,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let Type::Struct { id, .. } = ty else {
        return error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: source.to_string(),
            },
            options,
        );
    };
    let Some(allocation) = context.allocations.abi.get(id) else {
        return missing_definition(ty, options);
    };
    let member_options = Options {
        abi_pointer_base: start,
        length_override: None,
        ..options.clone()
    };
    let location = member_location(source);
    let mut members = Vec::with_capacity(allocation.members.len());
    for member in &allocation.members {
        let pointer = DataPointer::Bytes {
            source,
            start: start.saturating_add(member.offset),
            length: member.length,
        };
        let member_ty = member.ty.specify_location(location);
        members.push(NamedValue {
            name: Some(member.name.clone()),
            value: decode(&member_ty, &pointer, context, &member_options)?,
        });
    }
    Ok(Value::new(
        ty.clone(),
        Payload::Struct {
            members,
            reference: None,
        },
    ))
}

fn decode_abi_tuple_by_position(
    ty: &Type,
    members: &[MemberType],
    source: ByteSource,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let member_options = Options {
        abi_pointer_base: start,
        length_override: None,
        ..options.clone()
    };
    let mut position = start;
    let mut values = Vec::with_capacity(members.len());
    for member in members {
        let Some(info) = abi_size_info(&member.ty, &context.allocations.abi) else {
            return missing_definition(ty, options);
        };
        let pointer = DataPointer::Bytes {
            source,
            start: position,
            length: info.size,
        };
        values.push(NamedValue {
            name: member.name.clone(),
            value: decode(&member.ty, &pointer, context, &member_options)?,
        });
        position = position.saturating_add(info.size);
    }
    Ok(Value::new(ty.clone(), Payload::Tuple(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::conversion::usize_to_word;
    use crate::encode::encode_abi;
    use crate::evm::{Contexts, EvmState};
    use crate::format::{StringValue, StructDefinition, UserDefinedTypes};

    fn decode_calldata_value(ty: &Type, calldata: Vec<u8>, strict: bool) -> Step<Value> {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let context = DecodingContext::new(
            EvmState::new().with_calldata(calldata),
            &types,
            &allocations,
            &contexts,
        );
        let options = Options {
            strict,
            ..Options::default()
        };
        decode(ty, &DataPointer::calldata(0, WORD_SIZE), &context, &options)
    }

    #[test]
    fn test_decode_string_via_offset() {
        let value = Value::string("hello");
        let encoded = encode_abi(&Value::tuple(vec![value]), &Default::default()).unwrap();
        let decoded = decode_calldata_value(&Type::string(), encoded, true).unwrap();
        assert_eq!(
            decoded.payload(),
            Some(&Payload::String(StringValue::Valid("hello".to_string())))
        );
    }

    #[test]
    fn test_decode_dynamic_array() {
        let mut calldata = usize_to_word(32);
        calldata.extend(usize_to_word(2));
        calldata.extend(usize_to_word(7));
        calldata.extend(usize_to_word(9));
        let ty = Type::dynamic_array(Type::uint(256));
        let decoded = decode_calldata_value(&ty, calldata, true).unwrap();
        assert_eq!(
            decoded.payload(),
            Some(&Payload::Array {
                elements: vec![Value::uint(256, 7u8), Value::uint(256, 9u8)],
                reference: None
            })
        );
    }

    #[test]
    fn test_overlong_length() {
        let mut calldata = usize_to_word(32);
        calldata.extend(usize_to_word(1000));
        let lenient = decode_calldata_value(&Type::bytes(), calldata.clone(), false).unwrap();
        assert!(matches!(
            lenient.as_error(),
            Some(ValueError::OverlongArrayOrString { .. })
        ));
        assert!(matches!(
            decode_calldata_value(&Type::bytes(), calldata, true),
            Err(Interrupt::Stop { allow_retry: false, .. })
        ));
    }

    #[test]
    fn test_struct_without_allocation_is_retryable() {
        let definition = StructDefinition::new("s", "S").member("x", Type::uint(8));
        let ty = Type::struct_of(&definition);
        let result = decode_calldata_value(&ty, usize_to_word(1), true);
        assert!(matches!(
            result,
            Err(Interrupt::Stop {
                error: ValueError::UserDefinedTypeNotFound { .. },
                allow_retry: true
            })
        ));
        let lenient = decode_calldata_value(&ty, usize_to_word(1), false).unwrap();
        assert!(matches!(
            lenient.as_error(),
            Some(ValueError::UserDefinedTypeNotFound { .. })
        ));
    }
}
