//! Memory layouts.
//!
//! Every reference in memory is a word holding an absolute address. Arrays
//! and structs may point back at an enclosing value; such cycles are cut
//! with a `reference` marker giving how many levels up the target lies.

use super::basic::{decode_basic, decode_bytes};
use super::{Options, Step, error_value, read_or_error};
use crate::conversion::{to_usize, uint_from_bytes};
use crate::decoder::DecodingContext;
use crate::evm::{ByteSource, WORD_SIZE};
use crate::format::{ArrayKind, BytesKind, Location, NamedValue, Payload, Type, Value, ValueError};
use crate::pointer::DataPointer;

pub(crate) fn decode_memory(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    if matches!(ty, Type::Mapping { .. }) {
        return error_value(ty, ValueError::MappingNotDecodable, options);
    }
    if !ty.is_reference() {
        return decode_basic(ty, pointer, context, options);
    }
    let raw = match read_or_error(ty, pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(value),
    };
    let address = uint_from_bytes(&raw);
    match to_usize(&address) {
        Some(start) => decode_memory_reference_by_address(ty, start, context, options),
        None => error_value(ty, ValueError::OverlargePointer { raw: address }, options),
    }
}

/// Decode a reference-typed value stored at memory address `start`.
pub(crate) fn decode_memory_reference_by_address(
    ty: &Type,
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
            let length = match read_memory_length(ty, start, context, options)? {
                Ok(length) => length,
                Err(value) => return Ok(value),
            };
            let pointer = DataPointer::memory(start.saturating_add(WORD_SIZE), length);
            decode_bytes(ty, &pointer, context, options)
        }
        Type::Array { base, kind, .. } => {
            if let Some(reference) = circular_reference(start, options) {
                return Ok(Value::new(
                    ty.clone(),
                    Payload::Array {
                        elements: Vec::new(),
                        reference: Some(reference),
                    },
                ));
            }
            let (elements_start, length) = match kind {
                ArrayKind::Static { length } => (start, *length),
                ArrayKind::Dynamic => match read_memory_length(ty, start, context, options)? {
                    Ok(length) => (start.saturating_add(WORD_SIZE), length),
                    Err(value) => return Ok(value),
                },
            };
            let inner = enter(start, options);
            let base = base.specify_location(Some(Location::Memory));
            let mut elements = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                let pointer = DataPointer::memory(
                    elements_start.saturating_add(index.saturating_mul(WORD_SIZE)),
                    WORD_SIZE,
                );
                elements.push(decode_memory(&base, &pointer, context, &inner)?);
            }
            Ok(Value::new(
                ty.clone(),
                Payload::Array {
                    elements,
                    reference: None,
                },
            ))
        }
        Type::Struct { id, .. } => {
            if let Some(reference) = circular_reference(start, options) {
                return Ok(Value::new(
                    ty.clone(),
                    Payload::Struct {
                        members: Vec::new(),
                        reference: Some(reference),
                    },
                ));
            }
            let Some(allocation) = context.allocations.memory.get(id) else {
                return error_value(
                    ty,
                    ValueError::UserDefinedTypeNotFound {
                        type_string: ty.type_string(),
                    },
                    options,
                );
            };
            let inner = enter(start, options);
            let mut members = Vec::with_capacity(allocation.members.len());
            for member in &allocation.members {
                let pointer = DataPointer::memory(start.saturating_add(member.offset), member.length);
                let member_ty = member.ty.specify_location(Some(Location::Memory));
                members.push(NamedValue {
                    name: Some(member.name.clone()),
                    value: decode_memory(&member_ty, &pointer, context, &inner)?,
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
        _ => error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: ByteSource::Memory.to_string(),
            },
            options,
        ),
    }
}

/// How many levels up `start` was already entered, if at all.
fn circular_reference(start: usize, options: &Options) -> Option<usize> {
    options
        .memory_visited
        .iter()
        .position(|visited| *visited == start)
        .map(|depth| depth + 1)
}

fn enter(start: usize, options: &Options) -> Options {
    let mut visited = Vec::with_capacity(options.memory_visited.len() + 1);
    visited.push(start);
    visited.extend_from_slice(&options.memory_visited);
    Options {
        memory_visited: visited,
        ..options.clone()
    }
}

fn read_memory_length(
    ty: &Type,
    start: usize,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Result<usize, Value>> {
    let pointer = DataPointer::memory(start, WORD_SIZE);
    let raw = match read_or_error(ty, &pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(Err(value)),
    };
    let length = uint_from_bytes(&raw);
    let available = context.state.source_len(ByteSource::Memory);
    match to_usize(&length) {
        Some(length) if available.is_none_or(|available| length <= available) => Ok(Ok(length)),
        _ => error_value(
            ty,
            ValueError::OverlongArrayOrString {
                length,
                data_length: available.unwrap_or_default(),
            },
            options,
        )
        .map(Err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::conversion::usize_to_word;
    use crate::decode::decode;
    use crate::evm::{Contexts, EvmState};
    use crate::format::{StructDefinition, UserDefinedTypes};

    #[test]
    fn test_memory_string() {
        let mut memory = usize_to_word(32);
        memory.extend(usize_to_word(3));
        let mut content = b"abc".to_vec();
        content.resize(32, 0);
        memory.extend(content);
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new().with_memory(memory), &types, &allocations, &contexts);
        let ty = Type::string().specify_location(Some(Location::Memory));
        let value = decode(&ty, &DataPointer::memory(0, 32), &context, &Options::default()).unwrap();
        assert_eq!(value.to_string(), "\"abc\"");
    }

    #[test]
    fn test_circular_struct() {
        let mut types = UserDefinedTypes::new();
        let node = StructDefinition::new("node", "Node");
        let node_ty = Type::struct_of(&node).specify_location(Some(Location::Memory));
        types.insert_struct(
            node.member("value", Type::uint(256))
                .member("next", Type::struct_of(&StructDefinition::new("node", "Node"))),
        );
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        // struct at 0x40 pointing back at itself
        let mut memory = usize_to_word(0x40);
        memory.extend(usize_to_word(0));
        memory.extend(usize_to_word(5));
        memory.extend(usize_to_word(0x40));
        let context = DecodingContext::new(EvmState::new().with_memory(memory), &types, &allocations, &contexts);
        let value = decode(&node_ty, &DataPointer::memory(0, 32), &context, &Options::default()).unwrap();
        assert!(matches!(value.payload(), Some(Payload::Struct { reference: None, .. })));
        if let Some(Payload::Struct { members, .. }) = value.payload() {
            assert_eq!(members[0].value, Value::uint(256, 5u8));
            assert!(matches!(
                members[1].value.payload(),
                Some(Payload::Struct {
                    reference: Some(1),
                    ..
                })
            ));
        }
    }
}
