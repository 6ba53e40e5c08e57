//! Value types: everything that fits in one word.
//!
//! Raw input is normally a full word, but storage hands over exactly the
//! bytes a packed value occupies, so every reader here accepts inputs
//! shorter than a word as already unpadded.

use num_bigint::BigInt;

use super::{Interrupt, Options, PaddingMode, Step, error_value, not_decodable_here, read_or_error};
use crate::conversion::{int_from_bytes, to_hex_string, to_usize, uint_from_bytes};
use crate::decoder::{DecodingContext, Request};
use crate::evm::{ADDRESS_SIZE, Address, PC_SIZE, SELECTOR_SIZE, Selector};
use crate::format::{
    BytesKind, ContractValue, Decimal, ExternalFunctionKind, FunctionValue, InternalFunctionValue,
    PaddingType, Payload, StringValue, Type, Value, ValueError, Visibility, enum_width,
};
use crate::logging::trace;
use crate::pointer::DataPointer;

/// Decode a value type from the bytes behind a pointer.
pub(crate) fn decode_basic(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let raw = match read_or_error(ty, pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(value),
    };
    match ty {
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => Ok(bytes_value(ty, raw)),
        _ if ty.is_reference() => not_decodable_here(ty, pointer, options),
        _ => decode_basic_bytes(ty, &raw, context, options),
    }
}

/// Dynamic bytes or string content, read as-is.
pub(crate) fn decode_bytes(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match read_or_error(ty, pointer, context, options)? {
        Ok(raw) => Ok(bytes_value(ty, raw)),
        Err(value) => Ok(value),
    }
}

pub(crate) fn bytes_value(ty: &Type, raw: Vec<u8>) -> Value {
    match ty {
        Type::String { .. } => Value::new(ty.clone(), Payload::String(StringValue::from_bytes(raw))),
        _ => Value::new(ty.clone(), Payload::Bytes(raw)),
    }
}

/// A compile-time constant: dynamic content as-is, anything else as a word.
pub(crate) fn decode_constant(
    ty: &Type,
    bytes: &[u8],
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match ty {
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => Ok(bytes_value(ty, bytes.to_vec())),
        _ => decode_basic_bytes(ty, bytes, context, options),
    }
}

/// Decode a value type from raw bytes already in hand.
pub(crate) fn decode_basic_bytes(
    ty: &Type,
    raw: &[u8],
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let width = |bits: u16| usize::from(bits) / 8;
    let unpad = |width: usize, padding: PaddingType| unpadded(ty, raw, width, padding, options);
    macro_rules! unpadded_or_return {
        ($result:expr) => {
            match $result? {
                Ok(bytes) => bytes,
                Err(value) => return Ok(value),
            }
        };
    }
    match ty {
        Type::Uint { bits } => {
            let bytes = unpadded_or_return!(unpad(width(*bits), PaddingType::Left));
            Ok(Value::new(ty.clone(), Payload::Uint(uint_from_bytes(&bytes))))
        }
        Type::Int { bits } => {
            let bytes = unpadded_or_return!(unpad(width(*bits), PaddingType::Signed));
            Ok(Value::new(ty.clone(), Payload::Int(int_from_bytes(&bytes))))
        }
        Type::Bool => {
            let bytes = unpadded_or_return!(unpad(1, PaddingType::Left));
            let numeric = uint_from_bytes(&bytes);
            match to_usize(&numeric) {
                Some(0) => Ok(Value::new(ty.clone(), Payload::Bool(false))),
                Some(1) => Ok(Value::new(ty.clone(), Payload::Bool(true))),
                _ => error_value(ty, ValueError::BoolOutOfRange { raw: numeric }, options),
            }
        }
        Type::Address { .. } => {
            let bytes = unpadded_or_return!(unpad(ADDRESS_SIZE, PaddingType::Left));
            Ok(Value::new(ty.clone(), Payload::Address(address_from(&bytes))))
        }
        Type::Contract { .. } => {
            let bytes = unpadded_or_return!(unpad(ADDRESS_SIZE, PaddingType::Left));
            let contract = decode_contract(address_from(&bytes), context)?;
            Ok(Value::new(ty.clone(), Payload::Contract(contract)))
        }
        Type::Bytes {
            kind: BytesKind::Static { length },
            ..
        } => {
            let bytes = unpadded_or_return!(unpad(usize::from(*length), PaddingType::Right));
            Ok(Value::new(ty.clone(), Payload::Bytes(bytes)))
        }
        Type::Enum { options: names, .. } => {
            let bytes = unpadded_or_return!(unpad(enum_width(names.len()), PaddingType::Left));
            let numeric = uint_from_bytes(&bytes);
            let named = to_usize(&numeric).and_then(|index| Some((index, names.get(index)?.clone())));
            match named {
                Some((index, name)) => Ok(Value::new(ty.clone(), Payload::Enum { index, name })),
                None => error_value(ty, ValueError::EnumOutOfRange { raw: numeric }, options),
            }
        }
        Type::Fixed { bits, places } => {
            let bytes = unpadded_or_return!(unpad(width(*bits), PaddingType::Signed));
            let digits = int_from_bytes(&bytes);
            Ok(Value::new(
                ty.clone(),
                Payload::Fixed(Decimal::new(digits, u32::from(*places))),
            ))
        }
        Type::Ufixed { bits, places } => {
            let bytes = unpadded_or_return!(unpad(width(*bits), PaddingType::Left));
            let digits = BigInt::from(uint_from_bytes(&bytes));
            Ok(Value::new(
                ty.clone(),
                Payload::Fixed(Decimal::new(digits, u32::from(*places))),
            ))
        }
        Type::Function(function) => match function.visibility {
            Visibility::External => {
                let bytes = unpadded_or_return!(unpad(ADDRESS_SIZE + SELECTOR_SIZE, PaddingType::Right));
                let address = address_from(bytes.get(..ADDRESS_SIZE).unwrap_or_default());
                let selector = selector_from(bytes.get(ADDRESS_SIZE..).unwrap_or_default());
                let function = decode_external_function(address, selector, context)?;
                Ok(Value::new(ty.clone(), Payload::Function(function)))
            }
            Visibility::Internal => {
                let bytes = unpadded_or_return!(unpad(2 * PC_SIZE, PaddingType::Left));
                let constructor_pc = pc_from(bytes.get(..PC_SIZE).unwrap_or_default());
                let deployed_pc = pc_from(bytes.get(PC_SIZE..).unwrap_or_default());
                decode_internal_function(ty, deployed_pc, constructor_pc, context, options)
            }
        },
        _ => error_value(
            ty,
            ValueError::NotDecodableHere {
                type_string: ty.type_string(),
                location: "a single word".to_string(),
            },
            options,
        ),
    }
}

/// Strip padding from `raw`, leaving `width` value bytes, or report a
/// padding error when the padding bytes are wrong.
fn unpadded(
    ty: &Type,
    raw: &[u8],
    width: usize,
    padding: PaddingType,
    options: &Options,
) -> Step<Result<Vec<u8>, Value>> {
    if options.padding == PaddingMode::Checked && !padding_is_valid(raw, width, padding) {
        let error = ValueError::Padding {
            raw: to_hex_string(raw),
            padding,
        };
        return error_value(ty, error, options).map(Err);
    }
    Ok(Ok(strip_padding(raw, width, padding)))
}

fn padding_is_valid(raw: &[u8], width: usize, padding: PaddingType) -> bool {
    let Some(pad_length) = raw.len().checked_sub(width) else {
        return true;
    };
    match padding {
        PaddingType::Left => raw.iter().take(pad_length).all(|byte| *byte == 0),
        PaddingType::Right => raw.iter().skip(width).all(|byte| *byte == 0),
        PaddingType::Signed => {
            let Some((pad, value)) = raw.split_at_checked(pad_length) else {
                return false;
            };
            let fill = match value.first() {
                Some(byte) if byte & 0x80 != 0 => 0xff,
                _ => 0x00,
            };
            pad.iter().all(|byte| *byte == fill)
        }
    }
}

fn strip_padding(raw: &[u8], width: usize, padding: PaddingType) -> Vec<u8> {
    if raw.len() <= width {
        return raw.to_vec();
    }
    match padding {
        PaddingType::Left | PaddingType::Signed => raw.iter().skip(raw.len() - width).copied().collect(),
        PaddingType::Right => raw.iter().take(width).copied().collect(),
    }
}

fn address_from(bytes: &[u8]) -> Address {
    let mut address = [0u8; ADDRESS_SIZE];
    let skip = ADDRESS_SIZE.saturating_sub(bytes.len());
    for (out, byte) in address.iter_mut().skip(skip).zip(bytes) {
        *out = *byte;
    }
    Address(address)
}

fn selector_from(bytes: &[u8]) -> Selector {
    let mut selector = [0u8; SELECTOR_SIZE];
    for (out, byte) in selector.iter_mut().zip(bytes) {
        *out = *byte;
    }
    selector
}

fn pc_from(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |pc, byte| (pc << 8) | u32::from(*byte))
}

/// Identify the contract deployed at `address` by its code.
pub(crate) fn decode_contract(address: Address, context: &DecodingContext<'_>) -> Step<ContractValue> {
    let Some(code) = context.state.code_at(&address) else {
        trace!(%address, "code not resident");
        return Err(Interrupt::suspend(Request::Code { address }));
    };
    Ok(match context.contexts.find_by_code(code) {
        Some(found) => ContractValue::Known {
            address,
            class: found.info(),
        },
        None => ContractValue::Unknown { address },
    })
}

/// Resolve an external function pointer to a function of a known contract.
pub(crate) fn decode_external_function(
    address: Address,
    selector: Selector,
    context: &DecodingContext<'_>,
) -> Step<FunctionValue> {
    let contract = decode_contract(address, context)?;
    let kind = match &contract {
        ContractValue::Unknown { .. } => ExternalFunctionKind::Unknown,
        ContractValue::Known { class, .. } => context
            .contexts
            .get(&class.context)
            .and_then(|known| known.functions.get(&selector))
            .map_or(ExternalFunctionKind::Invalid, |name| ExternalFunctionKind::Known {
                name: name.clone(),
            }),
    };
    Ok(FunctionValue::External {
        contract,
        selector,
        kind,
    })
}

/// Resolve an internal function pointer against the current context's
/// function table.
pub(crate) fn decode_internal_function(
    ty: &Type,
    deployed_pc: u32,
    constructor_pc: u32,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let function = |value: InternalFunctionValue| -> Step<Value> {
        Ok(Value::new(ty.clone(), Payload::Function(FunctionValue::Internal(value))))
    };
    let table = context
        .current_context
        .and_then(|current| Some((current.is_constructor, current.internal_functions.as_ref()?)));
    let Some((is_constructor, table)) = table else {
        return function(InternalFunctionValue::Unknown {
            deployed_pc,
            constructor_pc,
        });
    };
    if deployed_pc == 0 && constructor_pc == 0 {
        return function(InternalFunctionValue::Exception {
            deployed_pc,
            constructor_pc,
        });
    }
    let pc = if is_constructor {
        if constructor_pc == 0 {
            return error_value(
                ty,
                ValueError::DeployedFunctionInConstructor {
                    deployed_pc,
                    constructor_pc,
                },
                options,
            );
        }
        constructor_pc
    } else {
        if deployed_pc == 0 {
            return error_value(
                ty,
                ValueError::MalformedInternalFunction {
                    deployed_pc,
                    constructor_pc,
                },
                options,
            );
        }
        deployed_pc
    };
    match table.get(&pc) {
        None => error_value(
            ty,
            ValueError::NoSuchInternalFunction {
                deployed_pc,
                constructor_pc,
            },
            options,
        ),
        Some(entry) if entry.is_designated_invalid => function(InternalFunctionValue::Exception {
            deployed_pc,
            constructor_pc,
        }),
        Some(entry) => function(InternalFunctionValue::Function {
            name: entry.name.clone(),
            defined_in: entry.defined_in.clone(),
            deployed_pc,
            constructor_pc,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::evm::{Contexts, ContractContext, EvmState, InternalFunctionEntry};
    use crate::format::{EnumDefinition, UserDefinedTypes};
    use std::collections::BTreeMap;

    fn word(tail: &[u8]) -> Vec<u8> {
        let mut word = vec![0u8; 32 - tail.len()];
        word.extend_from_slice(tail);
        word
    }

    fn with_context<R>(f: impl FnOnce(&DecodingContext<'_>) -> R) -> R {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        f(&context)
    }

    #[test]
    fn test_uint_and_padding() {
        with_context(|context| {
            let options = Options::default();
            let value = decode_basic_bytes(&Type::uint(8), &word(&[0xff]), context, &options).unwrap();
            assert_eq!(value, Value::uint(8, 255u8));

            let bad = decode_basic_bytes(&Type::uint(8), &word(&[1, 0xff]), context, &options).unwrap();
            assert!(matches!(bad.as_error(), Some(ValueError::Padding { padding: PaddingType::Left, .. })));

            let strict = Options {
                strict: true,
                ..Options::default()
            };
            assert!(matches!(
                decode_basic_bytes(&Type::uint(8), &word(&[1, 0xff]), context, &strict),
                Err(Interrupt::Stop { allow_retry: false, .. })
            ));

            let permissive = Options {
                padding: PaddingMode::Permissive,
                ..Options::default()
            };
            let value = decode_basic_bytes(&Type::uint(8), &word(&[1, 0xff]), context, &permissive).unwrap();
            assert_eq!(value, Value::uint(8, 255u8));
        });
    }

    #[test]
    fn test_signed_padding() {
        with_context(|context| {
            let options = Options::default();
            let mut negative = vec![0xff; 32];
            negative[31] = 0xfe;
            let value = decode_basic_bytes(&Type::int(8), &negative, context, &options).unwrap();
            assert_eq!(value, Value::int(8, -2));
            let wrong = word(&[0xfe]);
            let value = decode_basic_bytes(&Type::int(8), &wrong, context, &options).unwrap();
            assert!(matches!(value.as_error(), Some(ValueError::Padding { padding: PaddingType::Signed, .. })));
        });
    }

    #[test]
    fn test_bool_and_enum_ranges() {
        with_context(|context| {
            let options = Options::default();
            let value = decode_basic_bytes(&Type::Bool, &word(&[2]), context, &options).unwrap();
            assert!(matches!(value.as_error(), Some(ValueError::BoolOutOfRange { .. })));

            let color = Type::enum_of(&EnumDefinition {
                id: "color".to_string(),
                name: "Color".to_string(),
                options: vec!["Red".to_string(), "Green".to_string()],
            });
            let value = decode_basic_bytes(&color, &word(&[1]), context, &options).unwrap();
            assert_eq!(
                value.payload(),
                Some(&Payload::Enum {
                    index: 1,
                    name: "Green".to_string()
                })
            );
            let value = decode_basic_bytes(&color, &word(&[2]), context, &options).unwrap();
            assert!(matches!(value.as_error(), Some(ValueError::EnumOutOfRange { .. })));
        });
    }

    #[test]
    fn test_static_bytes_are_right_padded() {
        with_context(|context| {
            let mut raw = vec![0u8; 32];
            raw[0] = 0xab;
            raw[1] = 0xcd;
            let value = decode_basic_bytes(&Type::fixed_bytes(2), &raw, context, &Options::default()).unwrap();
            assert_eq!(value, Value::fixed_bytes(vec![0xab, 0xcd]));
        });
    }

    #[test]
    fn test_contract_requests_code() {
        with_context(|context| {
            let ty = Type::Contract {
                id: "c".to_string(),
                name: "C".to_string(),
                payable: false,
            };
            let result = decode_basic_bytes(&ty, &word(&[0x11; 20]), context, &Options::default());
            assert_eq!(
                result,
                Err(Interrupt::suspend(Request::Code {
                    address: Address([0x11; 20])
                }))
            );
        });
    }

    #[test]
    fn test_internal_function_lookup() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let mut table = BTreeMap::new();
        table.insert(
            0x40,
            InternalFunctionEntry {
                name: "helper".to_string(),
                defined_in: Some("Lib".to_string()),
                is_designated_invalid: false,
            },
        );
        let mut current = ContractContext::new("deployed", vec![0x60]);
        current.internal_functions = Some(table);
        let context =
            DecodingContext::new(EvmState::new(), &types, &allocations, &contexts).in_context(&current);
        let ty = Type::Function(crate::format::FunctionType {
            visibility: Visibility::Internal,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        let options = Options::default();

        let value = decode_basic_bytes(&ty, &word(&[0, 0, 0, 0x10, 0, 0, 0, 0x40]), &context, &options).unwrap();
        assert!(matches!(
            value.payload(),
            Some(Payload::Function(FunctionValue::Internal(InternalFunctionValue::Function { name, .. }))) if name == "helper"
        ));

        let value = decode_basic_bytes(&ty, &word(&[0; 8]), &context, &options).unwrap();
        assert!(matches!(
            value.payload(),
            Some(Payload::Function(FunctionValue::Internal(InternalFunctionValue::Exception { .. })))
        ));

        let value = decode_basic_bytes(&ty, &word(&[0, 0, 0, 0x10, 0, 0, 0, 0]), &context, &options).unwrap();
        assert!(matches!(value.as_error(), Some(ValueError::MalformedInternalFunction { .. })));

        let value = decode_basic_bytes(&ty, &word(&[0, 0, 0, 0, 0, 0, 0, 0x44]), &context, &options).unwrap();
        assert!(matches!(value.as_error(), Some(ValueError::NoSuchInternalFunction { .. })));
    }
}
