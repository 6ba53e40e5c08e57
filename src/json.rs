//! JSON literals for building values by type.
//!
//! Integers may be JSON numbers or decimal / `0x` hex strings, fixed-point
//! numbers are decimal strings, bytes and addresses are hex strings, enums
//! are option names or indices, arrays and tuples are JSON arrays, and
//! structs are objects keyed by member name.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Num;
use serde_json::Value as Json;
use thiserror::Error;

use crate::conversion::from_hex;
use crate::evm::{ADDRESS_SIZE, Address, SELECTOR_SIZE, Selector};
use crate::format::{
    ArrayKind, BytesKind, ContractValue, Decimal, ExternalFunctionKind, FunctionValue, NamedValue,
    Payload, StringValue, Type, UserDefinedTypes, Value, Visibility,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonValueError {
    #[error("Expected {expected} for {type_string}, got {got}")]
    Mismatch {
        expected: &'static str,
        type_string: String,
        got: String,
    },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Invalid hex '{0}'")]
    InvalidHex(String),

    #[error("Expected {expected} elements for {type_string}, got {got}")]
    WrongLength {
        type_string: String,
        expected: usize,
        got: usize,
    },

    #[error("No option '{option}' in {type_string}")]
    UnknownOption { type_string: String, option: String },

    #[error("Missing member '{member}' of {type_string}")]
    MissingMember { type_string: String, member: String },

    #[error("Definition of {0} not found")]
    UnknownUserDefinedType(String),

    #[error("{0} values cannot be written as JSON literals")]
    Unsupported(String),
}

type Result<T> = std::result::Result<T, JsonValueError>;

/// Build a [`Value`] of type `ty` from a JSON literal.
pub fn value_from_json(ty: &Type, json: &Json, user_defined_types: &UserDefinedTypes) -> Result<Value> {
    let payload = match ty {
        Type::Uint { .. } => Payload::Uint(uint_from_json(ty, json)?),
        Type::Int { .. } => Payload::Int(int_from_json(ty, json)?),
        Type::Fixed { .. } | Type::Ufixed { .. } => Payload::Fixed(decimal_from_json(ty, json)?),
        Type::Bool => Payload::Bool(
            json.as_bool()
                .ok_or_else(|| mismatch("a boolean", ty, json))?,
        ),
        Type::Address { .. } => Payload::Address(address_from_json(ty, json)?),
        Type::Contract { .. } => Payload::Contract(ContractValue::Unknown {
            address: address_from_json(ty, json)?,
        }),
        Type::Bytes { kind, .. } => {
            let bytes = hex_from_json(ty, json)?;
            if let BytesKind::Static { length } = kind {
                if bytes.len() != usize::from(*length) {
                    return Err(JsonValueError::WrongLength {
                        type_string: ty.type_string(),
                        expected: usize::from(*length),
                        got: bytes.len(),
                    });
                }
            }
            Payload::Bytes(bytes)
        }
        Type::String { .. } => Payload::String(StringValue::Valid(
            json.as_str()
                .ok_or_else(|| mismatch("a string", ty, json))?
                .to_string(),
        )),
        Type::Enum { options, .. } => {
            let index = match json {
                Json::String(option) => options.iter().position(|candidate| candidate == option).ok_or_else(|| {
                    JsonValueError::UnknownOption {
                        type_string: ty.type_string(),
                        option: option.clone(),
                    }
                })?,
                Json::Number(number) => number
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .filter(|index| *index < options.len())
                    .ok_or_else(|| JsonValueError::UnknownOption {
                        type_string: ty.type_string(),
                        option: number.to_string(),
                    })?,
                other => return Err(mismatch("an option name or index", ty, other)),
            };
            Payload::Enum {
                index,
                name: options.get(index).cloned().unwrap_or_default(),
            }
        }
        Type::Array { base, kind, .. } => {
            let items = json.as_array().ok_or_else(|| mismatch("an array", ty, json))?;
            if let ArrayKind::Static { length } = kind {
                if items.len() != *length {
                    return Err(JsonValueError::WrongLength {
                        type_string: ty.type_string(),
                        expected: *length,
                        got: items.len(),
                    });
                }
            }
            let elements = items
                .iter()
                .map(|item| value_from_json(base, item, user_defined_types))
                .collect::<Result<Vec<_>>>()?;
            Payload::Array {
                elements,
                reference: None,
            }
        }
        Type::Struct { id, location, .. } => {
            let definition = user_defined_types
                .struct_definition(id)
                .ok_or_else(|| JsonValueError::UnknownUserDefinedType(ty.type_string()))?;
            let members = definition
                .members
                .iter()
                .enumerate()
                .map(|(position, member)| {
                    let member_ty = member.ty.specify_location(*location);
                    let item = member_json(ty, json, &member.name, position)?;
                    Ok(NamedValue {
                        name: Some(member.name.clone()),
                        value: value_from_json(&member_ty, item, user_defined_types)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Struct {
                members,
                reference: None,
            }
        }
        Type::Tuple { members } => {
            let members = members
                .iter()
                .enumerate()
                .map(|(position, member)| {
                    let item = match &member.name {
                        Some(name) => member_json(ty, json, name, position)?,
                        None => json
                            .as_array()
                            .ok_or_else(|| mismatch("an array", ty, json))?
                            .get(position)
                            .ok_or_else(|| JsonValueError::MissingMember {
                                type_string: ty.type_string(),
                                member: position.to_string(),
                            })?,
                    };
                    Ok(NamedValue {
                        name: member.name.clone(),
                        value: value_from_json(&member.ty, item, user_defined_types)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Tuple(members)
        }
        Type::Function(function) if function.visibility == Visibility::External => {
            let bytes = hex_from_json(ty, json)?;
            let (address, selector) = bytes.split_at_checked(ADDRESS_SIZE).ok_or_else(|| JsonValueError::WrongLength {
                type_string: ty.type_string(),
                expected: ADDRESS_SIZE + SELECTOR_SIZE,
                got: bytes.len(),
            })?;
            let selector: Selector = selector.try_into().map_err(|_| JsonValueError::WrongLength {
                type_string: ty.type_string(),
                expected: ADDRESS_SIZE + SELECTOR_SIZE,
                got: bytes.len(),
            })?;
            Payload::Function(FunctionValue::External {
                contract: ContractValue::Unknown {
                    address: Address::from_slice(address).unwrap_or_default(),
                },
                selector,
                kind: ExternalFunctionKind::Unknown,
            })
        }
        Type::Function(_) | Type::Mapping { .. } | Type::Magic { .. } => {
            return Err(JsonValueError::Unsupported(ty.type_string()));
        }
    };
    Ok(Value::new(ty.clone(), payload))
}

/// Struct and named-tuple members come from an object by name or from an
/// array by position.
fn member_json<'j>(ty: &Type, json: &'j Json, name: &str, position: usize) -> Result<&'j Json> {
    let found = match json {
        Json::Object(fields) => fields.get(name),
        Json::Array(items) => items.get(position),
        other => return Err(mismatch("an object or array", ty, other)),
    };
    found.ok_or_else(|| JsonValueError::MissingMember {
        type_string: ty.type_string(),
        member: name.to_string(),
    })
}

fn number_text<'j>(ty: &Type, json: &'j Json) -> Result<std::borrow::Cow<'j, str>> {
    match json {
        Json::Number(number) => Ok(std::borrow::Cow::Owned(number.to_string())),
        Json::String(text) => Ok(std::borrow::Cow::Borrowed(text.trim())),
        other => Err(mismatch("a number", ty, other)),
    }
}

fn uint_from_json(ty: &Type, json: &Json) -> Result<BigUint> {
    let text = number_text(ty, json)?;
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => BigUint::from_str_radix(hex, 16),
        None => BigUint::from_str_radix(&text, 10),
    };
    parsed.map_err(|_| JsonValueError::InvalidNumber(text.to_string()))
}

fn int_from_json(ty: &Type, json: &Json) -> Result<BigInt> {
    let text = number_text(ty, json)?;
    let (sign, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (Sign::Minus, rest),
        None => (Sign::Plus, text.as_ref()),
    };
    let magnitude = uint_from_json(ty, &Json::String(magnitude.to_string()))
        .map_err(|_| JsonValueError::InvalidNumber(text.to_string()))?;
    Ok(BigInt::from_biguint(sign, magnitude))
}

fn decimal_from_json(ty: &Type, json: &Json) -> Result<Decimal> {
    let text = number_text(ty, json)?;
    let invalid = || JsonValueError::InvalidNumber(text.to_string());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_ref(), ""));
    if fraction.starts_with('-') || fraction.starts_with('+') {
        return Err(invalid());
    }
    let digits = BigInt::from_str_radix(&format!("{whole}{fraction}"), 10).map_err(|_| invalid())?;
    let scale = u32::try_from(fraction.len()).map_err(|_| invalid())?;
    Ok(Decimal::new(digits, scale))
}

fn hex_from_json(ty: &Type, json: &Json) -> Result<Vec<u8>> {
    let text = json.as_str().ok_or_else(|| mismatch("a hex string", ty, json))?;
    from_hex(text).map_err(|_| JsonValueError::InvalidHex(text.to_string()))
}

fn address_from_json(ty: &Type, json: &Json) -> Result<Address> {
    let bytes = hex_from_json(ty, json)?;
    Address::from_slice(&bytes).ok_or_else(|| JsonValueError::WrongLength {
        type_string: ty.type_string(),
        expected: ADDRESS_SIZE,
        got: bytes.len(),
    })
}

fn mismatch(expected: &'static str, ty: &Type, json: &Json) -> JsonValueError {
    JsonValueError::Mismatch {
        expected,
        type_string: ty.type_string(),
        got: json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{StructDefinition, parse_type};
    use serde_json::json;

    #[test]
    fn test_numbers() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        assert_eq!(value_from_json(&Type::uint(256), &json!(42), &types)?, Value::uint(256, 42u8));
        assert_eq!(value_from_json(&Type::uint(256), &json!("0x2a"), &types)?, Value::uint(256, 42u8));
        assert_eq!(value_from_json(&Type::int(8), &json!("-3"), &types)?, Value::int(8, -3));
        assert!(value_from_json(&Type::uint(8), &json!("ten"), &types).is_err());
        Ok(())
    }

    #[test]
    fn test_fixed_point() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        let ty = parse_type("fixed128x18", &types)?;
        let value = value_from_json(&ty, &json!("-1.25"), &types)?;
        assert_eq!(value.payload(), Some(&Payload::Fixed(Decimal::new(BigInt::from(-125), 2))));
        Ok(())
    }

    #[test]
    fn test_bytes_and_addresses() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        let value = value_from_json(&Type::bytes(), &json!("0xdeadbeef"), &types)?;
        assert_eq!(value, Value::bytes(vec![0xde, 0xad, 0xbe, 0xef]));
        assert!(matches!(
            value_from_json(&Type::fixed_bytes(2), &json!("0x01"), &types),
            Err(JsonValueError::WrongLength { expected: 2, got: 1, .. })
        ));
        let address = value_from_json(&Type::address(), &json!("0x00000000000000000000000000000000000000ff"), &types)?;
        assert!(matches!(address.payload(), Some(Payload::Address(found)) if found.0[19] == 0xff));
        Ok(())
    }

    #[test]
    fn test_struct_from_object() -> anyhow::Result<()> {
        let mut types = UserDefinedTypes::new();
        let pair = StructDefinition::new("Pair", "Pair")
            .member("a", Type::uint(8))
            .member("b", Type::string());
        types.insert_struct(pair.clone());
        let ty = Type::struct_of(&pair);
        let value = value_from_json(&ty, &json!({"a": 1, "b": "x"}), &types)?;
        assert_eq!(value.to_string(), "Pair { a: 1, b: \"x\" }");
        assert!(matches!(
            value_from_json(&ty, &json!({"a": 1}), &types),
            Err(JsonValueError::MissingMember { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_enum_by_name_and_index() -> anyhow::Result<()> {
        let ty = Type::Enum {
            id: "Color".to_string(),
            name: "Color".to_string(),
            options: vec!["Red".to_string(), "Green".to_string()],
        };
        let types = UserDefinedTypes::new();
        let by_name = value_from_json(&ty, &json!("Green"), &types)?;
        let by_index = value_from_json(&ty, &json!(1), &types)?;
        assert_eq!(by_name, by_index);
        assert!(value_from_json(&ty, &json!(2), &types).is_err());
        Ok(())
    }

    #[test]
    fn test_static_array_length() {
        let types = UserDefinedTypes::new();
        let ty = Type::array(Type::uint(8), 2);
        assert!(value_from_json(&ty, &json!([1, 2]), &types).is_ok());
        assert!(matches!(
            value_from_json(&ty, &json!([1]), &types),
            Err(JsonValueError::WrongLength { .. })
        ));
    }

    #[test]
    fn test_mapping_is_unsupported() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        let ty = parse_type("mapping(uint256 => uint256)", &types)?;
        assert!(matches!(
            value_from_json(&ty, &json!({}), &types),
            Err(JsonValueError::Unsupported(_))
        ));
        Ok(())
    }
}
