//! The value model: a decoded payload or a [`ValueError`], always paired with
//! the [`Type`] it was read as.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};

use super::errors::ValueError;
use super::types::{Type, UserDefinedTypes};
use crate::conversion::{ten_to, to_hex_string};
use crate::evm::{Address, ContractInfo, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub ty: Type,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Value(Payload),
    Error(ValueError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Uint(BigUint),
    Int(BigInt),
    Bool(bool),
    Address(Address),
    /// Static or dynamic bytes, unpadded.
    Bytes(Vec<u8>),
    String(StringValue),
    Fixed(Decimal),
    Enum { index: usize, name: String },
    Contract(ContractValue),
    Function(FunctionValue),
    Array {
        elements: Vec<Value>,
        /// Set when this array was already being decoded higher up; holds
        /// how many levels up. A circular value has no elements.
        reference: Option<usize>,
    },
    Struct {
        members: Vec<NamedValue>,
        reference: Option<usize>,
    },
    Tuple(Vec<NamedValue>),
    Mapping(Vec<MappingEntry>),
    Magic(Vec<NamedValue>),
}

impl Payload {
    /// Short tag of the payload kind, for diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            Payload::Uint(_) => "uint",
            Payload::Int(_) => "int",
            Payload::Bool(_) => "bool",
            Payload::Address(_) => "address",
            Payload::Bytes(_) => "bytes",
            Payload::String(_) => "string",
            Payload::Fixed(_) => "fixed",
            Payload::Enum { .. } => "enum",
            Payload::Contract(_) => "contract",
            Payload::Function(_) => "function",
            Payload::Array { .. } => "array",
            Payload::Struct { .. } => "struct",
            Payload::Tuple(_) => "tuple",
            Payload::Mapping(_) => "mapping",
            Payload::Magic(_) => "magic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringValue {
    Valid(String),
    /// Bytes that are not UTF-8; kept raw so they re-encode exactly.
    Malformed(Vec<u8>),
}

impl StringValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => StringValue::Valid(text),
            Err(err) => StringValue::Malformed(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StringValue::Valid(text) => text.as_bytes(),
            StringValue::Malformed(bytes) => bytes,
        }
    }
}

/// An exact decimal: `digits / 10^scale`.
#[derive(Debug, Clone, Eq)]
pub struct Decimal {
    pub digits: BigInt,
    pub scale: u32,
}

impl Decimal {
    pub fn new(digits: BigInt, scale: u32) -> Self {
        Self { digits, scale }
    }

    /// The integer `digits * 10^(places - scale)`, or `None` if that would
    /// drop nonzero digits.
    pub fn rescale(&self, places: u32) -> Option<BigInt> {
        if places >= self.scale {
            Some(&self.digits * ten_to(places - self.scale))
        } else {
            let divisor = ten_to(self.scale - places);
            let remainder = &self.digits % &divisor;
            if remainder.is_zero() {
                Some(&self.digits / divisor)
            } else {
                None
            }
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let scale = self.scale.max(other.scale);
        self.rescale(scale) == other.rescale(scale)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.digits.is_negative() { "-" } else { "" };
        let magnitude = self.digits.abs().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{magnitude}");
        }
        let padded = format!("{magnitude:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            write!(f, "{sign}{whole}")
        } else {
            write!(f, "{sign}{whole}.{fraction}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValue {
    /// Code at the address matched a known contract.
    Known { address: Address, class: ContractInfo },
    Unknown { address: Address },
}

impl ContractValue {
    pub fn address(&self) -> &Address {
        match self {
            ContractValue::Known { address, .. } | ContractValue::Unknown { address } => address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalFunctionKind {
    /// The target contract is known and has a function with this selector.
    Known { name: String },
    /// The target contract is known but has no such function.
    Invalid,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalFunctionValue {
    Function {
        name: String,
        defined_in: Option<String>,
        deployed_pc: u32,
        constructor_pc: u32,
    },
    /// The compiler's designated invalid function (an uninitialized pointer).
    Exception { deployed_pc: u32, constructor_pc: u32 },
    /// No function table was available to resolve the pointer.
    Unknown { deployed_pc: u32, constructor_pc: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionValue {
    External {
        contract: ContractValue,
        selector: Selector,
        kind: ExternalFunctionKind,
    },
    Internal(InternalFunctionValue),
}

impl Value {
    pub fn new(ty: Type, payload: Payload) -> Self {
        Self {
            ty,
            content: Content::Value(payload),
        }
    }

    pub fn error(ty: Type, error: ValueError) -> Self {
        Self {
            ty,
            content: Content::Error(error),
        }
    }

    pub fn uint(bits: u16, value: impl Into<BigUint>) -> Self {
        Self::new(Type::uint(bits), Payload::Uint(value.into()))
    }

    pub fn int(bits: u16, value: impl Into<BigInt>) -> Self {
        Self::new(Type::int(bits), Payload::Int(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Type::Bool, Payload::Bool(value))
    }

    pub fn address(address: Address) -> Self {
        Self::new(Type::address(), Payload::Address(address))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(Type::string(), Payload::String(StringValue::Valid(text.into())))
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::new(Type::bytes(), Payload::Bytes(bytes))
    }

    pub fn fixed_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len().min(32) as u8;
        Self::new(Type::fixed_bytes(length), Payload::Bytes(bytes))
    }

    /// A tuple of unnamed members; its type is built from the members' types.
    pub fn tuple(members: Vec<Value>) -> Self {
        let ty = Type::tuple(members.iter().map(|member| member.ty.clone()).collect());
        let members = members
            .into_iter()
            .map(|value| NamedValue { name: None, value })
            .collect();
        Self::new(ty, Payload::Tuple(members))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.content {
            Content::Value(payload) => Some(payload),
            Content::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ValueError> {
        match &self.content {
            Content::Error(error) => Some(error),
            Content::Value(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.content, Content::Error(_))
    }

    /// True when this value or anything inside it is an error.
    pub fn contains_error(&self) -> bool {
        match &self.content {
            Content::Error(_) => true,
            Content::Value(payload) => match payload {
                Payload::Array { elements, .. } => elements.iter().any(Value::contains_error),
                Payload::Struct { members, .. } | Payload::Tuple(members) | Payload::Magic(members) => {
                    members.iter().any(|member| member.value.contains_error())
                }
                Payload::Mapping(entries) => entries
                    .iter()
                    .any(|entry| entry.key.contains_error() || entry.value.contains_error()),
                _ => false,
            },
        }
    }

    /// Convert to the ABI-only view: structs become tuples, enums become
    /// unsigned integers and contracts become addresses.
    ///
    /// Enum values that were out of range are recovered as plain integers,
    /// since in the ABI view any integer is valid.
    pub fn abify(&self, user_defined_types: &UserDefinedTypes) -> Value {
        let ty = self.ty.abify(user_defined_types).unwrap_or_else(|| self.ty.clone());
        let payload = match &self.content {
            Content::Error(ValueError::EnumOutOfRange { raw }) => {
                return Value::new(ty, Payload::Uint(raw.clone()));
            }
            Content::Error(error) => return Value::error(ty, error.clone()),
            Content::Value(payload) => payload,
        };
        let payload = match payload {
            Payload::Enum { index, .. } => Payload::Uint(BigUint::from(*index)),
            Payload::Contract(contract) => Payload::Address(*contract.address()),
            Payload::Struct { members, .. } => Payload::Tuple(abify_members(members, user_defined_types)),
            Payload::Tuple(members) => Payload::Tuple(abify_members(members, user_defined_types)),
            Payload::Array {
                elements,
                reference,
            } => Payload::Array {
                elements: elements
                    .iter()
                    .map(|element| element.abify(user_defined_types))
                    .collect(),
                reference: *reference,
            },
            other => other.clone(),
        };
        Value::new(ty, payload)
    }
}

fn abify_members(members: &[NamedValue], user_defined_types: &UserDefinedTypes) -> Vec<NamedValue> {
    members
        .iter()
        .map(|member| NamedValue {
            name: member.name.clone(),
            value: member.value.abify(user_defined_types),
        })
        .collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.content {
            Content::Error(error) => return write!(f, "<error: {error}>"),
            Content::Value(payload) => payload,
        };
        match payload {
            Payload::Uint(value) => write!(f, "{value}"),
            Payload::Int(value) => write!(f, "{value}"),
            Payload::Bool(value) => write!(f, "{value}"),
            Payload::Address(address) => write!(f, "{address}"),
            Payload::Bytes(bytes) => f.write_str(&to_hex_string(bytes)),
            Payload::String(StringValue::Valid(text)) => write!(f, "{text:?}"),
            Payload::String(StringValue::Malformed(bytes)) => {
                write!(f, "<malformed string {}>", to_hex_string(bytes))
            }
            Payload::Fixed(decimal) => write!(f, "{decimal}"),
            Payload::Enum { name, .. } => match &self.ty {
                Type::Enum { name: enum_name, .. } => write!(f, "{enum_name}.{name}"),
                _ => f.write_str(name),
            },
            Payload::Contract(ContractValue::Known { address, class }) => match &class.name {
                Some(name) => write!(f, "{name}({address})"),
                None => write!(f, "{address}"),
            },
            Payload::Contract(ContractValue::Unknown { address }) => write!(f, "{address}"),
            Payload::Function(FunctionValue::External {
                contract,
                selector,
                kind,
            }) => match kind {
                ExternalFunctionKind::Known { name } => {
                    write!(f, "{}.{name}", Value::new(Type::address(), Payload::Contract(contract.clone())))
                }
                _ => write!(f, "{}.{}", contract.address(), to_hex_string(selector)),
            },
            Payload::Function(FunctionValue::Internal(internal)) => match internal {
                InternalFunctionValue::Function {
                    name, defined_in, ..
                } => match defined_in {
                    Some(contract) => write!(f, "{contract}.{name}"),
                    None => f.write_str(name),
                },
                InternalFunctionValue::Exception { .. } => f.write_str("assert(false)"),
                InternalFunctionValue::Unknown {
                    deployed_pc,
                    constructor_pc,
                } => write!(f, "<internal function {deployed_pc}/{constructor_pc}>"),
            },
            Payload::Array {
                reference: Some(_), ..
            }
            | Payload::Struct {
                reference: Some(_), ..
            } => f.write_str("[Circular]"),
            Payload::Array { elements, .. } => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Payload::Struct { members, .. } => {
                let name = match &self.ty {
                    Type::Struct { name, .. } => name.as_str(),
                    _ => "",
                };
                write!(f, "{name} {{")?;
                write_members(f, members)?;
                f.write_str(" }")
            }
            Payload::Tuple(members) => {
                f.write_str("(")?;
                write_members(f, members)?;
                f.write_str(")")
            }
            Payload::Magic(members) => {
                f.write_str("{")?;
                write_members(f, members)?;
                f.write_str(" }")
            }
            Payload::Mapping(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    let separator = if i > 0 { ", " } else { " " };
                    write!(f, "{separator}{} => {}", entry.key, entry.value)?;
                }
                f.write_str(" }")
            }
        }
    }
}

fn write_members(f: &mut fmt::Formatter<'_>, members: &[NamedValue]) -> fmt::Result {
    for (i, member) in members.iter().enumerate() {
        let separator = if i > 0 { ", " } else { " " };
        match &member.name {
            Some(name) => write!(f, "{separator}{name}: {}", member.value)?,
            None if i > 0 => write!(f, ", {}", member.value)?,
            None => write!(f, "{}", member.value)?,
        }
    }
    Ok(())
}
