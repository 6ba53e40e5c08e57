//! Type and value models shared by the encoder and the decoder.
//!
//! # Module Organization
//!
//! - [`types`]: the [`Type`] model and user-defined type definitions
//! - [`values`]: decoded [`Value`]s and their payloads
//! - [`errors`]: [`ValueError`], decoding failures carried as data
//! - [`parse`]: type-description parser

pub mod errors;
pub mod parse;
pub mod types;
pub mod values;

pub use errors::{PaddingType, ValueError};
pub use parse::{ParseTypeError, parse_signature, parse_type};
pub use types::{
    ArrayKind, BytesKind, EnumDefinition, FunctionType, Location, MagicVariable, MemberType,
    StructDefinition, StructMember, Type, TypeId, UserDefinedTypes, Visibility, enum_width,
};
pub use values::{
    Content, ContractValue, Decimal, ExternalFunctionKind, FunctionValue, InternalFunctionValue,
    MappingEntry, NamedValue, Payload, StringValue, Value,
};
