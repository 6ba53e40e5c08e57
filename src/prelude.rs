//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use evm_codec::prelude::*;
//!
//! let types = UserDefinedTypes::new();
//! let allocations = Allocations::new(&types);
//! let encoded = encode_abi(&Value::uint(256, 1u8), &allocations.abi);
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Types and values
pub use crate::format::{
    Location, NamedValue, Payload, StructDefinition, EnumDefinition, Type, UserDefinedTypes,
    Value, ValueError, parse_type,
};

// Layouts
pub use crate::allocate::{Allocations, ContractAbi, DecodingMode, EventEntry, FunctionEntry, Parameter};

// Encoding
pub use crate::encode::{
    EncodeError, encode_abi, encode_mapping_key, encode_tuple_abi, key_info_for_printing,
    mapping_slot,
};

// Machine state and contracts
pub use crate::evm::{Address, ContractContext, Contexts, EvmState, Special};
pub use crate::pointer::{DataPointer, Slot, slot_address};

// Decoding
pub use crate::decoder::{
    CalldataDecoding, DecodeError, Decoder, DecoderOptions, DecoderState, DecodingContext,
    EventOptions, LogDecoding, Request, Response, ReturnDecoding, decode_calldata, decode_event,
    decode_return, decode_value, decode_variable,
};
pub use crate::{decode_abi_bytes, decode_abi_bytes_with};

// Project files and JSON literals (requires "config" feature)
#[cfg(feature = "config")]
pub use crate::config::{Config, ConfigError};
#[cfg(feature = "config")]
pub use crate::json::{JsonValueError, value_from_json};
