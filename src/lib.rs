//! Type-directed codec for EVM values.
//!
//! This library encodes values the way the Solidity ABI and storage layout
//! do, and decodes raw EVM data (stack, memory, storage, calldata, event
//! logs, return data) back into typed values. Decoding is resumable: when a
//! decoder needs a storage word, contract code or a byte range it does not
//! have, it stops with a request and continues once the caller answers.
//!
//! # Quick Start
//!
//! ```ignore
//! use evm_codec::prelude::*;
//!
//! let types = UserDefinedTypes::new();
//! let allocations = Allocations::new(&types);
//! let contexts = Contexts::new();
//! let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
//!
//! let mut decoder = decode_variable("uint256", DataPointer::storage(Slot::new(0u8)), context)?;
//! while let Some(request) = decoder.pending_request().cloned() {
//!     decoder.resume(fetch(&request))?;
//! }
//! let value = decoder.finish()?;
//! ```
//!
//! # Modules
//!
//! - [`format`] - Types, values and the type-description parser
//! - [`allocate`] - ABI, memory, storage, calldata and event layouts
//! - [`encode`] - ABI and mapping-key encoding
//! - [`pointer`] - Data pointers and storage slot addressing
//! - [`decoder`] - Resumable decoders for variables, calldata, events and return data
//! - [`evm`] - Addresses, machine state and contract contexts
//! - [`conversion`] - Word, integer and hex helpers
//! - [`config`] - TOML project files (requires `config` feature)
//! - [`json`] - JSON value literals (requires `config` feature)
//!
//! # Feature Flags
//!
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `config` - Enable TOML project files and JSON value literals
//! - `cli` - Enable the command-line interface binary
//! - `full` - Enable all features

pub mod allocate;
pub mod conversion;
mod decode;
pub mod decoder;
pub mod encode;
pub mod evm;
pub mod format;
mod logging;
pub mod pointer;
pub mod prelude;
mod read;

#[cfg(feature = "config")]
pub mod config;
#[cfg(feature = "config")]
pub mod json;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export the decoding entry points at crate root for convenience
pub use decoder::{
    CalldataDecoding, DecodeError, Decoder, DecoderOptions, DecoderState, DecodingContext,
    EventOptions, LogDecoding, MAX_STORAGE_WORDS, Request, Response, ReturnDecoding, decode_calldata,
    decode_event, decode_return, decode_value, decode_variable,
};

// Re-export encoding entry points
pub use encode::{EncodeError, encode_abi, encode_mapping_key, encode_tuple_abi, key_info_for_printing};

// Re-export the core models
pub use format::{Type, UserDefinedTypes, Value, parse_type};

/// Decode the ABI encoding of a single argument of type `ty`, the form
/// produced by [`encode_tuple_abi`] on a one-element list: dynamic values
/// start with an offset word.
///
/// The bytes are treated as resident calldata at offset zero, so no request
/// can arise.
///
/// # Example
///
/// ```ignore
/// let value = evm_codec::decode_abi_bytes(&Type::uint(256), &bytes, &types, &allocations)?;
/// ```
pub fn decode_abi_bytes(
    ty: &Type,
    bytes: &[u8],
    user_defined_types: &UserDefinedTypes,
    allocations: &allocate::Allocations,
) -> Result<Value> {
    decode_abi_bytes_with(ty, bytes, user_defined_types, allocations, DecoderOptions::default())
}

/// [`decode_abi_bytes`] with explicit decoder options.
pub fn decode_abi_bytes_with(
    ty: &Type,
    bytes: &[u8],
    user_defined_types: &UserDefinedTypes,
    allocations: &allocate::Allocations,
    options: DecoderOptions,
) -> Result<Value> {
    let abi_ty = ty.specify_location(Some(format::Location::Calldata));
    let length = allocate::abi_size_info(&abi_ty, &allocations.abi)
        .map(|info| info.size)
        .ok_or_else(|| Error::Other(format!("No ABI layout for {}", ty.type_string())))?;
    let contexts = evm::Contexts::new();
    let state = evm::EvmState::new().with_calldata(bytes.to_vec());
    let context = DecodingContext::new(state, user_defined_types, allocations, &contexts).with_options(options);
    let decoder = decode_value(abi_ty, pointer::DataPointer::calldata(0, length), context);
    Ok(decoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;

    #[test]
    fn test_decode_abi_bytes_round_trip() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let ty = parse_type("(uint8,string)", &types)?;
        let value = Value::tuple(vec![Value::uint(8, 7u8), Value::string("hi")]);
        let bytes = encode_tuple_abi(&[value], &allocations.abi).unwrap_or_default();
        let decoded = decode_abi_bytes(&ty, &bytes, &types, &allocations)?;
        assert_eq!(decoded.to_string(), "(7, \"hi\")");
        Ok(())
    }

    #[test]
    fn test_decode_abi_bytes_strict_padding() -> anyhow::Result<()> {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let mut word = vec![0u8; 32];
        word[0] = 1;
        word[31] = 1;
        let lenient = decode_abi_bytes(&Type::uint(8), &word, &types, &allocations)?;
        assert!(lenient.is_error());
        let strict = DecoderOptions {
            strict_abi_mode: true,
            ..DecoderOptions::default()
        };
        let error = decode_abi_bytes_with(&Type::uint(8), &word, &types, &allocations, strict).unwrap_err();
        assert!(error.is_malformed_data());
        Ok(())
    }
}
