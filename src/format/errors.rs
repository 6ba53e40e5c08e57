//! Decoding failures that are carried inside values rather than thrown.
//!
//! A [`ValueError`] explains why one particular value could not be read.
//! The surrounding structure still decodes; the error sits where the value
//! would have been.

use std::fmt;

use num_bigint::BigUint;
use thiserror::Error;

use crate::evm::{ByteSource, Special};

/// How a raw word was expected to be padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingType {
    /// Zero bytes on the left (unsigned numbers, addresses).
    Left,
    /// Zero bytes on the right (static bytes, external functions).
    Right,
    /// Sign-extended on the left (signed numbers).
    Signed,
}

impl fmt::Display for PaddingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaddingType::Left => f.write_str("left"),
            PaddingType::Right => f.write_str("right"),
            PaddingType::Signed => f.write_str("signed"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Padding error: {raw} is not {padding}-padded")]
    Padding { raw: String, padding: PaddingType },

    #[error("Bool out of range: {raw}")]
    BoolOutOfRange { raw: BigUint },

    #[error("Enum value {raw} is out of range")]
    EnumOutOfRange { raw: BigUint },

    #[error("External function on stack has bad padding: address {raw_address}, selector {raw_selector}")]
    FunctionExternalStackPadding {
        raw_address: String,
        raw_selector: String,
    },

    #[error("Malformed internal function pointer (deployed pc {deployed_pc}, constructor pc {constructor_pc})")]
    MalformedInternalFunction {
        deployed_pc: u32,
        constructor_pc: u32,
    },

    #[error("No internal function at pc {deployed_pc} (constructor pc {constructor_pc})")]
    NoSuchInternalFunction {
        deployed_pc: u32,
        constructor_pc: u32,
    },

    #[error("Deployed-code function pointer {deployed_pc} seen during construction")]
    DeployedFunctionInConstructor {
        deployed_pc: u32,
        constructor_pc: u32,
    },

    #[error("Length {length} exceeds available data ({data_length} bytes)")]
    OverlongArrayOrString { length: BigUint, data_length: usize },

    #[error("Pointer {raw} is too large to follow")]
    OverlargePointer { raw: BigUint },

    #[error("Definition of {type_string} not found")]
    UserDefinedTypeNotFound { type_string: String },

    #[error("Indexed {type_string} is only available as its hash {raw}")]
    IndexedReferenceType { type_string: String, raw: String },

    #[error("Mappings can only be decoded from storage")]
    MappingNotDecodable,

    #[error("Cannot read {type_string} from {location}")]
    NotDecodableHere { type_string: String, location: String },

    #[error("Could not read stack words {from}..={to}")]
    ReadErrorStack { from: usize, to: usize },

    #[error("Could not read topic {topic}")]
    ReadErrorTopic { topic: usize },

    #[error("Could not read {length} bytes at {start} from {location}")]
    ReadErrorBytes {
        location: ByteSource,
        start: usize,
        length: usize,
    },

    #[error("Special variable {special} is not available")]
    ReadErrorSpecial { special: Special },
}

impl ValueError {
    /// Padding failures are tolerated outside strict mode; everything else is
    /// a real misreading.
    pub fn is_padding_error(&self) -> bool {
        matches!(
            self,
            ValueError::Padding { .. } | ValueError::FunctionExternalStackPadding { .. }
        )
    }

    /// Read failures mean the pointer itself was bad, so there is no value
    /// to attach the error to.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            ValueError::ReadErrorStack { .. }
                | ValueError::ReadErrorTopic { .. }
                | ValueError::ReadErrorBytes { .. }
                | ValueError::ReadErrorSpecial { .. }
        )
    }
}
