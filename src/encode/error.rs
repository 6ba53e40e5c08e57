//! Reasons a value cannot be encoded.

use thiserror::Error;

/// Why a value has no ABI or mapping-key encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Mappings have no ABI encoding")]
    Mapping,

    #[error("Internal functions have no ABI encoding")]
    InternalFunction,

    #[error("Magic variables have no ABI encoding")]
    Magic,

    #[error("Circular values have no ABI encoding")]
    Circular,

    #[error("Value contains an error: {0}")]
    ErrorValue(String),

    #[error("No allocation for {0}")]
    UnknownUserDefinedType(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value {value} does not fit in {type_string}")]
    Overflow { value: String, type_string: String },

    #[error("Value {value} has more decimal places than {type_string} allows")]
    PrecisionLoss { value: String, type_string: String },
}
