//! Unified error type for the crate.
//!
//! Each concern keeps its own error enum; [`Error`] wraps them so callers
//! that mix encoding, decoding and configuration can use a single `?`.

use thiserror::Error;

use crate::decoder::DecodeError;
use crate::encode::EncodeError;
use crate::format::ParseTypeError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    ParseType(#[from] ParseTypeError),

    #[cfg(feature = "config")]
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[cfg(feature = "config")]
    #[error(transparent)]
    Json(#[from] crate::json::JsonValueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_encode(&self) -> bool {
        matches!(self, Error::Encode(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    pub fn is_parse_type(&self) -> bool {
        matches!(self, Error::ParseType(_))
    }

    /// True when the decoder stopped on malformed data rather than on a
    /// misbehaving driver.
    pub fn is_malformed_data(&self) -> bool {
        matches!(self, Error::Decode(DecodeError::Stopped(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{UserDefinedTypes, ValueError, parse_type};

    #[test]
    fn test_from_parse_error() {
        let error: Error = parse_type("uint7", &UserDefinedTypes::new()).unwrap_err().into();
        assert!(error.is_parse_type());
        assert!(!error.is_decode());
    }

    #[test]
    fn test_malformed_data() {
        let error: Error = DecodeError::Stopped(ValueError::BoolOutOfRange {
            raw: 2u8.into(),
        })
        .into();
        assert!(error.is_decode());
        assert!(error.is_malformed_data());
        assert!(!Error::from(DecodeError::NotSuspended).is_malformed_data());
    }
}
