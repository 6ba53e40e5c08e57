//! Terminal decoder failures.

use thiserror::Error;

use crate::format::ValueError;

/// Why a decoder ended without a result.
///
/// Recoverable problems (bad padding, out-of-range enums and the like) are
/// not errors at this level: outside strict mode they are embedded in the
/// decoded value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Decoding stopped: {0}")]
    Stopped(ValueError),

    #[error("Unexpected response to request for {request}: got {detail}")]
    UnexpectedResponse { request: String, detail: String },

    #[error("Decoder is not waiting for data")]
    NotSuspended,

    #[error("Decoder is still waiting for {0}")]
    Incomplete(String),
}

impl DecodeError {
    /// True if the decoder was fed something other than what it asked for.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            DecodeError::UnexpectedResponse { .. } | DecodeError::NotSuspended | DecodeError::Incomplete(_)
        )
    }
}
