//! Encoders: ABI head/tail layout and mapping-key encoding.
//!
//! # Module Organization
//!
//! - [`abi`]: ABI encoding of values and tuples
//! - [`mapping_key`]: the unpadded encoding hashed into mapping slots
//! - [`error`]: [`EncodeError`], the reasons a value is not encodable
//!
//! Encoding never suspends: every operand is already in hand.

pub mod abi;
mod error;
pub mod mapping_key;

pub use abi::{encode_abi, encode_basic, encode_topic, encode_tuple_abi, pad_and_prepend_length, try_encode_abi};
pub use error::EncodeError;
pub use mapping_key::{KeyInfo, encode_mapping_key, key_info_for_printing, mapping_slot};
