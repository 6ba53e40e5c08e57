//! Indexed event parameters.
//!
//! Value types sit in a topic exactly as in the ABI. Reference types are
//! replaced by the hash of their encoding, which cannot be inverted.

use super::basic::decode_basic;
use super::{Options, Step, read_or_error};
use crate::conversion::to_hex_string;
use crate::decoder::DecodingContext;
use crate::format::{Type, Value, ValueError};
use crate::pointer::DataPointer;

pub(crate) fn decode_topic(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    if !ty.is_reference() && !matches!(ty, Type::Tuple { .. }) {
        return decode_basic(ty, pointer, context, options);
    }
    let raw = match read_or_error(ty, pointer, context, options)? {
        Ok(raw) => raw,
        Err(value) => return Ok(value),
    };
    Ok(Value::error(
        ty.clone(),
        ValueError::IndexedReferenceType {
            type_string: ty.type_string(),
            raw: to_hex_string(&raw),
        },
    ))
}
