//! Type-directed decoding of raw bytes into [`Value`]s.
//!
//! # Module Organization
//!
//! - [`basic`]: value types from a single word (or less)
//! - [`abi`]: the head/tail layout used by calldata, event data and return data
//! - [`memory`]: memory pointers and in-memory layouts
//! - [`storage`]: packed storage layouts, dynamic arrays, strings and mappings
//! - [`stack`]: stack words, including pointers into other locations
//! - [`topic`]: indexed event parameters
//! - [`special`]: `msg`, `tx`, `block` and friends
//!
//! Every function here is a pure function of the decoding context. When
//! data is missing it returns [`Interrupt::Suspend`]; the driver answers
//! the requests and the decode runs again with the answers cached.
//! Independent parts of a value (array elements, struct members, the words
//! of a storage range) are all visited before suspending, so one pass
//! gathers every request they need.

pub(crate) mod abi;
pub(crate) mod basic;
pub(crate) mod memory;
pub(crate) mod special;
pub(crate) mod stack;
pub(crate) mod storage;
pub(crate) mod topic;

use crate::decoder::{DecodingContext, Request};
use crate::evm::ByteSource;
use crate::format::{Type, Value, ValueError};
use crate::pointer::DataPointer;

/// Why a decode step did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// External data is needed before decoding can go on. Never empty.
    Suspend(Vec<Request>),
    /// A pointer could not be read. Callers that can attach the error to a
    /// value do so; otherwise it ends the decode.
    Read(ValueError),
    /// Strict-mode failure. `allow_retry` marks failures that may succeed
    /// when the same bytes are decoded in ABI mode.
    Stop { error: ValueError, allow_retry: bool },
}

impl Interrupt {
    pub(crate) fn suspend(request: Request) -> Self {
        Interrupt::Suspend(vec![request])
    }
}

pub(crate) type Step<T> = Result<T, Interrupt>;

/// Decode parts that do not depend on each other's data.
///
/// A part that suspends does not stop the others: their requests are merged
/// (adjacent duplicates dropped, as packed parts share a word) and returned
/// together once every part has been tried. Any other interrupt ends the
/// walk.
pub(crate) fn decode_parts<P, T>(
    parts: impl IntoIterator<Item = P>,
    mut decode_part: impl FnMut(P) -> Step<T>,
) -> Step<Vec<T>> {
    let mut values = Vec::new();
    let mut pending: Vec<Request> = Vec::new();
    for part in parts {
        match decode_part(part) {
            Ok(value) => {
                if pending.is_empty() {
                    values.push(value);
                }
            }
            Err(Interrupt::Suspend(requests)) => {
                for request in requests {
                    if pending.last() != Some(&request) {
                        pending.push(request);
                    }
                }
            }
            Err(other) => return Err(other),
        }
    }
    if pending.is_empty() {
        Ok(values)
    } else {
        Err(Interrupt::Suspend(pending))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PaddingMode {
    #[default]
    Checked,
    /// Ignore padding bytes entirely.
    Permissive,
}

/// Per-call decoding options, threaded through recursive calls.
#[derive(Debug, Clone, Default)]
pub(crate) struct Options {
    pub padding: PaddingMode,
    /// Reject anything that would not re-encode to the same bytes.
    pub strict: bool,
    /// Report missing struct layouts as retryable stops.
    pub allow_retry: bool,
    /// Where ABI offsets are measured from.
    pub abi_pointer_base: usize,
    /// Length of a dynamic value known in advance (calldata pointers on the
    /// stack carry their own length).
    pub length_override: Option<usize>,
    /// Memory addresses of the arrays and structs enclosing this value,
    /// innermost first.
    pub memory_visited: Vec<usize>,
}

/// Decode a value of type `ty` from wherever `pointer` points.
pub(crate) fn decode(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match pointer {
        DataPointer::Storage(range) => storage::decode_storage(ty, range, context, options),
        DataPointer::Stack { .. } => stack::decode_stack(ty, pointer, context, options),
        DataPointer::StackLiteral(literal) => stack::decode_literal(ty, literal, context, options),
        DataPointer::Literal(bytes) => basic::decode_constant(ty, bytes, context, options),
        DataPointer::EventTopic { .. } => topic::decode_topic(ty, pointer, context, options),
        DataPointer::Special(special) => special::decode_special(ty, *special, context, options),
        DataPointer::Bytes { source, .. } => match source {
            ByteSource::Memory => memory::decode_memory(ty, pointer, context, options),
            ByteSource::Calldata | ByteSource::EventData | ByteSource::Returndata => {
                abi::decode_abi(ty, pointer, context, options)
            }
            ByteSource::Code | ByteSource::Stack | ByteSource::EventTopics => {
                basic::decode_basic(ty, pointer, context, options)
            }
        },
    }
}

/// Attach an error to a value, or stop outright in strict mode.
pub(crate) fn error_value(ty: &Type, error: ValueError, options: &Options) -> Step<Value> {
    if options.strict {
        Err(Interrupt::Stop {
            error,
            allow_retry: false,
        })
    } else {
        Ok(Value::error(ty.clone(), error))
    }
}

/// A missing struct layout: retryable in ABI mode when the caller allows it.
pub(crate) fn missing_definition(ty: &Type, options: &Options) -> Step<Value> {
    let error = ValueError::UserDefinedTypeNotFound {
        type_string: ty.type_string(),
    };
    if options.strict || options.allow_retry {
        Err(Interrupt::Stop {
            error,
            allow_retry: true,
        })
    } else {
        Ok(Value::error(ty.clone(), error))
    }
}

/// Read through a pointer, turning read errors into error values.
pub(crate) fn read_or_error(
    ty: &Type,
    pointer: &DataPointer,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Result<Vec<u8>, Value>> {
    match crate::read::read(pointer, &context.state) {
        Ok(bytes) => Ok(Ok(bytes)),
        Err(Interrupt::Read(error)) => error_value(ty, error, options).map(Err),
        Err(other) => Err(other),
    }
}

pub(crate) fn not_decodable_here(ty: &Type, pointer: &DataPointer, options: &Options) -> Step<Value> {
    error_value(
        ty,
        ValueError::NotDecodableHere {
            type_string: ty.type_string(),
            location: pointer.location_name(),
        },
        options,
    )
}
