//! Return data and revert payloads.
//!
//! Successful return data is decoded against the output layout of the
//! function that produced it. Failing return data is tried against the
//! built-in `Error(string)` and `Panic(uint256)` payloads. Either way a
//! decoding only counts if re-encoding it reproduces the data exactly.

use super::arguments::{ArgumentSpec, decode_arguments};
use super::{Decoder, DecodingContext};
use crate::allocate::{DecodingMode, ReturndataAllocation, ReturndataKind, builtin_revert_allocations};
use crate::decode::{Interrupt, Options, Step};
use crate::encode::encode_tuple_abi;
use crate::evm::{ByteSource, SELECTOR_SIZE, Selector};
use crate::format::{NamedValue, ValueError};
use crate::logging::debug;
use crate::pointer::DataPointer;

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnDecoding {
    /// Values returned by a successful call.
    Return {
        arguments: Vec<NamedValue>,
        mode: DecodingMode,
    },
    /// A recognised revert payload.
    Revert {
        name: String,
        abi_signature: String,
        arguments: Vec<NamedValue>,
        mode: DecodingMode,
    },
    /// A failed call with no return data.
    Failure,
    Unknown { data: Vec<u8> },
}

impl ReturnDecoding {
    pub fn kind(&self) -> &'static str {
        match self {
            ReturnDecoding::Return { .. } => "return",
            ReturnDecoding::Revert { .. } => "revert",
            ReturnDecoding::Failure => "failure",
            ReturnDecoding::Unknown { .. } => "unknown",
        }
    }
}

/// Decode the resident return data of a call.
///
/// `selector` names the function that was called; it is only consulted when
/// `success` is set.
pub fn decode_return<'a>(
    context: DecodingContext<'a>,
    selector: Option<Selector>,
    success: bool,
) -> Decoder<'a, ReturnDecoding> {
    Decoder::start(context, move |context| decode_return_step(context, selector, success))
}

fn decode_return_step(
    context: &DecodingContext<'_>,
    selector: Option<Selector>,
    success: bool,
) -> Step<ReturnDecoding> {
    let data = context.state.returndata.as_deref().ok_or(Interrupt::Read(ValueError::ReadErrorBytes {
        location: ByteSource::Returndata,
        start: 0,
        length: 0,
    }))?;

    if success {
        let allocation = context
            .current_context
            .zip(selector)
            .and_then(|(current, selector)| context.allocations.returndata.get(&current.context)?.get(&selector));
        if let Some(allocation) = allocation {
            if let Some(decoding) = try_allocation(allocation, data, context)? {
                return Ok(decoding);
            }
        }
        debug!(length = data.len(), "return data matches no known output");
        return Ok(ReturnDecoding::Unknown { data: data.to_vec() });
    }

    if data.is_empty() {
        return Ok(ReturnDecoding::Failure);
    }
    let prefix = data.get(..SELECTOR_SIZE);
    for allocation in builtin_revert_allocations() {
        if allocation.selector.as_ref().map(|selector| selector.as_slice()) != prefix {
            continue;
        }
        if let Some(decoding) = try_allocation(&allocation, data, context)? {
            return Ok(decoding);
        }
    }
    Ok(ReturnDecoding::Unknown { data: data.to_vec() })
}

/// Decode strictly, then check the values re-encode to the data following
/// the allocation's offset. Read failures reject the allocation.
fn try_allocation(
    allocation: &ReturndataAllocation,
    data: &[u8],
    context: &DecodingContext<'_>,
) -> Step<Option<ReturnDecoding>> {
    let specs: Vec<ArgumentSpec> = allocation
        .arguments
        .iter()
        .map(|argument| ArgumentSpec {
            name: argument.name.clone(),
            ty: argument.ty.clone(),
            pointer: DataPointer::returndata(allocation.offset + argument.offset, argument.length),
        })
        .collect();
    let options = Options {
        strict: true,
        abi_pointer_base: allocation.offset,
        ..context.base_options()
    };
    let (arguments, mode) = match decode_arguments(&specs, allocation.mode, context, &options) {
        Ok(decoded) => decoded,
        Err(Interrupt::Suspend(requests)) => return Err(Interrupt::Suspend(requests)),
        Err(Interrupt::Read(error)) | Err(Interrupt::Stop { error, .. }) => {
            debug!(allocation = %allocation.abi_signature, %error, "return data rejected");
            return Ok(None);
        }
    };
    let values: Vec<_> = arguments.iter().map(|named| named.value.clone()).collect();
    let encoded = encode_tuple_abi(&values, &context.allocations.abi);
    if encoded.as_deref() != data.get(allocation.offset..) {
        debug!(allocation = %allocation.abi_signature, "return data does not re-encode");
        return Ok(None);
    }
    Ok(Some(match allocation.kind {
        ReturndataKind::Return => ReturnDecoding::Return { arguments, mode },
        ReturndataKind::Revert => ReturnDecoding::Revert {
            name: allocation.name.clone(),
            abi_signature: allocation.abi_signature.clone(),
            arguments,
            mode,
        },
    }))
}
