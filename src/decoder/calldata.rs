//! Function and constructor calls.

use super::arguments::{ArgumentSpec, decode_arguments};
use super::{Decoder, DecodingContext};
use crate::allocate::{CalldataAllocation, DecodingMode};
use crate::decode::{Interrupt, Options, Step};
use crate::evm::{ByteSource, ContractInfo, FallbackKind, SELECTOR_SIZE, Selector};
use crate::format::{NamedValue, ValueError};
use crate::logging::debug;
use crate::pointer::DataPointer;

/// What a piece of calldata turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum CalldataDecoding {
    Function {
        class: ContractInfo,
        name: String,
        abi_signature: String,
        selector: Selector,
        arguments: Vec<NamedValue>,
        mode: DecodingMode,
    },
    Constructor {
        class: ContractInfo,
        abi_signature: String,
        arguments: Vec<NamedValue>,
        /// The creation bytecode preceding the arguments.
        bytecode: Vec<u8>,
        mode: DecodingMode,
    },
    /// A call to a known contract that no function matches.
    Message {
        class: ContractInfo,
        fallback: Option<FallbackKind>,
        data: Vec<u8>,
    },
    /// A call to an unrecognised contract.
    Unknown { data: Vec<u8> },
    /// Contract creation with unrecognised bytecode.
    Create { bytecode: Vec<u8> },
}

impl CalldataDecoding {
    pub fn kind(&self) -> &'static str {
        match self {
            CalldataDecoding::Function { .. } => "function",
            CalldataDecoding::Constructor { .. } => "constructor",
            CalldataDecoding::Message { .. } => "message",
            CalldataDecoding::Unknown { .. } => "unknown",
            CalldataDecoding::Create { .. } => "create",
        }
    }

    pub fn arguments(&self) -> &[NamedValue] {
        match self {
            CalldataDecoding::Function { arguments, .. } | CalldataDecoding::Constructor { arguments, .. } => {
                arguments
            }
            _ => &[],
        }
    }
}

/// Decode the resident calldata against the current context.
///
/// `is_constructor` only matters when the context is unknown: it decides
/// between [`CalldataDecoding::Create`] and [`CalldataDecoding::Unknown`].
pub fn decode_calldata<'a>(context: DecodingContext<'a>, is_constructor: bool) -> Decoder<'a, CalldataDecoding> {
    Decoder::start(context, move |context| decode_calldata_step(context, is_constructor))
}

fn decode_calldata_step(context: &DecodingContext<'_>, is_constructor: bool) -> Step<CalldataDecoding> {
    let calldata = context.state.calldata.as_deref().ok_or(Interrupt::Read(ValueError::ReadErrorBytes {
        location: ByteSource::Calldata,
        start: 0,
        length: 0,
    }))?;
    let Some(current) = context.current_context else {
        return Ok(if is_constructor {
            CalldataDecoding::Create {
                bytecode: calldata.to_vec(),
            }
        } else {
            CalldataDecoding::Unknown {
                data: calldata.to_vec(),
            }
        });
    };
    let allocations = context.allocations.calldata.get(&current.context);

    if current.is_constructor {
        let Some(allocation) = allocations.and_then(|allocations| allocations.constructor.as_ref()) else {
            return Ok(CalldataDecoding::Create {
                bytecode: calldata.to_vec(),
            });
        };
        let (arguments, mode) = decode_allocation(allocation, context)?;
        let bytecode = calldata.iter().take(allocation.offset).copied().collect();
        return Ok(CalldataDecoding::Constructor {
            class: current.info(),
            abi_signature: allocation.abi_signature.clone(),
            arguments,
            bytecode,
            mode,
        });
    }

    let selector: Option<Selector> = calldata.get(..SELECTOR_SIZE).and_then(|bytes| bytes.try_into().ok());
    let allocation = selector.and_then(|selector| {
        allocations.and_then(|allocations| allocations.functions.get(&selector).map(|found| (selector, found)))
    });
    let Some((selector, allocation)) = allocation else {
        debug!(context = %current.context, "no function matches calldata");
        return Ok(CalldataDecoding::Message {
            class: current.info(),
            fallback: current.fallback_for(calldata.is_empty()),
            data: calldata.to_vec(),
        });
    };
    let (arguments, mode) = decode_allocation(allocation, context)?;
    Ok(CalldataDecoding::Function {
        class: current.info(),
        name: allocation.name.clone(),
        abi_signature: allocation.abi_signature.clone(),
        selector,
        arguments,
        mode,
    })
}

fn decode_allocation(
    allocation: &CalldataAllocation,
    context: &DecodingContext<'_>,
) -> Step<(Vec<NamedValue>, DecodingMode)> {
    let specs: Vec<ArgumentSpec> = allocation
        .arguments
        .iter()
        .map(|argument| ArgumentSpec {
            name: argument.name.clone(),
            ty: argument.ty.clone(),
            pointer: DataPointer::calldata(allocation.offset + argument.offset, argument.length),
        })
        .collect();
    let options = Options {
        abi_pointer_base: allocation.offset,
        ..context.base_options()
    };
    decode_arguments(&specs, allocation.mode, context, &options)
}
