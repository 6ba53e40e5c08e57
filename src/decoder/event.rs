//! Event logs.
//!
//! Topic 0 of a named event is the hash of its signature, but unrelated
//! events may share it, and anonymous events have no selector at all. Every
//! plausible candidate is therefore decoded strictly and accepted only if
//! re-encoding its arguments reproduces the log byte for byte.

use super::arguments::{ArgumentSpec, decode_arguments};
use super::{Decoder, DecodingContext, Request};
use crate::allocate::{DecodingMode, EventAllocation, EventArgumentPointer, EventCandidates};
use crate::decode::{Interrupt, Options, Step};
use crate::encode::{encode_topic, encode_tuple_abi};
use crate::evm::{Address, ContextHash, ContractKind, WORD_SIZE};
use crate::format::{NamedValue, Value, ValueError};
use crate::logging::debug;
use crate::pointer::DataPointer;

/// Filters applied to the candidates of [`decode_event`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Only consider events with this name.
    pub name: Option<String>,
    /// Return every verified candidate instead of the first.
    pub all_matches: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventArgument {
    pub name: Option<String>,
    pub indexed: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDecoding {
    pub name: String,
    pub abi_signature: String,
    /// Context of the contract or library that declares the event.
    pub defined_in: ContextHash,
    pub contract_name: Option<String>,
    pub contract_kind: ContractKind,
    pub arguments: Vec<EventArgument>,
    pub mode: DecodingMode,
}

/// A verified interpretation of a log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogDecoding {
    Event {
        selector: [u8; WORD_SIZE],
        decoding: EventDecoding,
    },
    Anonymous(EventDecoding),
}

impl LogDecoding {
    pub fn decoding(&self) -> &EventDecoding {
        match self {
            LogDecoding::Event { decoding, .. } | LogDecoding::Anonymous(decoding) => decoding,
        }
    }
}

/// Decode the resident log emitted by `address`.
///
/// The emitter's code is requested to narrow contract-level candidates to
/// the emitter's own events; library events are always candidates. Order:
/// contract named, library named, contract anonymous, library anonymous.
pub fn decode_event<'a>(
    context: DecodingContext<'a>,
    address: Address,
    options: EventOptions,
) -> Decoder<'a, Vec<LogDecoding>> {
    Decoder::start(context, move |context| decode_event_step(context, address, &options))
}

fn decode_event_step(
    context: &DecodingContext<'_>,
    address: Address,
    options: &EventOptions,
) -> Step<Vec<LogDecoding>> {
    let topics = context
        .state
        .event_topics
        .as_deref()
        .ok_or(Interrupt::Read(ValueError::ReadErrorTopic { topic: 0 }))?;
    let Some(by_topics) = context.allocations.event.get(&topics.len()) else {
        debug!(topics = topics.len(), "no events with this many topics");
        return Ok(Vec::new());
    };

    let Some(code) = context.state.code_at(&address) else {
        return Err(Interrupt::suspend(Request::Code { address }));
    };
    let emitter = context.contexts.find_by_code(code).map(|found| found.context.clone());

    let named = topics
        .first()
        .and_then(|selector| by_topics.by_selector.get(selector));
    let mut candidates: Vec<&EventAllocation> = Vec::new();
    if let Some(named) = named {
        candidates.extend(contract_candidates(named, emitter.as_ref()));
        candidates.extend(named.library.values().flatten());
    }
    candidates.extend(contract_candidates(&by_topics.anonymous, emitter.as_ref()));
    candidates.extend(by_topics.anonymous.library.values().flatten());

    let mut decodings = Vec::new();
    for allocation in candidates {
        if options
            .name
            .as_ref()
            .is_some_and(|name| *name != allocation.name)
        {
            continue;
        }
        match try_candidate(allocation, context) {
            Ok(Some(decoding)) => {
                decodings.push(decoding);
                if !options.all_matches {
                    break;
                }
            }
            Ok(None) => {
                debug!(event = %allocation.abi_signature, "candidate does not re-encode to the log");
            }
            Err(Interrupt::Suspend(requests)) => return Err(Interrupt::Suspend(requests)),
            Err(Interrupt::Read(error)) | Err(Interrupt::Stop { error, .. }) => {
                debug!(event = %allocation.abi_signature, %error, "candidate rejected");
            }
        }
    }
    Ok(decodings)
}

/// Contract-level candidates: the emitter's own when the emitter is known,
/// otherwise every contract's.
fn contract_candidates<'c>(
    candidates: &'c EventCandidates,
    emitter: Option<&ContextHash>,
) -> Vec<&'c EventAllocation> {
    match emitter {
        Some(emitter) => candidates.contract.get(emitter).into_iter().flatten().collect(),
        None => candidates.contract.values().flatten().collect(),
    }
}

fn try_candidate(allocation: &EventAllocation, context: &DecodingContext<'_>) -> Step<Option<LogDecoding>> {
    let specs: Vec<ArgumentSpec> = allocation
        .arguments
        .iter()
        .map(|argument| ArgumentSpec {
            name: argument.name.clone(),
            ty: argument.ty.clone(),
            pointer: match argument.pointer {
                EventArgumentPointer::Data { offset, length } => DataPointer::event_data(offset, length),
                EventArgumentPointer::Topic(topic) => DataPointer::EventTopic { topic },
            },
        })
        .collect();
    let options = Options {
        strict: true,
        ..context.base_options()
    };
    let (values, mode) = decode_arguments(&specs, allocation.mode, context, &options)?;
    if !reproduces_log(allocation, &values, context) {
        return Ok(None);
    }
    let arguments = allocation
        .arguments
        .iter()
        .zip(values)
        .map(|(argument, named)| EventArgument {
            name: named.name,
            indexed: argument.indexed,
            value: named.value,
        })
        .collect();
    let decoding = EventDecoding {
        name: allocation.name.clone(),
        abi_signature: allocation.abi_signature.clone(),
        defined_in: allocation.context.clone(),
        contract_name: allocation.contract_name.clone(),
        contract_kind: allocation.contract_kind,
        arguments,
        mode,
    };
    Ok(Some(match allocation.selector {
        Some(selector) => LogDecoding::Event { selector, decoding },
        None => LogDecoding::Anonymous(decoding),
    }))
}

/// Re-encode the decoded arguments and compare against the raw log.
fn reproduces_log(
    allocation: &EventAllocation,
    values: &[NamedValue],
    context: &DecodingContext<'_>,
) -> bool {
    let abi = &context.allocations.abi;
    let (Some(data), Some(topics)) = (&context.state.event_data, &context.state.event_topics) else {
        return false;
    };
    let mut non_indexed = Vec::new();
    for (argument, named) in allocation.arguments.iter().zip(values) {
        match argument.pointer {
            EventArgumentPointer::Data { .. } => non_indexed.push(named.value.clone()),
            EventArgumentPointer::Topic(topic) => {
                let expected = topics.get(topic).map(|word| word.to_vec());
                if encode_topic(&named.value, abi) != expected {
                    return false;
                }
            }
        }
    }
    encode_tuple_abi(&non_indexed, abi).as_ref() == Some(data)
}
