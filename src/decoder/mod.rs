//! Resumable decoders.
//!
//! A [`Decoder`] runs until it either finishes or needs data it does not
//! have. In the latter case it stops in
//! [`DecoderState::AwaitingExternalData`] with a [`Request`]; the caller
//! fetches the data however it likes (a node, a trace, a fixture) and hands
//! it back with [`Decoder::resume`]. Answers are cached on the decoding
//! context. One pass gathers every request its independent parts raise;
//! the decoder hands them out one at a time and only re-runs the decode
//! once all of them are answered.
//!
//! # Module Organization
//!
//! - this module: the [`Decoder`] state machine, requests and responses
//! - [`variable`]: single variables by type description
//! - [`calldata`]: function and constructor calls
//! - [`event`]: event logs
//! - [`returndata`]: return values and revert payloads
//! - [`error`]: [`DecodeError`]

mod arguments;
pub mod calldata;
mod error;
pub mod event;
pub mod returndata;
pub mod variable;

use std::collections::VecDeque;
use std::fmt;

use num_bigint::BigUint;

pub use calldata::{CalldataDecoding, decode_calldata};
pub use error::DecodeError;
pub use event::{EventArgument, EventDecoding, EventOptions, LogDecoding, decode_event};
pub use returndata::{ReturnDecoding, decode_return};
pub use variable::{decode_value, decode_variable};

use crate::allocate::Allocations;
use crate::decode::{Interrupt, Options, PaddingMode, Step};
use crate::evm::{Address, ByteSource, ContractContext, Contexts, EvmState, WORD_SIZE};
use crate::format::UserDefinedTypes;
use crate::logging::{debug, trace};
use crate::pointer::Slot;

/// Most storage words a single value may span. Longer arrays and byte
/// strings decode to [`ValueError::OverlongArrayOrString`].
///
/// [`ValueError::OverlongArrayOrString`]: crate::format::ValueError::OverlongArrayOrString
pub const MAX_STORAGE_WORDS: usize = 1 << 20;

/// Data a suspended decoder is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// The code deployed at an address.
    Code { address: Address },
    /// One storage word, by slot address.
    Storage { slot: BigUint },
    /// A byte range of a source that was not resident.
    ByteRange {
        source: ByteSource,
        start: usize,
        length: usize,
    },
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Code { address } => write!(f, "code at {address}"),
            Request::Storage { slot } => write!(f, "storage slot {slot:#x}"),
            Request::ByteRange {
                source,
                start,
                length,
            } => write!(f, "{length} bytes of {source} at {start}"),
        }
    }
}

/// An answer to a [`Request`]; its kind must match the request's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Code(Vec<u8>),
    /// Exactly one 32-byte word.
    Storage(Vec<u8>),
    Bytes(Vec<u8>),
}

/// Knobs applied to every decode started from a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Fail on anything that would not re-encode to the same bytes, rather
    /// than embedding errors in the result.
    pub strict_abi_mode: bool,
    /// Skip padding checks on value types.
    pub permissive_padding: bool,
}

/// Everything a decode reads: machine state, type definitions, layouts and
/// known contracts.
#[derive(Debug, Clone)]
pub struct DecodingContext<'a> {
    pub state: EvmState,
    pub user_defined_types: &'a UserDefinedTypes,
    pub allocations: &'a Allocations,
    pub contexts: &'a Contexts,
    /// The contract whose code is executing, if known.
    pub current_context: Option<&'a ContractContext>,
    /// Mapping entries to decode, as key slots.
    pub mapping_keys: Vec<Slot>,
    pub options: DecoderOptions,
}

impl<'a> DecodingContext<'a> {
    /// A context with no current contract, no mapping keys and default
    /// options.
    pub fn new(
        state: EvmState,
        user_defined_types: &'a UserDefinedTypes,
        allocations: &'a Allocations,
        contexts: &'a Contexts,
    ) -> Self {
        Self {
            state,
            user_defined_types,
            allocations,
            contexts,
            current_context: None,
            mapping_keys: Vec::new(),
            options: DecoderOptions::default(),
        }
    }

    /// Decode as code running in `context`, which resolves `this` and
    /// the contract's own layouts.
    pub fn in_context(mut self, context: &'a ContractContext) -> Self {
        self.current_context = Some(context);
        self
    }

    /// Register a mapping key so the entry it names is decoded.
    pub fn with_mapping_key(mut self, slot: Slot) -> Self {
        self.mapping_keys.push(slot);
        self
    }

    /// Replace the decoder options.
    pub fn with_options(mut self, options: DecoderOptions) -> Self {
        self.options = options;
        self
    }

    /// Options for a top-level decode.
    pub(crate) fn base_options(&self) -> Options {
        Options {
            strict: self.options.strict_abi_mode,
            padding: if self.options.permissive_padding {
                PaddingMode::Permissive
            } else {
                PaddingMode::Checked
            },
            ..Options::default()
        }
    }
}

/// Where a decoder stands.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderState<T> {
    Reading,
    AwaitingExternalData(Request),
    Decoded(T),
    Failed(DecodeError),
}

type Task<'a, T> = Box<dyn Fn(&DecodingContext<'a>) -> Step<T> + 'a>;

/// A decode in progress.
pub struct Decoder<'a, T> {
    context: DecodingContext<'a>,
    task: Task<'a, T>,
    state: DecoderState<T>,
    /// Requests from the last pass still to hand out after the pending one.
    queue: VecDeque<Request>,
    passes: usize,
}

impl<'a, T> fmt::Debug for Decoder<'a, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl<'a, T> Decoder<'a, T> {
    /// Start a decode; it runs until it finishes or first suspends.
    pub(crate) fn start<F>(context: DecodingContext<'a>, task: F) -> Self
    where
        F: Fn(&DecodingContext<'a>) -> Step<T> + 'a,
    {
        let mut decoder = Self {
            context,
            task: Box::new(task),
            state: DecoderState::Reading,
            queue: VecDeque::new(),
            passes: 0,
        };
        decoder.run();
        decoder
    }

    fn run(&mut self) {
        self.passes += 1;
        self.state = match (self.task)(&self.context) {
            Ok(value) => DecoderState::Decoded(value),
            Err(Interrupt::Suspend(requests)) => {
                debug!(requests = requests.len(), pass = self.passes, "decoder suspended");
                self.queue = requests.into();
                match self.next_unanswered() {
                    Some(request) => DecoderState::AwaitingExternalData(request),
                    None => DecoderState::Failed(DecodeError::Incomplete("data it already holds".to_string())),
                }
            }
            Err(Interrupt::Read(error)) | Err(Interrupt::Stop { error, .. }) => {
                debug!(%error, "decoder failed");
                DecoderState::Failed(DecodeError::Stopped(error))
            }
        };
    }

    /// Where the decoder stands.
    pub fn state(&self) -> &DecoderState<T> {
        &self.state
    }

    /// The decoding context, including every answer cached so far.
    pub fn context(&self) -> &DecodingContext<'a> {
        &self.context
    }

    /// How many times the decode has run.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Pop queued requests until one the cache cannot answer.
    fn next_unanswered(&mut self) -> Option<Request> {
        while let Some(request) = self.queue.pop_front() {
            if !self.is_answered(&request) {
                return Some(request);
            }
        }
        None
    }

    fn is_answered(&self, request: &Request) -> bool {
        let state = &self.context.state;
        match request {
            Request::Code { address } => state.code_at(address).is_some(),
            Request::Storage { slot } => state.storage.contains_key(slot),
            Request::ByteRange {
                source,
                start,
                length,
            } => state.cached_range(*source, *start, *length).is_some(),
        }
    }

    /// The request to answer next, if the decoder is suspended.
    pub fn pending_request(&self) -> Option<&Request> {
        match &self.state {
            DecoderState::AwaitingExternalData(request) => Some(request),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, DecoderState::Decoded(_) | DecoderState::Failed(_))
    }

    /// Answer the pending request and continue decoding.
    pub fn resume(&mut self, response: Response) -> Result<&DecoderState<T>, DecodeError> {
        let DecoderState::AwaitingExternalData(request) = &self.state else {
            return Err(DecodeError::NotSuspended);
        };
        let request = request.clone();
        trace!(%request, "resuming");
        match (&request, response) {
            (Request::Code { address }, Response::Code(code)) => {
                self.context.state.cache_code(*address, code);
            }
            (Request::Storage { slot }, Response::Storage(word)) => {
                let word: [u8; WORD_SIZE] =
                    word.try_into()
                        .map_err(|word: Vec<u8>| DecodeError::UnexpectedResponse {
                            request: request.to_string(),
                            detail: format!("storage word of {} bytes", word.len()),
                        })?;
                self.context.state.storage.insert(slot.clone(), word);
            }
            (
                Request::ByteRange {
                    source,
                    start,
                    length,
                },
                Response::Bytes(bytes),
            ) => {
                if bytes.len() != *length {
                    return Err(DecodeError::UnexpectedResponse {
                        request: request.to_string(),
                        detail: format!("{} bytes", bytes.len()),
                    });
                }
                self.context.state.cache_range(*source, *start, bytes);
            }
            (_, response) => {
                return Err(DecodeError::UnexpectedResponse {
                    request: request.to_string(),
                    detail: format!("{} response", response_kind(&response)),
                });
            }
        }
        match self.next_unanswered() {
            Some(next) => {
                trace!(request = %next, queued = self.queue.len(), "next queued request");
                self.state = DecoderState::AwaitingExternalData(next);
            }
            None => self.run(),
        }
        Ok(&self.state)
    }

    /// The result of a finished decoder.
    pub fn finish(self) -> Result<T, DecodeError> {
        match self.state {
            DecoderState::Decoded(value) => Ok(value),
            DecoderState::Failed(error) => Err(error),
            DecoderState::AwaitingExternalData(request) => Err(DecodeError::Incomplete(request.to_string())),
            DecoderState::Reading => Err(DecodeError::NotSuspended),
        }
    }

    /// Answer every request with `answer` until the decode finishes.
    pub fn drive<F>(mut self, mut answer: F) -> Result<T, DecodeError>
    where
        F: FnMut(&Request) -> Response,
    {
        while let DecoderState::AwaitingExternalData(request) = &self.state {
            let response = answer(request);
            self.resume(response)?;
        }
        self.finish()
    }
}

fn response_kind(response: &Response) -> &'static str {
    match response {
        Response::Code(_) => "code",
        Response::Storage(_) => "storage",
        Response::Bytes(_) => "bytes",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Type, Value};
    use crate::pointer::DataPointer;

    #[test]
    fn test_suspend_and_resume_storage() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let mut decoder = decode_value(Type::uint(256), DataPointer::storage(Slot::new(1u8)), context);
        assert_eq!(
            decoder.pending_request(),
            Some(&Request::Storage {
                slot: BigUint::from(1u8)
            })
        );
        let mut word = vec![0u8; 32];
        word[31] = 9;
        decoder.resume(Response::Storage(word)).unwrap();
        assert!(decoder.is_finished());
        assert_eq!(decoder.finish().unwrap(), Value::uint(256, 9u8));
    }

    #[test]
    fn test_one_pass_queues_every_slot() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let ty = crate::format::parse_type("uint256[3] storage", &types).unwrap();
        let mut decoder = decode_value(ty, DataPointer::storage(Slot::new(4u8)), context);
        let mut answered = Vec::new();
        while let Some(Request::Storage { slot }) = decoder.pending_request().cloned() {
            let mut word = vec![0u8; 32];
            word[31] = answered.len() as u8 + 1;
            answered.push(slot);
            decoder.resume(Response::Storage(word)).unwrap();
        }
        assert_eq!(answered, vec![BigUint::from(4u8), BigUint::from(5u8), BigUint::from(6u8)]);
        assert_eq!(decoder.passes(), 2);
        assert_eq!(decoder.finish().unwrap().to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_mismatched_response_is_rejected() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let mut decoder = decode_value(Type::uint(256), DataPointer::storage(Slot::new(1u8)), context);
        assert!(matches!(
            decoder.resume(Response::Code(vec![1])),
            Err(DecodeError::UnexpectedResponse { .. })
        ));
        assert!(matches!(
            decoder.resume(Response::Storage(vec![1, 2])),
            Err(DecodeError::UnexpectedResponse { .. })
        ));
        assert!(decoder.pending_request().is_some());
    }

    #[test]
    fn test_resume_when_finished() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let mut decoder = decode_value(Type::Bool, DataPointer::Literal(vec![1]), context);
        assert_eq!(decoder.state(), &DecoderState::Decoded(Value::bool(true)));
        assert!(matches!(
            decoder.resume(Response::Bytes(Vec::new())),
            Err(DecodeError::NotSuspended)
        ));
    }

    #[test]
    fn test_drive_answers_byte_ranges() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let decoder = decode_value(Type::uint(8), DataPointer::calldata(4, 32), context);
        let value = decoder
            .drive(|request| match request {
                Request::ByteRange { length, .. } => {
                    let mut bytes = vec![0u8; *length];
                    if let Some(last) = bytes.last_mut() {
                        *last = 7;
                    }
                    Response::Bytes(bytes)
                }
                _ => Response::Code(Vec::new()),
            })
            .unwrap();
        assert_eq!(value, Value::uint(8, 7u8));
    }
}
