//! Resident machine state consulted by the decoder.
//!
//! Any source may be absent. When the decoder needs bytes from an absent
//! source it suspends with a request; answers are cached here so the next
//! pass finds them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use num_bigint::BigUint;

use super::{Address, WORD_SIZE};

/// A byte-addressed source the decoder can read ranges from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ByteSource {
    /// The stack, viewed as consecutive 32-byte words from the bottom.
    Stack,
    Memory,
    Calldata,
    Returndata,
    /// Code of the currently executing contract (immutables).
    Code,
    EventData,
    /// Event topics, viewed as consecutive 32-byte words.
    EventTopics,
}

impl fmt::Display for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ByteSource::Stack => "stack",
            ByteSource::Memory => "memory",
            ByteSource::Calldata => "calldata",
            ByteSource::Returndata => "returndata",
            ByteSource::Code => "code",
            ByteSource::EventData => "eventdata",
            ByteSource::EventTopics => "eventtopics",
        };
        f.write_str(name)
    }
}

/// Globally available values behind `this`, `msg`, `tx` and `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Special {
    This,
    Sender,
    Value,
    Origin,
    GasPrice,
    Coinbase,
    Difficulty,
    GasLimit,
    Number,
    Timestamp,
    ChainId,
    BaseFee,
}

impl fmt::Display for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Special::This => "this",
            Special::Sender => "sender",
            Special::Value => "value",
            Special::Origin => "origin",
            Special::GasPrice => "gasprice",
            Special::Coinbase => "coinbase",
            Special::Difficulty => "difficulty",
            Special::GasLimit => "gaslimit",
            Special::Number => "number",
            Special::Timestamp => "timestamp",
            Special::ChainId => "chainid",
            Special::BaseFee => "basefee",
        };
        f.write_str(name)
    }
}

/// Raw data available to a decode.
#[derive(Debug, Clone, Default)]
pub struct EvmState {
    pub stack: Option<Vec<[u8; WORD_SIZE]>>,
    pub memory: Option<Vec<u8>>,
    pub calldata: Option<Vec<u8>>,
    pub returndata: Option<Vec<u8>>,
    pub code: Option<Vec<u8>>,
    pub event_data: Option<Vec<u8>>,
    pub event_topics: Option<Vec<[u8; WORD_SIZE]>>,
    /// Known storage words, keyed by slot address.
    pub storage: BTreeMap<BigUint, [u8; WORD_SIZE]>,
    pub specials: BTreeMap<Special, [u8; WORD_SIZE]>,
    pub(crate) ranges: HashMap<(ByteSource, usize, usize), Vec<u8>>,
    pub(crate) code_at: HashMap<Address, Vec<u8>>,
}

impl EvmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(mut self, stack: Vec<[u8; WORD_SIZE]>) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_memory(mut self, memory: Vec<u8>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_calldata(mut self, calldata: Vec<u8>) -> Self {
        self.calldata = Some(calldata);
        self
    }

    pub fn with_returndata(mut self, returndata: Vec<u8>) -> Self {
        self.returndata = Some(returndata);
        self
    }

    pub fn with_code(mut self, code: Vec<u8>) -> Self {
        self.code = Some(code);
        self
    }

    /// Set both halves of a log: its topics and its data.
    pub fn with_event(mut self, topics: Vec<[u8; WORD_SIZE]>, data: Vec<u8>) -> Self {
        self.event_topics = Some(topics);
        self.event_data = Some(data);
        self
    }

    pub fn with_storage_word(mut self, slot: BigUint, word: [u8; WORD_SIZE]) -> Self {
        self.storage.insert(slot, word);
        self
    }

    pub fn with_special(mut self, special: Special, word: [u8; WORD_SIZE]) -> Self {
        self.specials.insert(special, word);
        self
    }

    /// Pre-load the code deployed at an address.
    pub fn with_code_at(mut self, address: Address, code: Vec<u8>) -> Self {
        self.code_at.insert(address, code);
        self
    }

    pub fn code_at(&self, address: &Address) -> Option<&[u8]> {
        self.code_at.get(address).map(Vec::as_slice)
    }

    /// The full contents of a source, when resident.
    pub(crate) fn source(&self, source: ByteSource) -> Option<SourceView<'_>> {
        match source {
            ByteSource::Stack => self.stack.as_deref().map(SourceView::Words),
            ByteSource::Memory => self.memory.as_deref().map(SourceView::Bytes),
            ByteSource::Calldata => self.calldata.as_deref().map(SourceView::Bytes),
            ByteSource::Returndata => self.returndata.as_deref().map(SourceView::Bytes),
            ByteSource::Code => self.code.as_deref().map(SourceView::Bytes),
            ByteSource::EventData => self.event_data.as_deref().map(SourceView::Bytes),
            ByteSource::EventTopics => self.event_topics.as_deref().map(SourceView::Words),
        }
    }

    /// Length in bytes of a resident source.
    pub(crate) fn source_len(&self, source: ByteSource) -> Option<usize> {
        self.source(source).map(|view| view.len())
    }

    pub(crate) fn cached_range(&self, source: ByteSource, start: usize, length: usize) -> Option<&[u8]> {
        self.ranges.get(&(source, start, length)).map(Vec::as_slice)
    }

    pub(crate) fn cache_range(&mut self, source: ByteSource, start: usize, bytes: Vec<u8>) {
        self.ranges.insert((source, start, bytes.len()), bytes);
    }

    pub(crate) fn cache_code(&mut self, address: Address, code: Vec<u8>) {
        self.code_at.insert(address, code);
    }
}

/// Borrowed view of a resident source.
pub(crate) enum SourceView<'a> {
    Bytes(&'a [u8]),
    Words(&'a [[u8; WORD_SIZE]]),
}

impl SourceView<'_> {
    pub(crate) fn len(&self) -> usize {
        match self {
            SourceView::Bytes(bytes) => bytes.len(),
            SourceView::Words(words) => words.len() * WORD_SIZE,
        }
    }

    /// Copy `length` bytes from `start`; bytes past the end read as zero.
    pub(crate) fn copy_range(&self, start: usize, length: usize) -> Vec<u8> {
        let mut out = vec![0u8; length];
        match self {
            SourceView::Bytes(bytes) => {
                if let Some(available) = bytes.get(start..) {
                    let n = available.len().min(length);
                    if let (Some(dst), Some(src)) = (out.get_mut(..n), available.get(..n)) {
                        dst.copy_from_slice(src);
                    }
                }
            }
            SourceView::Words(words) => {
                for (i, byte) in out.iter_mut().enumerate() {
                    let position = start + i;
                    if let Some(b) = words
                        .get(position / WORD_SIZE)
                        .and_then(|word| word.get(position % WORD_SIZE))
                    {
                        *byte = *b;
                    }
                }
            }
        }
        out
    }
}
