//! Raw byte reads behind every data pointer.
//!
//! A read either returns the bytes, suspends with a [`Request`] for data
//! that is not resident, or fails with a read error when the pointer is
//! out of bounds for a resident source.

use num_bigint::BigUint;
use num_traits::One;

use crate::decode::{Interrupt, Step};
use crate::decoder::{MAX_STORAGE_WORDS, Request};
use crate::evm::{ByteSource, EvmState, WORD_SIZE};
use crate::format::ValueError;
use crate::logging::{trace, warn};
use crate::pointer::{DataPointer, StorageRange, slot_address};

/// Read the bytes a pointer designates.
pub(crate) fn read(pointer: &DataPointer, state: &EvmState) -> Step<Vec<u8>> {
    match pointer {
        DataPointer::Literal(bytes) | DataPointer::StackLiteral(bytes) => Ok(bytes.clone()),
        DataPointer::Stack { from, to } => read_stack(*from, *to, state),
        DataPointer::Bytes {
            source,
            start,
            length,
        } => read_bytes(*source, *start, *length, state),
        DataPointer::EventTopic { topic } => read_topic(*topic, state),
        DataPointer::Storage(range) => read_storage(range, state),
        DataPointer::Special(special) => state
            .specials
            .get(special)
            .map(|word| word.to_vec())
            .ok_or(Interrupt::Read(ValueError::ReadErrorSpecial { special: *special })),
    }
}

fn read_stack(from: usize, to: usize, state: &EvmState) -> Step<Vec<u8>> {
    let error = || Interrupt::Read(ValueError::ReadErrorStack { from, to });
    if from > to {
        return Err(error());
    }
    match &state.stack {
        Some(stack) => stack
            .get(from..=to)
            .map(|words| words.iter().flat_map(|word| word.iter().copied()).collect())
            .ok_or_else(error),
        None => {
            let start = from.checked_mul(WORD_SIZE).ok_or_else(error)?;
            let length = (to - from + 1).checked_mul(WORD_SIZE).ok_or_else(error)?;
            cached_or_request(ByteSource::Stack, start, length, state)
        }
    }
}

fn read_bytes(source: ByteSource, start: usize, length: usize, state: &EvmState) -> Step<Vec<u8>> {
    match state.source(source) {
        Some(view) => Ok(view.copy_range(start, length)),
        None => cached_or_request(source, start, length, state),
    }
}

fn read_topic(topic: usize, state: &EvmState) -> Step<Vec<u8>> {
    match &state.event_topics {
        Some(topics) => topics
            .get(topic)
            .map(|word| word.to_vec())
            .ok_or(Interrupt::Read(ValueError::ReadErrorTopic { topic })),
        None => {
            let start = topic
                .checked_mul(WORD_SIZE)
                .ok_or(Interrupt::Read(ValueError::ReadErrorTopic { topic }))?;
            cached_or_request(ByteSource::EventTopics, start, WORD_SIZE, state)
        }
    }
}

fn cached_or_request(source: ByteSource, start: usize, length: usize, state: &EvmState) -> Step<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    match state.cached_range(source, start, length) {
        Some(bytes) => Ok(bytes.to_vec()),
        None => Err(Interrupt::suspend(Request::ByteRange {
            source,
            start,
            length,
        })),
    }
}

/// Storage ranges may span several consecutive slots; every word touched is
/// requested individually, all missing words of the range at once.
fn read_storage(range: &StorageRange, state: &EvmState) -> Step<Vec<u8>> {
    let not_addressable = || {
        warn!(slot = ?range.from.slot, "storage slot has a key with no mapping-key encoding");
        Interrupt::Read(ValueError::NotDecodableHere {
            type_string: "mapping key".to_string(),
            location: "storage".to_string(),
        })
    };
    let overlong = || {
        Interrupt::Read(ValueError::OverlongArrayOrString {
            length: BigUint::from(range.length),
            data_length: MAX_STORAGE_WORDS * WORD_SIZE,
        })
    };
    let end = range.from.index.checked_add(range.length).ok_or_else(overlong)?;
    let word_count = end.div_ceil(WORD_SIZE).max(1);
    if word_count > MAX_STORAGE_WORDS {
        return Err(overlong());
    }
    let base = slot_address(&range.from.slot).ok_or_else(not_addressable)?;
    let modulus = BigUint::one() << 256;
    let mut bytes = Vec::new();
    let mut missing = Vec::new();
    for i in 0..word_count {
        let address = (&base + BigUint::from(i)) % &modulus;
        match state.storage.get(&address) {
            Some(word) => bytes.extend_from_slice(word),
            None => {
                trace!(slot = %address, "storage word not resident");
                missing.push(Request::Storage { slot: address });
            }
        }
    }
    if !missing.is_empty() {
        return Err(Interrupt::Suspend(missing));
    }
    Ok(bytes
        .get(range.from.index..end)
        .map(<[u8]>::to_vec)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::Special;
    use crate::pointer::{Slot, StoragePosition};

    fn word(byte: u8) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[31] = byte;
        word
    }

    #[test]
    fn test_resident_sources() {
        let state = EvmState::new()
            .with_memory(vec![1, 2, 3])
            .with_stack(vec![word(1), word(2)])
            .with_special(Special::Value, word(9));
        assert_eq!(
            read(&DataPointer::memory(1, 4), &state).ok(),
            Some(vec![2, 3, 0, 0])
        );
        let stack = read(&DataPointer::Stack { from: 0, to: 1 }, &state).unwrap();
        assert_eq!(stack.len(), 64);
        assert_eq!(stack[63], 2);
        assert!(matches!(
            read(&DataPointer::stack(5), &state),
            Err(Interrupt::Read(ValueError::ReadErrorStack { from: 5, to: 5 }))
        ));
        assert_eq!(
            read(&DataPointer::Special(Special::Value), &state).ok(),
            Some(word(9).to_vec())
        );
    }

    #[test]
    fn test_absent_source_suspends_then_uses_cache() {
        let mut state = EvmState::new();
        let pointer = DataPointer::calldata(4, 32);
        assert_eq!(
            read(&pointer, &state),
            Err(Interrupt::suspend(Request::ByteRange {
                source: ByteSource::Calldata,
                start: 4,
                length: 32
            }))
        );
        state.cache_range(ByteSource::Calldata, 4, vec![7; 32]);
        assert_eq!(read(&pointer, &state).ok(), Some(vec![7; 32]));
    }

    #[test]
    fn test_storage_spanning_slots() {
        let mut first = [0u8; 32];
        first[31] = 0xaa;
        let mut second = [0u8; 32];
        second[0] = 0xbb;
        let state = EvmState::new()
            .with_storage_word(BigUint::from(3u8), first)
            .with_storage_word(BigUint::from(4u8), second);
        let range = StorageRange {
            from: StoragePosition {
                slot: Slot::new(3u8),
                index: 31,
            },
            length: 2,
        };
        assert_eq!(read(&DataPointer::Storage(range), &state).ok(), Some(vec![0xaa, 0xbb]));

        let missing = DataPointer::storage(Slot::new(5u8));
        assert_eq!(
            read(&missing, &state),
            Err(Interrupt::suspend(Request::Storage {
                slot: BigUint::from(5u8)
            }))
        );
    }

    #[test]
    fn test_storage_range_requests_every_missing_word() {
        let state = EvmState::new().with_storage_word(BigUint::from(1u8), word(1));
        let range = StorageRange {
            from: StoragePosition {
                slot: Slot::new(0u8),
                index: 0,
            },
            length: 3 * WORD_SIZE,
        };
        let expected: Vec<Request> = [0u8, 2]
            .into_iter()
            .map(|slot| Request::Storage {
                slot: BigUint::from(slot),
            })
            .collect();
        assert_eq!(read(&DataPointer::Storage(range), &state), Err(Interrupt::Suspend(expected)));
    }

    #[test]
    fn test_huge_storage_range_is_a_read_error() {
        let state = EvmState::new();
        let range = StorageRange {
            from: StoragePosition {
                slot: Slot::new(0u8),
                index: 31,
            },
            length: usize::MAX,
        };
        assert!(matches!(
            read(&DataPointer::Storage(range), &state),
            Err(Interrupt::Read(ValueError::OverlongArrayOrString { .. }))
        ));
        let range = StorageRange {
            from: StoragePosition {
                slot: Slot::new(0u8),
                index: 0,
            },
            length: 1 << 40,
        };
        assert!(matches!(
            read(&DataPointer::Storage(range), &state),
            Err(Interrupt::Read(ValueError::OverlongArrayOrString { .. }))
        ));
    }
}
