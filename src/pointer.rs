//! Data pointers: where the raw bytes of a value live.
//!
//! Storage pointers are built from [`Slot`]s, which are paths rather than
//! numbers: a slot may be a plain offset, an offset from a parent slot, an
//! offset from the hash of a parent slot (dynamic arrays, long strings) or
//! the slot of a mapping key. [`slot_address`] turns a path into the 256-bit
//! address the EVM actually uses.

use num_bigint::BigUint;
use num_traits::One;

use crate::conversion::{keccak256, uint_to_bytes};
use crate::encode::encode_mapping_key;
use crate::evm::{ByteSource, Special, WORD_SIZE};
use crate::format::Value;
use crate::logging::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPointer {
    /// Stack words `from..=to`, counted from the bottom of the stack.
    Stack { from: usize, to: usize },
    /// Words already taken off the stack.
    StackLiteral(Vec<u8>),
    /// A compile-time constant; dynamic bytes and strings hold their content,
    /// everything else a word.
    Literal(Vec<u8>),
    Bytes {
        source: ByteSource,
        start: usize,
        length: usize,
    },
    EventTopic { topic: usize },
    Storage(StorageRange),
    Special(Special),
}

impl DataPointer {
    pub fn memory(start: usize, length: usize) -> Self {
        DataPointer::Bytes {
            source: ByteSource::Memory,
            start,
            length,
        }
    }

    pub fn calldata(start: usize, length: usize) -> Self {
        DataPointer::Bytes {
            source: ByteSource::Calldata,
            start,
            length,
        }
    }

    pub fn returndata(start: usize, length: usize) -> Self {
        DataPointer::Bytes {
            source: ByteSource::Returndata,
            start,
            length,
        }
    }

    pub fn event_data(start: usize, length: usize) -> Self {
        DataPointer::Bytes {
            source: ByteSource::EventData,
            start,
            length,
        }
    }

    /// A whole-word storage pointer at a top-level slot.
    pub fn storage(slot: Slot) -> Self {
        DataPointer::Storage(StorageRange::word(slot))
    }

    /// The stack slot `depth` words from the bottom.
    pub fn stack(depth: usize) -> Self {
        DataPointer::Stack {
            from: depth,
            to: depth,
        }
    }

    /// Human-readable location name for error messages.
    pub fn location_name(&self) -> String {
        match self {
            DataPointer::Stack { .. } => "stack".to_string(),
            DataPointer::StackLiteral(_) => "stackliteral".to_string(),
            DataPointer::Literal(_) => "definition".to_string(),
            DataPointer::Bytes { source, .. } => source.to_string(),
            DataPointer::EventTopic { .. } => "eventtopic".to_string(),
            DataPointer::Storage(_) => "storage".to_string(),
            DataPointer::Special(_) => "special".to_string(),
        }
    }
}

/// A storage slot, expressed as a path from the contract's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub path: Option<Box<Slot>>,
    /// Set for mapping entries: the key hashed together with `path`.
    pub key: Option<Box<Value>>,
    pub offset: BigUint,
    /// Hash `path` before adding `offset`.
    pub hash_path: bool,
}

impl Slot {
    /// A top-level slot.
    pub fn new(offset: impl Into<BigUint>) -> Self {
        Self {
            path: None,
            key: None,
            offset: offset.into(),
            hash_path: false,
        }
    }

    /// `offset` slots past `parent`.
    pub fn child(parent: &Slot, offset: impl Into<BigUint>) -> Self {
        Self {
            path: Some(Box::new(parent.clone())),
            key: None,
            offset: offset.into(),
            hash_path: false,
        }
    }

    /// `offset` slots past `keccak256(parent)`.
    pub fn hashed(parent: &Slot, offset: impl Into<BigUint>) -> Self {
        Self {
            path: Some(Box::new(parent.clone())),
            key: None,
            offset: offset.into(),
            hash_path: true,
        }
    }

    /// The slot holding `mapping[key]` for the mapping at `mapping`.
    pub fn mapping(mapping: &Slot, key: Value) -> Self {
        Self {
            path: Some(Box::new(mapping.clone())),
            key: Some(Box::new(key)),
            offset: BigUint::default(),
            hash_path: false,
        }
    }
}

/// A byte position within storage: a slot and a byte index into its word,
/// counted from the high-order end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePosition {
    pub slot: Slot,
    pub index: usize,
}

/// `length` bytes starting at `from`, continuing into consecutive slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRange {
    pub from: StoragePosition,
    pub length: usize,
}

impl StorageRange {
    pub fn word(slot: Slot) -> Self {
        Self {
            from: StoragePosition { slot, index: 0 },
            length: WORD_SIZE,
        }
    }

    /// The trailing `length` bytes of a slot's word.
    pub fn low_bytes(slot: Slot, length: usize) -> Self {
        Self {
            from: StoragePosition {
                slot,
                index: WORD_SIZE.saturating_sub(length),
            },
            length,
        }
    }
}

fn modulus() -> BigUint {
    BigUint::one() << 256
}

/// The 256-bit storage address of a slot, or `None` if a mapping key in its
/// path cannot be encoded.
pub fn slot_address(slot: &Slot) -> Option<BigUint> {
    let base = match (&slot.path, &slot.key) {
        (Some(path), Some(key)) => {
            let mut preimage = encode_mapping_key(key)?;
            preimage.extend(uint_to_bytes(&slot_address(path)?, WORD_SIZE)?);
            BigUint::from_bytes_be(&keccak256(&preimage))
        }
        (Some(path), None) if slot.hash_path => {
            let word = uint_to_bytes(&slot_address(path)?, WORD_SIZE)?;
            BigUint::from_bytes_be(&keccak256(&word))
        }
        (Some(path), None) => slot_address(path)?,
        (None, _) => BigUint::default(),
    };
    let address = (base + &slot.offset) % modulus();
    trace!(address = %address, "computed slot address");
    Some(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{from_hex, to_hex_string};

    #[test]
    fn test_plain_and_nested_slots() {
        let root = Slot::new(3u8);
        assert_eq!(slot_address(&root), Some(BigUint::from(3u8)));
        let child = Slot::child(&root, 2u8);
        assert_eq!(slot_address(&child), Some(BigUint::from(5u8)));
    }

    #[test]
    fn test_hashed_slot() {
        // keccak256(uint256(0)), the data slot of a dynamic array at slot 0
        let data = Slot::hashed(&Slot::new(0u8), 0u8);
        let address = slot_address(&data).unwrap();
        let expected =
            from_hex("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563").unwrap();
        assert_eq!(address, BigUint::from_bytes_be(&expected));
    }

    #[test]
    fn test_mapping_slot() {
        // mapping(uint256 => ...) at slot 0, key 0: keccak256(0 ++ 0)
        let entry = Slot::mapping(&Slot::new(0u8), Value::uint(256, 0u8));
        let address = slot_address(&entry).unwrap();
        let bytes = uint_to_bytes(&address, 32).unwrap();
        assert_eq!(
            to_hex_string(&bytes),
            "0xad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5"
        );
    }

    #[test]
    fn test_address_wraps_modulo() {
        let top = Slot::new(modulus() - BigUint::one());
        let wrapped = Slot::child(&top, 2u8);
        assert_eq!(slot_address(&wrapped), Some(BigUint::one()));
    }
}
