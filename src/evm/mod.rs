//! EVM primitives: word sizes, addresses, resident machine state and the
//! contract contexts used to recognise code.

mod context;
mod state;

pub use context::{
    ContractContext, ContractInfo, ContractKind, Contexts, ContextHash, FallbackKind,
    InternalFunctionEntry,
};
pub use state::{ByteSource, EvmState, Special};

use std::fmt;
use std::str::FromStr;


pub const WORD_SIZE: usize = 32;
pub const ADDRESS_SIZE: usize = 20;
pub const SELECTOR_SIZE: usize = 4;
pub const PC_SIZE: usize = 4;

/// A 4-byte function selector.
pub type Selector = [u8; SELECTOR_SIZE];

/// A 20-byte account address. Displays in EIP-55 checksum form.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    /// Build from exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ADDRESS_SIZE] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Take the low 20 bytes of a (possibly padded) word.
    pub fn from_word(word: &[u8]) -> Option<Self> {
        let start = word.len().checked_sub(ADDRESS_SIZE)?;
        Self::from_slice(word.get(start..)?)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// EIP-55 mixed-case rendering, without a chain id.
    pub fn to_checksum(&self) -> String {
        alloy_primitives::Address::new(self.0).to_checksum(None)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts 40 hex digits with or without `0x`; case is not checked.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: alloy_primitives::Address = s.parse().map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(address.0.0))
    }
}

/// An address string that was not 20 bytes of hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address: {0}")]
pub struct AddressParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(address.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert!("0x1234".parse::<Address>().is_err());
        assert_eq!("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_checksum_vectors() {
        // EIP-55 reference vectors: all caps, all lower, mixed
        for expected in [
            "0x52908400098527886E0F7030069857D2E4169EE7",
            "0xde709f2102306220921060314715629080e2fb77",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        ] {
            let address: Address = expected.parse().unwrap();
            assert_eq!(address.to_checksum(), expected);
        }
    }

    #[test]
    fn test_address_from_word() {
        let mut word = vec![0u8; 12];
        word.extend_from_slice(&[0x11; 20]);
        assert_eq!(Address::from_word(&word), Some(Address([0x11; 20])));
        assert_eq!(Address::from_word(&[1, 2, 3]), None);
    }
}
