//! Known contract contexts.
//!
//! A context is one piece of bytecode (deployed or constructor) with what we
//! know about the contract it belongs to. The decoder matches code fetched
//! from the driver against these to recognise contracts and functions.

use std::collections::BTreeMap;

use super::Selector;

/// Identifier of a context, typically a hash of its bytecode.
pub type ContextHash = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractKind {
    #[default]
    Contract,
    Library,
    Interface,
}

/// Which special entry point handles a message with no matching function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Fallback,
    Receive,
}

/// An entry of the internal-functions table, keyed by program counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalFunctionEntry {
    pub name: String,
    pub defined_in: Option<String>,
    /// The compiler-generated target for uninitialized function pointers.
    pub is_designated_invalid: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContractContext {
    pub context: ContextHash,
    pub contract_name: Option<String>,
    pub contract_kind: ContractKind,
    pub binary: Vec<u8>,
    pub is_constructor: bool,
    pub payable: bool,
    /// External functions by selector, as `name(types)` signatures.
    pub functions: BTreeMap<Selector, String>,
    pub has_fallback: bool,
    pub has_receive: bool,
    pub internal_functions: Option<BTreeMap<u32, InternalFunctionEntry>>,
}

impl ContractContext {
    pub fn new(context: impl Into<ContextHash>, binary: Vec<u8>) -> Self {
        Self {
            context: context.into(),
            binary,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.contract_name = Some(name.into());
        self
    }

    pub fn with_function(mut self, selector: Selector, signature: impl Into<String>) -> Self {
        self.functions.insert(selector, signature.into());
        self
    }

    /// Summary used to tag decoded values and decodings.
    pub fn info(&self) -> ContractInfo {
        ContractInfo {
            context: self.context.clone(),
            name: self.contract_name.clone(),
            kind: self.contract_kind,
            payable: self.payable,
        }
    }

    /// The entry point that receives a message with no matching selector.
    pub fn fallback_for(&self, calldata_is_empty: bool) -> Option<FallbackKind> {
        if calldata_is_empty && self.has_receive {
            Some(FallbackKind::Receive)
        } else if self.has_fallback {
            Some(FallbackKind::Fallback)
        } else {
            None
        }
    }
}

/// What a decoded contract value records about its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInfo {
    pub context: ContextHash,
    pub name: Option<String>,
    pub kind: ContractKind,
    pub payable: bool,
}

/// The set of known contexts.
#[derive(Debug, Clone, Default)]
pub struct Contexts {
    contexts: BTreeMap<ContextHash, ContractContext>,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: ContractContext) {
        self.contexts.insert(context.context.clone(), context);
    }

    pub fn get(&self, hash: &str) -> Option<&ContractContext> {
        self.contexts.get(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractContext> {
        self.contexts.values()
    }

    /// Find the deployed context whose bytecode is exactly `code`.
    pub fn find_by_code(&self, code: &[u8]) -> Option<&ContractContext> {
        if code.is_empty() {
            return None;
        }
        self.contexts
            .values()
            .find(|context| !context.is_constructor && context.binary == code)
    }
}

impl FromIterator<ContractContext> for Contexts {
    fn from_iter<I: IntoIterator<Item = ContractContext>>(iter: I) -> Self {
        let mut contexts = Self::new();
        for context in iter {
            contexts.insert(context);
        }
        contexts
    }
}
