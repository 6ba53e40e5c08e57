//! Argument layouts for function calls, constructor calls, event logs and
//! return data.
//!
//! Arguments are laid out as an ABI tuple. Layouts are computed from the
//! full (source-level) types when every struct involved has an ABI
//! allocation; otherwise from the abified types, and the allocation is then
//! marked [`DecodingMode::Abi`] so the decoder never attempts full mode.

use std::collections::BTreeMap;

use super::{AbiAllocations, Allocations, abi_size_info};
use crate::conversion::keccak256;
use crate::evm::{ContextHash, ContractContext, ContractKind, SELECTOR_SIZE, Selector};
use crate::format::{Type, UserDefinedTypes};
use crate::logging::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Option<String>,
    pub ty: Type,
    pub indexed: bool,
}

impl Parameter {
    pub fn new(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            indexed: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            indexed: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: String,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<Parameter>,
}

impl FunctionEntry {
    pub fn signature(&self, user_defined_types: &UserDefinedTypes) -> Option<String> {
        signature(&self.name, &self.inputs, user_defined_types)
    }

    pub fn selector(&self, user_defined_types: &UserDefinedTypes) -> Option<Selector> {
        Some(selector_of(&self.signature(user_defined_types)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    pub name: String,
    pub inputs: Vec<Parameter>,
    pub anonymous: bool,
}

impl EventEntry {
    pub fn signature(&self, user_defined_types: &UserDefinedTypes) -> Option<String> {
        signature(&self.name, &self.inputs, user_defined_types)
    }
}

/// The externally visible interface of one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractAbi {
    pub constructor: Option<Vec<Parameter>>,
    pub functions: Vec<FunctionEntry>,
    pub events: Vec<EventEntry>,
}

/// `name(type1,type2,...)` using canonical ABI type strings.
pub fn signature(name: &str, inputs: &[Parameter], user_defined_types: &UserDefinedTypes) -> Option<String> {
    let types = inputs
        .iter()
        .map(|input| input.ty.abi_type_string(user_defined_types))
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{name}({})", types.join(",")))
}

/// First four bytes of the keccak hash of a signature.
pub fn selector_of(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; SELECTOR_SIZE];
    for (out, byte) in selector.iter_mut().zip(hash.iter()) {
        *out = *byte;
    }
    selector
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingMode {
    Full,
    Abi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentAllocation {
    pub name: Option<String>,
    /// Source-level type; decoded as its abified form in ABI mode.
    pub ty: Type,
    /// Head offset from the start of the argument tuple.
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalldataAllocation {
    pub name: String,
    pub abi_signature: String,
    /// Where the argument tuple starts: after the selector for functions,
    /// after the creation bytecode for constructors.
    pub offset: usize,
    pub arguments: Vec<ArgumentAllocation>,
    pub mode: DecodingMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextCalldataAllocations {
    pub constructor: Option<CalldataAllocation>,
    pub functions: BTreeMap<Selector, CalldataAllocation>,
}

pub type CalldataAllocations = BTreeMap<ContextHash, ContextCalldataAllocations>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventArgumentPointer {
    /// Head position within the event data.
    Data { offset: usize, length: usize },
    Topic(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArgumentAllocation {
    pub name: Option<String>,
    pub ty: Type,
    pub indexed: bool,
    pub pointer: EventArgumentPointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAllocation {
    pub name: String,
    pub abi_signature: String,
    pub anonymous: bool,
    pub context: ContextHash,
    pub contract_name: Option<String>,
    pub contract_kind: ContractKind,
    /// Topic 0 of a named event.
    pub selector: Option<[u8; 32]>,
    pub arguments: Vec<EventArgumentAllocation>,
    pub mode: DecodingMode,
}

/// Candidates split by whether they were declared in a library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCandidates {
    pub contract: BTreeMap<ContextHash, Vec<EventAllocation>>,
    pub library: BTreeMap<ContextHash, Vec<EventAllocation>>,
}

impl EventCandidates {
    fn push(&mut self, allocation: EventAllocation) {
        let by_context = match allocation.contract_kind {
            ContractKind::Library => &mut self.library,
            ContractKind::Contract | ContractKind::Interface => &mut self.contract,
        };
        by_context.entry(allocation.context.clone()).or_default().push(allocation);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicEventAllocations {
    pub by_selector: BTreeMap<[u8; 32], EventCandidates>,
    pub anonymous: EventCandidates,
}

/// Event layouts keyed by the number of topics a log carries.
pub type EventAllocations = BTreeMap<usize, TopicEventAllocations>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturndataKind {
    Return,
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturndataAllocation {
    pub kind: ReturndataKind,
    pub name: String,
    pub abi_signature: String,
    /// Revert selector; return data has none.
    pub selector: Option<Selector>,
    pub offset: usize,
    pub arguments: Vec<ArgumentAllocation>,
    pub mode: DecodingMode,
}

/// Return layouts keyed by context, then by the selector of the function
/// that produced the data.
pub type ReturndataAllocations = BTreeMap<ContextHash, BTreeMap<Selector, ReturndataAllocation>>;

/// The built-in revert payloads: `Error(string)` and `Panic(uint256)`.
pub fn builtin_revert_allocations() -> Vec<ReturndataAllocation> {
    let builtin = |name: &str, ty: Type| {
        let parameters = [Parameter::new(ty)];
        let empty = AbiAllocations::new();
        let types = UserDefinedTypes::new();
        let (arguments, mode) = allocate_arguments(&parameters, &empty, &types)?;
        let abi_signature = signature(name, &parameters, &types)?;
        Some(ReturndataAllocation {
            kind: ReturndataKind::Revert,
            name: name.to_string(),
            selector: Some(selector_of(&abi_signature)),
            abi_signature,
            offset: SELECTOR_SIZE,
            arguments,
            mode,
        })
    };
    [builtin("Error", Type::string()), builtin("Panic", Type::uint(256))]
        .into_iter()
        .flatten()
        .collect()
}

/// Lay out parameters as an ABI tuple, in full mode when possible.
pub fn allocate_arguments(
    parameters: &[Parameter],
    allocations: &AbiAllocations,
    user_defined_types: &UserDefinedTypes,
) -> Option<(Vec<ArgumentAllocation>, DecodingMode)> {
    if let Some(arguments) = lay_out(parameters, |ty| Some(ty.clone()), allocations) {
        return Some((arguments, DecodingMode::Full));
    }
    let arguments = lay_out(parameters, |ty| ty.abify(user_defined_types), allocations)?;
    Some((arguments, DecodingMode::Abi))
}

fn lay_out(
    parameters: &[Parameter],
    view: impl Fn(&Type) -> Option<Type>,
    allocations: &AbiAllocations,
) -> Option<Vec<ArgumentAllocation>> {
    let mut offset = 0;
    let mut arguments = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let info = abi_size_info(&view(&parameter.ty)?, allocations)?;
        arguments.push(ArgumentAllocation {
            name: parameter.name.clone(),
            ty: parameter.ty.clone(),
            offset,
            length: info.size,
        });
        offset += info.size;
    }
    Some(arguments)
}

pub(super) fn allocate_contract(
    allocations: &mut Allocations,
    context: &ContractContext,
    abi: &ContractAbi,
    user_defined_types: &UserDefinedTypes,
) {
    let contract_name = context.contract_name.clone().unwrap_or_default();
    if context.is_constructor {
        let inputs = abi.constructor.clone().unwrap_or_default();
        let allocated = allocate_arguments(&inputs, &allocations.abi, user_defined_types).zip(signature(
            &contract_name,
            &inputs,
            user_defined_types,
        ));
        if let Some(((arguments, mode), abi_signature)) = allocated {
            allocations
                .calldata
                .entry(context.context.clone())
                .or_default()
                .constructor = Some(CalldataAllocation {
                name: contract_name,
                abi_signature,
                offset: context.binary.len(),
                arguments,
                mode,
            });
        }
        return;
    }

    for function in &abi.functions {
        let Some(abi_signature) = function.signature(user_defined_types) else {
            debug!(function = %function.name, "skipping function with no ABI signature");
            continue;
        };
        let selector = selector_of(&abi_signature);
        if let Some((arguments, mode)) = allocate_arguments(&function.inputs, &allocations.abi, user_defined_types) {
            allocations
                .calldata
                .entry(context.context.clone())
                .or_default()
                .functions
                .insert(
                    selector,
                    CalldataAllocation {
                        name: function.name.clone(),
                        abi_signature: abi_signature.clone(),
                        offset: SELECTOR_SIZE,
                        arguments,
                        mode,
                    },
                );
        }
        if let Some((arguments, mode)) = allocate_arguments(&function.outputs, &allocations.abi, user_defined_types) {
            allocations.returndata.entry(context.context.clone()).or_default().insert(
                selector,
                ReturndataAllocation {
                    kind: ReturndataKind::Return,
                    name: function.name.clone(),
                    abi_signature,
                    selector: None,
                    offset: 0,
                    arguments,
                    mode,
                },
            );
        }
    }

    for event in &abi.events {
        if let Some(allocation) = allocate_event(event, context, &allocations.abi, user_defined_types) {
            let topics = allocation
                .arguments
                .iter()
                .filter(|argument| argument.indexed)
                .count()
                + usize::from(!event.anonymous);
            let by_topics = allocations.event.entry(topics).or_default();
            match allocation.selector {
                Some(selector) => by_topics.by_selector.entry(selector).or_default().push(allocation),
                None => by_topics.anonymous.push(allocation),
            }
        }
    }
}

fn allocate_event(
    event: &EventEntry,
    context: &ContractContext,
    allocations: &AbiAllocations,
    user_defined_types: &UserDefinedTypes,
) -> Option<EventAllocation> {
    let abi_signature = event.signature(user_defined_types)?;
    let data_parameters: Vec<Parameter> = event.inputs.iter().filter(|input| !input.indexed).cloned().collect();
    let (data_arguments, mode) = allocate_arguments(&data_parameters, allocations, user_defined_types)?;
    let mut data_arguments = data_arguments.into_iter();
    let mut topic = usize::from(!event.anonymous);
    let mut arguments = Vec::with_capacity(event.inputs.len());
    for input in &event.inputs {
        let pointer = if input.indexed {
            let pointer = EventArgumentPointer::Topic(topic);
            topic += 1;
            pointer
        } else {
            let data = data_arguments.next()?;
            EventArgumentPointer::Data {
                offset: data.offset,
                length: data.length,
            }
        };
        arguments.push(EventArgumentAllocation {
            name: input.name.clone(),
            ty: input.ty.clone(),
            indexed: input.indexed,
            pointer,
        });
    }
    Some(EventAllocation {
        name: event.name.clone(),
        selector: (!event.anonymous).then(|| keccak256(abi_signature.as_bytes())),
        abi_signature,
        anonymous: event.anonymous,
        context: context.context.clone(),
        contract_name: context.contract_name.clone(),
        contract_kind: context.contract_kind,
        arguments,
        mode,
    })
}
