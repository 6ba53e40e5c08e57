//! Layout tables consumed by the encoder and decoder.
//!
//! # Module Organization
//!
//! - this module: ABI size classification and ABI/memory struct layouts
//! - [`storage`]: storage sizes and packed struct layouts
//! - [`calldata`]: argument layouts for calldata, event logs and return data
//!
//! All tables are computed once and only read afterwards.

pub mod calldata;
pub mod storage;

use std::collections::{BTreeMap, BTreeSet};

pub use calldata::{
    ArgumentAllocation, CalldataAllocation, CalldataAllocations, ContextCalldataAllocations,
    ContractAbi, DecodingMode, EventAllocation, EventAllocations,
    EventArgumentAllocation, EventArgumentPointer, EventCandidates, EventEntry, FunctionEntry,
    Parameter, ReturndataAllocation, ReturndataAllocations, ReturndataKind,
    TopicEventAllocations, allocate_arguments, builtin_revert_allocations, selector_of, signature,
};
pub use storage::{
    StorageAllocation, StorageAllocations, StorageLength, StorageMemberAllocation,
    storage_size_for_type,
};

use crate::evm::{ContractContext, WORD_SIZE};
use crate::format::{ArrayKind, BytesKind, Type, TypeId, UserDefinedTypes, Visibility};

/// ABI classification of a type: dynamic types occupy one head word holding
/// an offset; static types occupy `size` bytes in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiSizeInfo {
    pub dynamic: bool,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiMemberAllocation {
    pub name: String,
    pub ty: Type,
    /// Offset of the member's head from the start of the struct.
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiAllocation {
    pub members: Vec<AbiMemberAllocation>,
    pub dynamic: bool,
    /// Total head size of the members.
    pub length: usize,
}

pub type AbiAllocations = BTreeMap<TypeId, AbiAllocation>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMemberAllocation {
    pub name: String,
    pub ty: Type,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAllocation {
    pub members: Vec<MemoryMemberAllocation>,
}

pub type MemoryAllocations = BTreeMap<TypeId, MemoryAllocation>;

/// Size classification, or `None` if the type has no ABI encoding or refers
/// to a struct with no ABI allocation.
pub fn abi_size_info(ty: &Type, allocations: &AbiAllocations) -> Option<AbiSizeInfo> {
    let word = AbiSizeInfo {
        dynamic: false,
        size: WORD_SIZE,
    };
    let pointer = AbiSizeInfo {
        dynamic: true,
        size: WORD_SIZE,
    };
    match ty {
        Type::Uint { .. }
        | Type::Int { .. }
        | Type::Fixed { .. }
        | Type::Ufixed { .. }
        | Type::Bool
        | Type::Address { .. }
        | Type::Enum { .. }
        | Type::Contract { .. }
        | Type::Bytes {
            kind: BytesKind::Static { .. },
            ..
        } => Some(word),
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. } => Some(pointer),
        Type::Function(function) => match function.visibility {
            Visibility::External => Some(word),
            Visibility::Internal => None,
        },
        Type::Array { base, kind, .. } => match kind {
            ArrayKind::Dynamic => Some(pointer),
            ArrayKind::Static { length: 0 } => Some(AbiSizeInfo {
                dynamic: false,
                size: 0,
            }),
            ArrayKind::Static { length } => {
                let base_info = abi_size_info(base, allocations)?;
                if base_info.dynamic {
                    Some(pointer)
                } else {
                    Some(AbiSizeInfo {
                        dynamic: false,
                        size: base_info.size.checked_mul(*length)?,
                    })
                }
            }
        },
        Type::Struct { id, .. } => {
            let allocation = allocations.get(id)?;
            Some(if allocation.dynamic {
                pointer
            } else {
                AbiSizeInfo {
                    dynamic: false,
                    size: allocation.length,
                }
            })
        }
        Type::Tuple { members } => {
            let mut size = 0;
            for member in members {
                let info = abi_size_info(&member.ty, allocations)?;
                if info.dynamic {
                    return Some(pointer);
                }
                size += info.size;
            }
            Some(AbiSizeInfo {
                dynamic: false,
                size,
            })
        }
        Type::Mapping { .. } | Type::Magic { .. } => None,
    }
}

/// ABI layouts of every struct that can appear in the ABI. Structs that
/// contain mappings or internal functions, or are defined recursively
/// through static members, get no entry.
pub fn abi_allocations(user_defined_types: &UserDefinedTypes) -> AbiAllocations {
    let mut allocations = AbiAllocations::new();
    let mut in_progress = BTreeSet::new();
    for definition in user_defined_types.structs() {
        allocate_abi_struct(&definition.id, user_defined_types, &mut allocations, &mut in_progress);
    }
    allocations
}

fn allocate_abi_struct(
    id: &str,
    user_defined_types: &UserDefinedTypes,
    allocations: &mut AbiAllocations,
    in_progress: &mut BTreeSet<TypeId>,
) -> Option<()> {
    if allocations.contains_key(id) {
        return Some(());
    }
    if !in_progress.insert(id.to_string()) {
        return None;
    }
    let result = build_abi_struct(id, user_defined_types, allocations, in_progress);
    in_progress.remove(id);
    let allocation = result?;
    allocations.insert(id.to_string(), allocation);
    Some(())
}

fn build_abi_struct(
    id: &str,
    user_defined_types: &UserDefinedTypes,
    allocations: &mut AbiAllocations,
    in_progress: &mut BTreeSet<TypeId>,
) -> Option<AbiAllocation> {
    let definition = user_defined_types.struct_definition(id)?;
    let mut members = Vec::with_capacity(definition.members.len());
    let mut offset = 0;
    let mut dynamic = false;
    for member in &definition.members {
        for nested in static_struct_dependencies(&member.ty) {
            allocate_abi_struct(&nested, user_defined_types, allocations, in_progress)?;
        }
        let info = abi_size_info(&member.ty, allocations)?;
        members.push(AbiMemberAllocation {
            name: member.name.clone(),
            ty: member.ty.clone(),
            offset,
            length: info.size,
        });
        offset += info.size;
        dynamic |= info.dynamic;
    }
    Some(AbiAllocation {
        members,
        dynamic,
        length: offset,
    })
}

/// Struct ids whose allocation is needed to size `ty`. Elements of dynamic
/// arrays sit behind a pointer, so they are not dependencies.
fn static_struct_dependencies(ty: &Type) -> Vec<TypeId> {
    match ty {
        Type::Struct { id, .. } => vec![id.clone()],
        Type::Array {
            kind: ArrayKind::Dynamic,
            ..
        } => Vec::new(),
        Type::Array { base, .. } => static_struct_dependencies(base),
        Type::Tuple { members } => members
            .iter()
            .flat_map(|member| static_struct_dependencies(&member.ty))
            .collect(),
        _ => Vec::new(),
    }
}

/// Memory layouts: one word per member, mappings omitted.
pub fn memory_allocations(user_defined_types: &UserDefinedTypes) -> MemoryAllocations {
    user_defined_types
        .structs()
        .map(|definition| {
            let members = definition
                .members
                .iter()
                .filter(|member| !matches!(member.ty, Type::Mapping { .. }))
                .enumerate()
                .map(|(i, member)| MemoryMemberAllocation {
                    name: member.name.clone(),
                    ty: member.ty.clone(),
                    offset: i * WORD_SIZE,
                    length: WORD_SIZE,
                })
                .collect();
            (definition.id.clone(), MemoryAllocation { members })
        })
        .collect()
}

/// Every layout table the decoder consults.
#[derive(Debug, Clone, Default)]
pub struct Allocations {
    pub abi: AbiAllocations,
    pub memory: MemoryAllocations,
    pub storage: StorageAllocations,
    pub calldata: CalldataAllocations,
    pub event: EventAllocations,
    pub returndata: ReturndataAllocations,
}

impl Allocations {
    /// Struct layouts for every user-defined struct.
    pub fn new(user_defined_types: &UserDefinedTypes) -> Self {
        Self {
            abi: abi_allocations(user_defined_types),
            memory: memory_allocations(user_defined_types),
            storage: storage::storage_allocations(user_defined_types),
            ..Self::default()
        }
    }

    /// Add the calldata, event and return layouts for one contract context.
    pub fn with_contract(
        mut self,
        context: &ContractContext,
        abi: &ContractAbi,
        user_defined_types: &UserDefinedTypes,
    ) -> Self {
        calldata::allocate_contract(&mut self, context, abi, user_defined_types);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::StructDefinition;

    fn types() -> UserDefinedTypes {
        let mut types = UserDefinedTypes::new();
        types.insert_struct(
            StructDefinition::new("pair", "Pair")
                .member("a", Type::uint(8))
                .member("b", Type::string()),
        );
        types.insert_struct(
            StructDefinition::new("point", "Point")
                .member("x", Type::uint(256))
                .member("y", Type::uint(256)),
        );
        let point = types.find_struct("Point").cloned().unwrap();
        types.insert_struct(
            StructDefinition::new("line", "Line")
                .member("from", Type::struct_of(&point))
                .member("to", Type::struct_of(&point)),
        );
        types.insert_struct(
            StructDefinition::new("holder", "Holder").member(
                "balances",
                Type::Mapping {
                    key: Box::new(Type::address()),
                    value: Box::new(Type::uint(256)),
                    location: None,
                },
            ),
        );
        types
    }

    #[test]
    fn test_abi_size_info_scalars_and_arrays() {
        let allocations = AbiAllocations::new();
        assert_eq!(
            abi_size_info(&Type::uint(8), &allocations),
            Some(AbiSizeInfo {
                dynamic: false,
                size: 32
            })
        );
        assert_eq!(
            abi_size_info(&Type::array(Type::uint(8), 3), &allocations),
            Some(AbiSizeInfo {
                dynamic: false,
                size: 96
            })
        );
        assert_eq!(
            abi_size_info(&Type::array(Type::string(), 3), &allocations),
            Some(AbiSizeInfo {
                dynamic: true,
                size: 32
            })
        );
        assert_eq!(
            abi_size_info(&Type::array(Type::string(), 0), &allocations),
            Some(AbiSizeInfo {
                dynamic: false,
                size: 0
            })
        );
    }

    #[test]
    fn test_abi_struct_allocations() {
        let types = types();
        let allocations = abi_allocations(&types);
        let pair = &allocations["pair"];
        assert!(pair.dynamic);
        assert_eq!(pair.members[1].offset, 32);
        let line = &allocations["line"];
        assert!(!line.dynamic);
        assert_eq!(line.length, 128);
        assert_eq!(line.members[1].offset, 64);
        assert!(!allocations.contains_key("holder"));
    }

    #[test]
    fn test_memory_allocations_skip_mappings() {
        let types = types();
        let allocations = memory_allocations(&types);
        assert!(allocations["holder"].members.is_empty());
        assert_eq!(allocations["pair"].members[1].offset, 32);
    }
}
