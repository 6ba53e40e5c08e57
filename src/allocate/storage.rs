//! Storage sizes and packed struct layouts.
//!
//! Values smaller than a word are packed: each fills the current slot from
//! the low-order end, moving to a fresh slot when it does not fit. Values
//! that occupy whole words always start a fresh slot, and so does whatever
//! follows them.

use std::collections::{BTreeMap, BTreeSet};

use crate::evm::{ADDRESS_SIZE, PC_SIZE, SELECTOR_SIZE, WORD_SIZE};
use crate::format::{ArrayKind, BytesKind, Type, TypeId, UserDefinedTypes, Visibility, enum_width};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLength {
    /// Packs into part of a slot.
    Bytes(usize),
    /// Occupies whole slots.
    Words(usize),
}

impl StorageLength {
    pub fn is_words(&self) -> bool {
        matches!(self, StorageLength::Words(_))
    }

    /// Length in bytes.
    pub fn byte_length(&self) -> usize {
        match self {
            StorageLength::Bytes(bytes) => *bytes,
            StorageLength::Words(words) => words * WORD_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMemberAllocation {
    pub name: String,
    pub ty: Type,
    /// Slot offset from the start of the struct.
    pub slot_offset: usize,
    /// First byte within the slot, from the high-order end.
    pub index: usize,
    pub length: StorageLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAllocation {
    pub members: Vec<StorageMemberAllocation>,
    pub size: StorageLength,
}

pub type StorageAllocations = BTreeMap<TypeId, StorageAllocation>;

/// Storage footprint of a type, or `None` for types that cannot live in
/// storage (tuples, magic variables) or unknown structs.
pub fn storage_size_for_type(ty: &Type, allocations: &StorageAllocations) -> Option<StorageLength> {
    Some(match ty {
        Type::Bool => StorageLength::Bytes(1),
        Type::Address { .. } | Type::Contract { .. } => StorageLength::Bytes(ADDRESS_SIZE),
        Type::Uint { bits }
        | Type::Int { bits }
        | Type::Fixed { bits, .. }
        | Type::Ufixed { bits, .. } => StorageLength::Bytes(usize::from(*bits) / 8),
        Type::Bytes {
            kind: BytesKind::Static { length },
            ..
        } => StorageLength::Bytes(usize::from(*length)),
        Type::Enum { options, .. } => StorageLength::Bytes(enum_width(options.len())),
        Type::Function(function) => match function.visibility {
            Visibility::Internal => StorageLength::Bytes(2 * PC_SIZE),
            Visibility::External => StorageLength::Bytes(ADDRESS_SIZE + SELECTOR_SIZE),
        },
        Type::Bytes {
            kind: BytesKind::Dynamic,
            ..
        }
        | Type::String { .. }
        | Type::Mapping { .. }
        | Type::Array {
            kind: ArrayKind::Dynamic,
            ..
        } => StorageLength::Words(1),
        Type::Array {
            base,
            kind: ArrayKind::Static { length },
            ..
        } => match storage_size_for_type(base, allocations)? {
            StorageLength::Words(words) => StorageLength::Words(words.checked_mul(*length)?),
            StorageLength::Bytes(bytes) => {
                let per_word = (WORD_SIZE / bytes.max(1)).max(1);
                StorageLength::Words(length.div_ceil(per_word))
            }
        },
        Type::Struct { id, .. } => allocations.get(id)?.size,
        Type::Tuple { .. } | Type::Magic { .. } => return None,
    })
}

/// Packed layouts of every struct that can live in storage.
pub fn storage_allocations(user_defined_types: &UserDefinedTypes) -> StorageAllocations {
    let mut allocations = StorageAllocations::new();
    let mut in_progress = BTreeSet::new();
    for definition in user_defined_types.structs() {
        allocate_storage_struct(&definition.id, user_defined_types, &mut allocations, &mut in_progress);
    }
    allocations
}

fn allocate_storage_struct(
    id: &str,
    user_defined_types: &UserDefinedTypes,
    allocations: &mut StorageAllocations,
    in_progress: &mut BTreeSet<TypeId>,
) -> Option<()> {
    if allocations.contains_key(id) {
        return Some(());
    }
    if !in_progress.insert(id.to_string()) {
        return None;
    }
    let result = build_storage_struct(id, user_defined_types, allocations, in_progress);
    in_progress.remove(id);
    allocations.insert(id.to_string(), result?);
    Some(())
}

fn build_storage_struct(
    id: &str,
    user_defined_types: &UserDefinedTypes,
    allocations: &mut StorageAllocations,
    in_progress: &mut BTreeSet<TypeId>,
) -> Option<StorageAllocation> {
    let definition = user_defined_types.struct_definition(id)?;
    let mut members = Vec::with_capacity(definition.members.len());
    let mut slot = 0usize;
    let mut used = 0usize;
    for member in &definition.members {
        if let Some(nested) = inline_struct(&member.ty) {
            allocate_storage_struct(nested, user_defined_types, allocations, in_progress)?;
        }
        let length = storage_size_for_type(&member.ty, allocations)?;
        let (slot_offset, index) = match length {
            StorageLength::Words(words) => {
                if used > 0 {
                    slot += 1;
                }
                let start = slot;
                slot += words;
                used = 0;
                (start, 0)
            }
            StorageLength::Bytes(bytes) => {
                if used + bytes > WORD_SIZE {
                    slot += 1;
                    used = 0;
                }
                let index = WORD_SIZE - used - bytes;
                used += bytes;
                (slot, index)
            }
        };
        members.push(StorageMemberAllocation {
            name: member.name.clone(),
            ty: member.ty.clone(),
            slot_offset,
            index,
            length,
        });
    }
    let words = if used > 0 { slot + 1 } else { slot };
    Some(StorageAllocation {
        members,
        size: StorageLength::Words(words),
    })
}

/// The struct stored inline by a member of this type, if any.
fn inline_struct(ty: &Type) -> Option<&str> {
    match ty {
        Type::Struct { id, .. } => Some(id),
        Type::Array {
            base,
            kind: ArrayKind::Static { .. },
            ..
        } => inline_struct(base),
        _ => None,
    }
}
