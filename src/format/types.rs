//! The type model: one variant per Solidity type class, carrying only the
//! metadata needed to lay values out in bytes.
//!
//! Structs are referenced by id rather than embedding their members, since
//! struct types may be recursive; member lists live in [`UserDefinedTypes`].

use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a user-defined type (struct, enum or contract).
pub type TypeId = String;

/// Data location of a reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Memory,
    Storage,
    Calldata,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str("memory"),
            Location::Storage => f.write_str("storage"),
            Location::Calldata => f.write_str("calldata"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BytesKind {
    /// `bytes1` .. `bytes32`.
    Static { length: u8 },
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Static { length: usize },
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub visibility: Visibility,
    pub inputs: Vec<Type>,
    pub outputs: Vec<Type>,
}

/// A tuple component, optionally named.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberType {
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagicVariable {
    Message,
    Transaction,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Uint { bits: u16 },
    Int { bits: u16 },
    Fixed { bits: u16, places: u8 },
    Ufixed { bits: u16, places: u8 },
    Bool,
    Address { payable: bool },
    Bytes { kind: BytesKind, location: Option<Location> },
    String { location: Option<Location> },
    Array {
        base: Box<Type>,
        kind: ArrayKind,
        location: Option<Location>,
    },
    Struct {
        id: TypeId,
        name: String,
        location: Option<Location>,
    },
    Enum {
        id: TypeId,
        name: String,
        options: Vec<String>,
    },
    Contract {
        id: TypeId,
        name: String,
        payable: bool,
    },
    Function(FunctionType),
    Mapping {
        key: Box<Type>,
        value: Box<Type>,
        location: Option<Location>,
    },
    Tuple { members: Vec<MemberType> },
    Magic { variable: MagicVariable },
}

impl Type {
    pub fn uint(bits: u16) -> Self {
        Type::Uint { bits }
    }

    pub fn int(bits: u16) -> Self {
        Type::Int { bits }
    }

    pub fn address() -> Self {
        Type::Address { payable: false }
    }

    /// `bytesN`.
    pub fn fixed_bytes(length: u8) -> Self {
        Type::Bytes {
            kind: BytesKind::Static { length },
            location: None,
        }
    }

    pub fn bytes() -> Self {
        Type::Bytes {
            kind: BytesKind::Dynamic,
            location: None,
        }
    }

    pub fn string() -> Self {
        Type::String { location: None }
    }

    pub fn array(base: Type, length: usize) -> Self {
        Type::Array {
            base: Box::new(base),
            kind: ArrayKind::Static { length },
            location: None,
        }
    }

    pub fn dynamic_array(base: Type) -> Self {
        Type::Array {
            base: Box::new(base),
            kind: ArrayKind::Dynamic,
            location: None,
        }
    }

    /// An unnamed tuple of the given component types.
    pub fn tuple(members: Vec<Type>) -> Self {
        Type::Tuple {
            members: members
                .into_iter()
                .map(|ty| MemberType { name: None, ty })
                .collect(),
        }
    }

    pub fn struct_of(definition: &StructDefinition) -> Self {
        Type::Struct {
            id: definition.id.clone(),
            name: definition.name.clone(),
            location: None,
        }
    }

    pub fn enum_of(definition: &EnumDefinition) -> Self {
        Type::Enum {
            id: definition.id.clone(),
            name: definition.name.clone(),
            options: definition.options.clone(),
        }
    }

    pub fn external_function() -> Self {
        Type::Function(FunctionType {
            visibility: Visibility::External,
            inputs: Vec::new(),
            outputs: Vec::new(),
        })
    }

    /// Short class tag, e.g. `uint` or `struct`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Type::Uint { .. } => "uint",
            Type::Int { .. } => "int",
            Type::Fixed { .. } => "fixed",
            Type::Ufixed { .. } => "ufixed",
            Type::Bool => "bool",
            Type::Address { .. } => "address",
            Type::Bytes { .. } => "bytes",
            Type::String { .. } => "string",
            Type::Array { .. } => "array",
            Type::Struct { .. } => "struct",
            Type::Enum { .. } => "enum",
            Type::Contract { .. } => "contract",
            Type::Function(_) => "function",
            Type::Mapping { .. } => "mapping",
            Type::Tuple { .. } => "tuple",
            Type::Magic { .. } => "magic",
        }
    }

    /// Reference types are those that carry a data location.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            } | Type::String { .. }
                | Type::Array { .. }
                | Type::Struct { .. }
                | Type::Mapping { .. }
        )
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Type::Bytes { location, .. }
            | Type::String { location }
            | Type::Array { location, .. }
            | Type::Struct { location, .. }
            | Type::Mapping { location, .. } => *location,
            _ => None,
        }
    }

    /// Copy of this type with the given location applied to it and, for
    /// arrays, to its element type.
    pub fn specify_location(&self, new_location: Option<Location>) -> Type {
        match self {
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            } => Type::Bytes {
                kind: BytesKind::Dynamic,
                location: new_location,
            },
            Type::String { .. } => Type::String {
                location: new_location,
            },
            Type::Array { base, kind, .. } => Type::Array {
                base: Box::new(base.specify_location(new_location)),
                kind: *kind,
                location: new_location,
            },
            Type::Struct { id, name, .. } => Type::Struct {
                id: id.clone(),
                name: name.clone(),
                location: new_location,
            },
            Type::Mapping { key, value, .. } => Type::Mapping {
                key: key.clone(),
                value: Box::new(value.specify_location(new_location)),
                location: new_location,
            },
            other => other.clone(),
        }
    }

    /// Solidity-style type string, including the data location.
    pub fn type_string(&self) -> String {
        let bare = self.type_string_without_location();
        match self.location() {
            Some(location) => format!("{bare} {location}"),
            None => bare,
        }
    }

    fn type_string_without_location(&self) -> String {
        match self {
            Type::Uint { bits } => format!("uint{bits}"),
            Type::Int { bits } => format!("int{bits}"),
            Type::Fixed { bits, places } => format!("fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => format!("ufixed{bits}x{places}"),
            Type::Bool => "bool".to_string(),
            Type::Address { payable: true } => "address payable".to_string(),
            Type::Address { payable: false } => "address".to_string(),
            Type::Bytes {
                kind: BytesKind::Static { length },
                ..
            } => format!("bytes{length}"),
            Type::Bytes {
                kind: BytesKind::Dynamic,
                ..
            } => "bytes".to_string(),
            Type::String { .. } => "string".to_string(),
            Type::Array { base, kind, .. } => {
                let base = base.type_string_without_location();
                match kind {
                    ArrayKind::Static { length } => format!("{base}[{length}]"),
                    ArrayKind::Dynamic => format!("{base}[]"),
                }
            }
            Type::Struct { name, .. } => format!("struct {name}"),
            Type::Enum { name, .. } => format!("enum {name}"),
            Type::Contract { name, .. } => format!("contract {name}"),
            Type::Function(function) => {
                let list = |types: &[Type]| {
                    types
                        .iter()
                        .map(Type::type_string)
                        .collect::<Vec<_>>()
                        .join(",")
                };
                let visibility = match function.visibility {
                    Visibility::Internal => "internal",
                    Visibility::External => "external",
                };
                let mut out = format!("function ({}) {visibility}", list(&function.inputs));
                if !function.outputs.is_empty() {
                    out.push_str(&format!(" returns ({})", list(&function.outputs)));
                }
                out
            }
            Type::Mapping { key, value, .. } => format!(
                "mapping({} => {})",
                key.type_string_without_location(),
                value.type_string_without_location()
            ),
            Type::Tuple { members } => {
                let inner: Vec<String> = members.iter().map(|m| m.ty.type_string()).collect();
                format!("tuple({})", inner.join(","))
            }
            Type::Magic { variable } => match variable {
                MagicVariable::Message => "msg".to_string(),
                MagicVariable::Transaction => "tx".to_string(),
                MagicVariable::Block => "block".to_string(),
            },
        }
    }

    /// Canonical ABI type string as used in signatures, or `None` for types
    /// that have no ABI representation.
    pub fn abi_type_string(&self, user_defined_types: &UserDefinedTypes) -> Option<String> {
        let abified = self.abify(user_defined_types)?;
        Some(match &abified {
            Type::Address { .. } => "address".to_string(),
            Type::Function(_) => "function".to_string(),
            Type::Array { base, kind, .. } => {
                let base = base.abi_type_string(user_defined_types)?;
                match kind {
                    ArrayKind::Static { length } => format!("{base}[{length}]"),
                    ArrayKind::Dynamic => format!("{base}[]"),
                }
            }
            Type::Tuple { members } => {
                let inner = members
                    .iter()
                    .map(|m| m.ty.abi_type_string(user_defined_types))
                    .collect::<Option<Vec<_>>>()?;
                format!("({})", inner.join(","))
            }
            other => other.type_string_without_location(),
        })
    }

    /// The ABI-only equivalent of this type: structs become tuples, enums
    /// become unsigned integers, contracts become addresses.
    ///
    /// Returns `None` for types that never appear in the ABI (mappings,
    /// internal functions, magic variables) and for structs whose definition
    /// is unknown.
    pub fn abify(&self, user_defined_types: &UserDefinedTypes) -> Option<Type> {
        match self {
            Type::Mapping { .. } | Type::Magic { .. } => None,
            Type::Function(function) => match function.visibility {
                Visibility::Internal => None,
                Visibility::External => Some(self.clone()),
            },
            Type::Contract { .. } => Some(Type::Address { payable: false }),
            Type::Struct { id, location, .. } => {
                let definition = user_defined_types.struct_definition(id)?;
                let members = definition
                    .members
                    .iter()
                    .map(|member| {
                        Some(MemberType {
                            name: Some(member.name.clone()),
                            ty: member.ty.specify_location(*location).abify(user_defined_types)?,
                        })
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Type::Tuple { members })
            }
            Type::Enum { options, .. } => Some(Type::Uint {
                bits: (8 * enum_width(options.len())) as u16,
            }),
            Type::Array {
                base,
                kind,
                location,
            } => Some(Type::Array {
                base: Box::new(base.abify(user_defined_types)?),
                kind: *kind,
                location: *location,
            }),
            Type::Tuple { members } => {
                let members = members
                    .iter()
                    .map(|member| {
                        Some(MemberType {
                            name: member.name.clone(),
                            ty: member.ty.abify(user_defined_types)?,
                        })
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Type::Tuple { members })
            }
            other => Some(other.clone()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_string())
    }
}

/// Bytes needed to hold an enum discriminant: one per 256 options, at least one.
pub fn enum_width(option_count: usize) -> usize {
    let mut width = 1;
    let mut capacity: u128 = 256;
    while (option_count as u128) > capacity {
        width += 1;
        capacity = capacity.saturating_mul(256);
    }
    width
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructMember {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDefinition {
    pub id: TypeId,
    pub name: String,
    pub defining_contract: Option<String>,
    pub members: Vec<StructMember>,
}

impl StructDefinition {
    pub fn new(id: impl Into<TypeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            defining_contract: None,
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.members.push(StructMember {
            name: name.into(),
            ty,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDefinition {
    pub id: TypeId,
    pub name: String,
    pub options: Vec<String>,
}

/// Lookup table for struct and enum definitions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UserDefinedTypes {
    structs: BTreeMap<TypeId, StructDefinition>,
    enums: BTreeMap<TypeId, EnumDefinition>,
}

impl UserDefinedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_struct(&mut self, definition: StructDefinition) {
        self.structs.insert(definition.id.clone(), definition);
    }

    pub fn insert_enum(&mut self, definition: EnumDefinition) {
        self.enums.insert(definition.id.clone(), definition);
    }

    pub fn struct_definition(&self, id: &str) -> Option<&StructDefinition> {
        self.structs.get(id)
    }

    pub fn enum_definition(&self, id: &str) -> Option<&EnumDefinition> {
        self.enums.get(id)
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.structs.values().find(|definition| definition.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.values().find(|definition| definition.name == name)
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDefinition> {
        self.structs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_types() -> UserDefinedTypes {
        let mut types = UserDefinedTypes::new();
        types.insert_struct(
            StructDefinition::new("1", "Pair")
                .member("a", Type::uint(8))
                .member("b", Type::string()),
        );
        types
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(Type::uint(256).type_string(), "uint256");
        assert_eq!(
            Type::dynamic_array(Type::fixed_bytes(32))
                .specify_location(Some(Location::Memory))
                .type_string(),
            "bytes32[] memory"
        );
        let mapping = Type::Mapping {
            key: Box::new(Type::address()),
            value: Box::new(Type::uint(256)),
            location: Some(Location::Storage),
        };
        assert_eq!(mapping.type_string(), "mapping(address => uint256) storage");
    }

    #[test]
    fn test_abi_type_string_of_struct() {
        let types = pair_types();
        let pair = Type::Struct {
            id: "1".to_string(),
            name: "Pair".to_string(),
            location: Some(Location::Memory),
        };
        assert_eq!(
            Type::dynamic_array(pair).abi_type_string(&types).as_deref(),
            Some("(uint8,string)[]")
        );
    }

    #[test]
    fn test_abify() {
        let types = pair_types();
        let color = Type::Enum {
            id: "2".to_string(),
            name: "Color".to_string(),
            options: vec!["Red".to_string(), "Green".to_string()],
        };
        assert_eq!(color.abify(&types), Some(Type::uint(8)));
        let contract = Type::Contract {
            id: "3".to_string(),
            name: "Token".to_string(),
            payable: true,
        };
        assert_eq!(contract.abify(&types), Some(Type::address()));
        let mapping = Type::Mapping {
            key: Box::new(Type::uint(256)),
            value: Box::new(Type::Bool),
            location: None,
        };
        assert_eq!(mapping.abify(&types), None);
        let unknown = Type::Struct {
            id: "99".to_string(),
            name: "Missing".to_string(),
            location: None,
        };
        assert_eq!(unknown.abify(&types), None);
    }

    #[test]
    fn test_enum_width() {
        assert_eq!(enum_width(1), 1);
        assert_eq!(enum_width(256), 1);
        assert_eq!(enum_width(257), 2);
    }
}
