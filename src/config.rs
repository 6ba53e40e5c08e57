//! Project files: decoder options and user-defined type definitions.
//!
//! ```toml
//! [decoder]
//! strict_abi_mode = false
//! permissive_padding = false
//!
//! [[structs]]
//! name = "Pair"
//! members = [{ name = "a", type = "uint8" }, { name = "b", type = "string" }]
//!
//! [[enums]]
//! name = "Color"
//! options = ["Red", "Green", "Blue"]
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::allocate::Allocations;
use crate::decoder::DecoderOptions;
use crate::format::{EnumDefinition, ParseTypeError, StructDefinition, UserDefinedTypes, parse_type};
use crate::logging::warn;

/// A project file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub structs: Vec<StructConfig>,
    #[serde(default)]
    pub enums: Vec<EnumConfig>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct DecoderConfig {
    /// Padding errors become fatal instead of being embedded in values.
    #[serde(default)]
    pub strict_abi_mode: bool,
    /// Accept dirty padding everywhere.
    #[serde(default)]
    pub permissive_padding: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructConfig {
    pub name: String,
    /// Defaults to the name.
    pub id: Option<String>,
    pub defining_contract: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    pub name: String,
    /// A type description such as `uint256`, `string` or `struct Pair`.
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumConfig {
    pub name: String,
    pub id: Option<String>,
    pub options: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    Io(String, std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Member '{member}' of struct {name}: {source}")]
    MemberType {
        name: String,
        member: String,
        source: ParseTypeError,
    },

    #[error("Duplicate definition of {0}")]
    Duplicate(String),
}

impl Config {
    /// Load a project file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_str(&content)
    }

    /// Parse a project file from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            strict_abi_mode: self.decoder.strict_abi_mode,
            permissive_padding: self.decoder.permissive_padding,
        }
    }

    /// Build the type table.
    ///
    /// Every struct and enum name is registered before any member type is
    /// parsed, so members may refer to types declared later in the file.
    pub fn user_defined_types(&self) -> Result<UserDefinedTypes, ConfigError> {
        let mut types = UserDefinedTypes::new();
        for definition in &self.enums {
            let id = definition.id.clone().unwrap_or_else(|| definition.name.clone());
            if types.enum_definition(&id).is_some() {
                return Err(ConfigError::Duplicate(format!("enum {}", definition.name)));
            }
            if definition.options.is_empty() {
                warn!(name = %definition.name, "enum declares no options");
            }
            types.insert_enum(EnumDefinition {
                id,
                name: definition.name.clone(),
                options: definition.options.clone(),
            });
        }
        for definition in &self.structs {
            let id = struct_id(definition);
            if types.struct_definition(&id).is_some() {
                return Err(ConfigError::Duplicate(format!("struct {}", definition.name)));
            }
            types.insert_struct(StructDefinition::new(id, definition.name.clone()));
        }

        let mut resolved = types.clone();
        for definition in &self.structs {
            let mut resolved_struct = StructDefinition::new(struct_id(definition), definition.name.clone());
            resolved_struct.defining_contract = definition.defining_contract.clone();
            for member in &definition.members {
                let ty = parse_type(&member.ty, &types).map_err(|source| ConfigError::MemberType {
                    name: definition.name.clone(),
                    member: member.name.clone(),
                    source,
                })?;
                resolved_struct = resolved_struct.member(member.name.clone(), ty);
            }
            resolved.insert_struct(resolved_struct);
        }
        Ok(resolved)
    }

    /// Type table plus the struct layouts computed from it.
    pub fn allocations(&self) -> Result<(UserDefinedTypes, Allocations), ConfigError> {
        let types = self.user_defined_types()?;
        let allocations = Allocations::new(&types);
        Ok((types, allocations))
    }
}

fn struct_id(definition: &StructConfig) -> String {
    definition.id.clone().unwrap_or_else(|| definition.name.clone())
}
