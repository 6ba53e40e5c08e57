//! Parser for Solidity-style type descriptions.
//!
//! Accepts canonical ABI strings (`uint256`, `bytes32[]`, `(uint8,string)`),
//! named tuple members (`(uint8 a, string b)`), user-defined references
//! (`struct Pair`, `enum Color`, `contract Token`, or a bare struct/enum
//! name), mappings, function types and a trailing data location
//! (`string memory`, `uint256[] storage ref`).

use thiserror::Error;

use super::types::{
    ArrayKind, FunctionType, Location, MemberType, Type, UserDefinedTypes, Visibility,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTypeError {
    #[error("Unexpected end of type description")]
    UnexpectedEnd,

    #[error("Unexpected token '{token}' in type description")]
    UnexpectedToken { token: String },

    #[error("Invalid width in '{0}'")]
    InvalidWidth(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Trailing input after type: '{0}'")]
    TrailingInput(String),
}

/// Parse a type description, resolving struct and enum names against
/// `user_defined_types`.
pub fn parse_type(description: &str, user_defined_types: &UserDefinedTypes) -> Result<Type, ParseTypeError> {
    let tokens = tokenize(description)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        user_defined_types,
    };
    let ty = parser.parse_type()?;
    match parser.peek() {
        None => Ok(ty),
        Some(_) => Err(ParseTypeError::TrailingInput(parser.remaining())),
    }
}

/// Parse a signature such as `Transfer(address,address,uint256)` into its
/// name and parameter types.
pub fn parse_signature(
    signature: &str,
    user_defined_types: &UserDefinedTypes,
) -> Result<(String, Vec<Type>), ParseTypeError> {
    let open = signature
        .find('(')
        .ok_or_else(|| ParseTypeError::UnknownType(signature.to_string()))?;
    let (name, params) = signature.split_at(open);
    let tuple = parse_type(params, user_defined_types)?;
    match tuple {
        Type::Tuple { members } => Ok((
            name.trim().to_string(),
            members.into_iter().map(|member| member.ty).collect(),
        )),
        other => Err(ParseTypeError::UnknownType(other.type_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(usize),
    Open,
    Close,
    OpenBracket,
    CloseBracket,
    Comma,
    Arrow,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Number(n) => n.to_string(),
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
            Token::OpenBracket => "[".to_string(),
            Token::CloseBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::Arrow => "=>".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseTypeError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '[' => tokens.push(Token::OpenBracket),
            ']' => tokens.push(Token::CloseBracket),
            ',' => tokens.push(Token::Comma),
            '=' => match chars.next() {
                Some((_, '>')) => tokens.push(Token::Arrow),
                _ => {
                    return Err(ParseTypeError::UnexpectedToken {
                        token: "=".to_string(),
                    });
                }
            },
            c if c.is_ascii_digit() => {
                let mut end = start + c.len_utf8();
                while let Some((i, d)) = chars.peek().copied() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let text = input.get(start..end).unwrap_or_default();
                let number = text
                    .parse()
                    .map_err(|_| ParseTypeError::InvalidWidth(text.to_string()))?;
                tokens.push(Token::Number(number));
            }
            c if is_ident_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some((i, d)) = chars.peek().copied() {
                    if !is_ident_char(d) && !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(input.get(start..end).unwrap_or_default().to_string()));
            }
            other => {
                return Err(ParseTypeError::UnexpectedToken {
                    token: other.to_string(),
                });
            }
        }
    }
    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '.'
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    user_defined_types: &'a UserDefinedTypes,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(name)) => Some(name),
            _ => None,
        }
    }

    fn next(&mut self) -> Result<Token, ParseTypeError> {
        let token = self.tokens.get(self.position).cloned().ok_or(ParseTypeError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseTypeError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ParseTypeError::UnexpectedToken {
                token: token.describe(),
            })
        }
    }

    fn ident(&mut self) -> Result<String, ParseTypeError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(ParseTypeError::UnexpectedToken {
                token: other.describe(),
            }),
        }
    }

    fn remaining(&self) -> String {
        self.tokens
            .get(self.position..)
            .unwrap_or_default()
            .iter()
            .map(Token::describe)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_type(&mut self) -> Result<Type, ParseTypeError> {
        let mut ty = self.parse_base()?;
        while self.peek() == Some(&Token::OpenBracket) {
            self.position += 1;
            let kind = match self.next()? {
                Token::CloseBracket => ArrayKind::Dynamic,
                Token::Number(length) => {
                    self.expect(Token::CloseBracket)?;
                    ArrayKind::Static { length }
                }
                other => {
                    return Err(ParseTypeError::UnexpectedToken {
                        token: other.describe(),
                    });
                }
            };
            ty = Type::Array {
                base: Box::new(ty),
                kind,
                location: None,
            };
        }
        if let Some(location) = self.parse_location() {
            ty = ty.specify_location(Some(location));
        }
        Ok(ty)
    }

    fn parse_location(&mut self) -> Option<Location> {
        let location = match self.peek_ident()? {
            "memory" => Location::Memory,
            "storage" => Location::Storage,
            "calldata" => Location::Calldata,
            _ => return None,
        };
        self.position += 1;
        if matches!(self.peek_ident(), Some("ref" | "pointer")) {
            self.position += 1;
        }
        Some(location)
    }

    fn parse_base(&mut self) -> Result<Type, ParseTypeError> {
        if self.peek() == Some(&Token::Open) {
            return self.parse_tuple();
        }
        let name = self.ident()?;
        match name.as_str() {
            "tuple" => self.parse_tuple(),
            "mapping" => {
                self.expect(Token::Open)?;
                let key = self.parse_type()?;
                self.expect(Token::Arrow)?;
                let value = self.parse_type()?;
                self.expect(Token::Close)?;
                Ok(Type::Mapping {
                    key: Box::new(key),
                    value: Box::new(value),
                    location: None,
                })
            }
            "function" => self.parse_function(),
            "struct" => {
                let struct_name = self.ident()?;
                Ok(match self.user_defined_types.find_struct(&struct_name) {
                    Some(definition) => Type::struct_of(definition),
                    None => Type::Struct {
                        id: struct_name.clone(),
                        name: struct_name,
                        location: None,
                    },
                })
            }
            "enum" => {
                let enum_name = self.ident()?;
                self.user_defined_types
                    .find_enum(&enum_name)
                    .map(Type::enum_of)
                    .ok_or(ParseTypeError::UnknownType(enum_name))
            }
            "contract" | "interface" | "library" => {
                let contract_name = self.ident()?;
                Ok(Type::Contract {
                    id: contract_name.clone(),
                    name: contract_name,
                    payable: false,
                })
            }
            "address" => {
                let payable = self.peek_ident() == Some("payable");
                if payable {
                    self.position += 1;
                }
                Ok(Type::Address { payable })
            }
            other => match parse_elementary(other)? {
                Some(ty) => Ok(ty),
                None => self.resolve_name(other),
            },
        }
    }

    fn resolve_name(&self, name: &str) -> Result<Type, ParseTypeError> {
        if let Some(definition) = self.user_defined_types.find_struct(name) {
            return Ok(Type::struct_of(definition));
        }
        if let Some(definition) = self.user_defined_types.find_enum(name) {
            return Ok(Type::enum_of(definition));
        }
        Err(ParseTypeError::UnknownType(name.to_string()))
    }

    fn parse_tuple(&mut self) -> Result<Type, ParseTypeError> {
        self.expect(Token::Open)?;
        let mut members = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.position += 1;
            return Ok(Type::Tuple { members });
        }
        loop {
            let ty = self.parse_type()?;
            let name = match self.peek() {
                Some(Token::Ident(_)) => Some(self.ident()?),
                _ => None,
            };
            members.push(MemberType { name, ty });
            match self.next()? {
                Token::Comma => {}
                Token::Close => break,
                other => {
                    return Err(ParseTypeError::UnexpectedToken {
                        token: other.describe(),
                    });
                }
            }
        }
        Ok(Type::Tuple { members })
    }

    fn parse_function(&mut self) -> Result<Type, ParseTypeError> {
        let inputs = self.parse_type_list()?;
        let mut visibility = Visibility::Internal;
        let mut outputs = Vec::new();
        while let Some(word) = self.peek_ident() {
            match word {
                "external" => visibility = Visibility::External,
                "internal" => visibility = Visibility::Internal,
                "pure" | "view" | "payable" | "nonpayable" => {}
                "returns" => {
                    self.position += 1;
                    outputs = self.parse_type_list()?;
                    continue;
                }
                _ => break,
            }
            self.position += 1;
        }
        Ok(Type::Function(FunctionType {
            visibility,
            inputs,
            outputs,
        }))
    }

    fn parse_type_list(&mut self) -> Result<Vec<Type>, ParseTypeError> {
        match self.parse_tuple()? {
            Type::Tuple { members } => Ok(members.into_iter().map(|member| member.ty).collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Elementary type names; `None` when the name is not elementary.
fn parse_elementary(name: &str) -> Result<Option<Type>, ParseTypeError> {
    let invalid = || ParseTypeError::InvalidWidth(name.to_string());
    let ty = match name {
        "bool" => Type::Bool,
        "string" => Type::string(),
        "bytes" => Type::bytes(),
        "byte" => Type::fixed_bytes(1),
        "uint" => Type::uint(256),
        "int" => Type::int(256),
        "fixed" => Type::Fixed {
            bits: 128,
            places: 18,
        },
        "ufixed" => Type::Ufixed {
            bits: 128,
            places: 18,
        },
        _ => {
            if let Some(rest) = name.strip_prefix("uint") {
                Type::uint(parse_bits(rest).ok_or_else(invalid)?)
            } else if let Some(rest) = name.strip_prefix("int") {
                Type::int(parse_bits(rest).ok_or_else(invalid)?)
            } else if let Some(rest) = name.strip_prefix("bytes") {
                let length: u8 = rest.parse().map_err(|_| invalid())?;
                if !(1..=32).contains(&length) {
                    return Err(invalid());
                }
                Type::fixed_bytes(length)
            } else if let Some(rest) = name.strip_prefix("ufixed") {
                let (bits, places) = parse_fixed(rest).ok_or_else(invalid)?;
                Type::Ufixed { bits, places }
            } else if let Some(rest) = name.strip_prefix("fixed") {
                let (bits, places) = parse_fixed(rest).ok_or_else(invalid)?;
                Type::Fixed { bits, places }
            } else {
                return Ok(None);
            }
        }
    };
    Ok(Some(ty))
}

fn parse_bits(text: &str) -> Option<u16> {
    let bits: u16 = text.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

fn parse_fixed(text: &str) -> Option<(u16, u8)> {
    let (bits, places) = text.split_once('x')?;
    let places: u8 = places.parse().ok()?;
    if places > 80 {
        return None;
    }
    Some((parse_bits(bits)?, places))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::types::{EnumDefinition, StructDefinition};

    fn types() -> UserDefinedTypes {
        let mut types = UserDefinedTypes::new();
        types.insert_struct(
            StructDefinition::new("1", "Pair")
                .member("a", Type::uint(8))
                .member("b", Type::string()),
        );
        types.insert_enum(EnumDefinition {
            id: "2".to_string(),
            name: "Color".to_string(),
            options: vec!["Red".to_string(), "Green".to_string()],
        });
        types
    }

    #[test]
    fn test_elementary() {
        let types = types();
        assert_eq!(parse_type("uint256", &types), Ok(Type::uint(256)));
        assert_eq!(parse_type("int8", &types), Ok(Type::int(8)));
        assert_eq!(parse_type("bytes32", &types), Ok(Type::fixed_bytes(32)));
        assert_eq!(
            parse_type("fixed128x10", &types),
            Ok(Type::Fixed {
                bits: 128,
                places: 10
            })
        );
        assert!(parse_type("uint7", &types).is_err());
        assert!(parse_type("bytes33", &types).is_err());
    }

    #[test]
    fn test_arrays_and_locations() {
        let types = types();
        let ty = parse_type("uint8[2][] memory", &types).unwrap();
        assert_eq!(ty.type_string(), "uint8[2][] memory");
        let ty = parse_type("string storage ref", &types).unwrap();
        assert_eq!(ty.location(), Some(Location::Storage));
    }

    #[test]
    fn test_tuples_and_user_types() {
        let types = types();
        let ty = parse_type("(uint8 a, string b)", &types).unwrap();
        match &ty {
            Type::Tuple { members } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].name.as_deref(), Some("b"));
            }
            other => panic!("expected tuple, got {other:?}"),
        }
        let ty = parse_type("Pair[]", &types).unwrap();
        assert_eq!(ty.abi_type_string(&types).as_deref(), Some("(uint8,string)[]"));
        assert!(matches!(parse_type("enum Color", &types), Ok(Type::Enum { .. })));
        assert_eq!(
            parse_type("Nope", &types),
            Err(ParseTypeError::UnknownType("Nope".to_string()))
        );
    }

    #[test]
    fn test_mapping_and_function() {
        let types = types();
        let ty = parse_type("mapping(address => uint256)", &types).unwrap();
        assert_eq!(ty.type_string(), "mapping(address => uint256)");
        let ty = parse_type("function (uint256) external returns (bool)", &types).unwrap();
        assert_eq!(ty.type_string(), "function (uint256) external returns (bool)");
    }

    #[test]
    fn test_signature() {
        let types = types();
        let (name, params) = parse_signature("Transfer(address,address,uint256)", &types).unwrap();
        assert_eq!(name, "Transfer");
        assert_eq!(params, vec![Type::address(), Type::address(), Type::uint(256)]);
        assert!(parse_type("uint256 extra junk", &types).is_err());
    }
}
