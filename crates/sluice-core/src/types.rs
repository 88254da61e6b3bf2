use crate::{Result, SluiceError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const WORD_SIZE: u32 = 32;

/// Semantic type of a storage field, parameter, local or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Uint256,
    Int256,
    Address,
    String,
    Bool,
    Void,
    Struct(String),
    Array {
        element: Box<Type>,
        length: Option<u32>,
    },
    Mapping {
        key: Box<Type>,
        value: Box<Type>,
    },
    MappingNested {
        outer_key: Box<Type>,
        inner_key: Box<Type>,
        value: Box<Type>,
    },
}

impl Type {
    /// Resolves a type-name string handed over by the parser.
    ///
    /// Unknown capitalised identifiers resolve to [`Type::Struct`]; whether the
    /// struct actually exists is checked by the caller against the symbol table.
    pub fn parse(name: &str) -> Result<Type> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SluiceError::UnknownType(String::new()));
        }

        if let Some(inner) = name.strip_suffix("[]") {
            return Ok(Type::Array {
                element: Box::new(Type::parse(inner)?),
                length: None,
            });
        }

        if let Some(stripped) = name.strip_suffix(']') {
            if let Some(open) = stripped.rfind('[') {
                let length = stripped[open + 1..]
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| SluiceError::UnknownType(name.to_string()))?;
                return Ok(Type::Array {
                    element: Box::new(Type::parse(&stripped[..open])?),
                    length: Some(length),
                });
            }
        }

        if let Some((base, args)) = split_generic(name) {
            let args = split_type_args(args);
            return match (base, args.as_slice()) {
                ("Mapping", [key, value]) => Ok(Type::Mapping {
                    key: Box::new(Type::parse(key)?),
                    value: Box::new(Type::parse(value)?),
                }),
                ("MappingNested", [outer, inner, value]) => Ok(Type::MappingNested {
                    outer_key: Box::new(Type::parse(outer)?),
                    inner_key: Box::new(Type::parse(inner)?),
                    value: Box::new(Type::parse(value)?),
                }),
                ("StaticArray", [element, length]) => {
                    let length = length
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| SluiceError::UnknownType(name.to_string()))?;
                    Ok(Type::Array {
                        element: Box::new(Type::parse(element)?),
                        length: Some(length),
                    })
                }
                ("Array", [element]) => Ok(Type::Array {
                    element: Box::new(Type::parse(element)?),
                    length: None,
                }),
                _ => Err(SluiceError::UnknownType(name.to_string())),
            };
        }

        match name {
            "U256" | "uint256" | "uint" => Ok(Type::Uint256),
            "I256" | "int256" | "int" => Ok(Type::Int256),
            "Address" | "address" => Ok(Type::Address),
            "Str" | "String" | "string" => Ok(Type::String),
            "boolean" | "bool" | "Boolean" => Ok(Type::Bool),
            "void" => Ok(Type::Void),
            other if is_struct_identifier(other) => Ok(Type::Struct(other.to_string())),
            other => Err(SluiceError::UnknownType(other.to_string())),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Uint256 | Type::Int256)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Type::Mapping { .. } | Type::MappingNested { .. })
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// Value type stored behind a mapping, threaded through from the declaration.
    pub fn mapping_value(&self) -> Option<&Type> {
        match self {
            Type::Mapping { value, .. } | Type::MappingNested { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn array_element(&self) -> Option<&Type> {
        match self {
            Type::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Canonical wire-format name used in selectors and the ABI.
    ///
    /// Struct members are expanded through `resolve_struct`; mappings have no
    /// wire form.
    pub fn canonical_with(&self, resolve_struct: &dyn Fn(&str) -> Option<Vec<Type>>) -> Option<String> {
        match self {
            Type::Uint256 => Some("uint256".to_string()),
            Type::Int256 => Some("int256".to_string()),
            Type::Address => Some("address".to_string()),
            Type::Bool => Some("bool".to_string()),
            Type::String => Some("string".to_string()),
            Type::Array { element, length } => {
                let element = element.canonical_with(resolve_struct)?;
                Some(match length {
                    Some(n) => format!("{}[{}]", element, n),
                    None => format!("{}[]", element),
                })
            }
            Type::Struct(name) => {
                let members = resolve_struct(name)?;
                let parts = members
                    .iter()
                    .map(|ty| ty.canonical_with(resolve_struct))
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("({})", parts.join(",")))
            }
            Type::Void | Type::Mapping { .. } | Type::MappingNested { .. } => None,
        }
    }

    pub fn abi_name(&self) -> Option<String> {
        self.canonical_with(&|_| None)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Uint256 => write!(f, "U256"),
            Type::Int256 => write!(f, "I256"),
            Type::Address => write!(f, "Address"),
            Type::String => write!(f, "Str"),
            Type::Bool => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::Struct(name) => write!(f, "{}", name),
            Type::Array {
                element,
                length: Some(n),
            } => write!(f, "StaticArray<{}, {}>", element, n),
            Type::Array {
                element,
                length: None,
            } => write!(f, "{}[]", element),
            Type::Mapping { key, value } => write!(f, "Mapping<{}, {}>", key, value),
            Type::MappingNested {
                outer_key,
                inner_key,
                value,
            } => write!(f, "MappingNested<{}, {}, {}>", outer_key, inner_key, value),
        }
    }
}

fn is_struct_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_generic(name: &str) -> Option<(&str, &str)> {
    let open = name.find('<')?;
    let inner = name.strip_suffix('>')?;
    Some((name[..open].trim(), &inner[open + 1..]))
}

fn split_type_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in args.char_indices() {
        match ch {
            '<' | '[' => depth += 1,
            '>' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Factory namespaces that construct values of a semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Factory {
    U256,
    I256,
    Address,
    Str,
    Boolean,
}

impl Factory {
    pub fn from_name(name: &str) -> Option<Factory> {
        match name {
            "U256Factory" => Some(Factory::U256),
            "I256Factory" => Some(Factory::I256),
            "AddressFactory" => Some(Factory::Address),
            "StrFactory" => Some(Factory::Str),
            "BooleanFactory" => Some(Factory::Boolean),
            _ => None,
        }
    }

    pub fn produces(self) -> Type {
        match self {
            Factory::U256 => Type::Uint256,
            Factory::I256 => Type::Int256,
            Factory::Address => Type::Address,
            Factory::Str => Type::String,
            Factory::Boolean => Type::Bool,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Factory::U256 => "U256Factory",
            Factory::I256 => "I256Factory",
            Factory::Address => "AddressFactory",
            Factory::Str => "StrFactory",
            Factory::Boolean => "BooleanFactory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(Type::parse("U256").unwrap(), Type::Uint256);
        assert_eq!(Type::parse("I256").unwrap(), Type::Int256);
        assert_eq!(Type::parse("Address").unwrap(), Type::Address);
        assert_eq!(Type::parse("Str").unwrap(), Type::String);
        assert_eq!(Type::parse("boolean").unwrap(), Type::Bool);
    }

    #[test]
    fn test_parse_nested_generics() {
        let ty = Type::parse("MappingNested<Address, Address, U256>").unwrap();
        assert_eq!(
            ty,
            Type::MappingNested {
                outer_key: Box::new(Type::Address),
                inner_key: Box::new(Type::Address),
                value: Box::new(Type::Uint256),
            }
        );

        let ty = Type::parse("Mapping<Address, U256[]>").unwrap();
        assert_eq!(ty.mapping_value(), Some(&Type::parse("U256[]").unwrap()));
    }

    #[test]
    fn test_parse_arrays() {
        assert_eq!(
            Type::parse("StaticArray<U256, 3>").unwrap(),
            Type::Array {
                element: Box::new(Type::Uint256),
                length: Some(3)
            }
        );
        assert_eq!(Type::parse("U256[4]").unwrap(), Type::parse("StaticArray<U256, 4>").unwrap());
    }

    #[test]
    fn test_struct_and_unknown() {
        assert_eq!(Type::parse("Info").unwrap(), Type::Struct("Info".to_string()));
        assert!(matches!(Type::parse("number"), Err(SluiceError::UnknownType(_))));
        assert!(Type::parse("Mapping<U256>").is_err());
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(Type::Uint256.abi_name().as_deref(), Some("uint256"));
        assert_eq!(Type::parse("Address[]").unwrap().abi_name().as_deref(), Some("address[]"));
        assert_eq!(Type::parse("Mapping<Address, U256>").unwrap().abi_name(), None);

        let resolve = |name: &str| (name == "Info").then(|| vec![Type::Uint256, Type::Bool]);
        assert_eq!(
            Type::Struct("Info".into()).canonical_with(&resolve).as_deref(),
            Some("(uint256,bool)")
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for name in ["U256", "Mapping<Address, U256>", "StaticArray<I256, 2>", "Str[]"] {
            let ty = Type::parse(name).unwrap();
            assert_eq!(Type::parse(&ty.to_string()).unwrap(), ty);
        }
    }
}
