use super::errors::TransformError;
use sluice_core::{types::WORD_SIZE, Factory, SymbolTable, Type};
use tracing::debug;

pub struct TypeResolver;

impl TypeResolver {
    /// Resolves a declared type name, checking struct references against the registry.
    pub fn resolve(name: &str, symbols: &SymbolTable) -> Result<Type, TransformError> {
        let ty = Type::parse(name)?;
        Self::check_structs(&ty, symbols)?;
        Ok(ty)
    }

    fn check_structs(ty: &Type, symbols: &SymbolTable) -> Result<(), TransformError> {
        match ty {
            Type::Struct(name) if !symbols.has_struct(name) => {
                Err(TransformError::UnknownType(name.clone()))
            }
            Type::Array { element, .. } => Self::check_structs(element, symbols),
            Type::Mapping { key, value } => {
                Self::check_structs(key, symbols)?;
                Self::check_structs(value, symbols)
            }
            Type::MappingNested {
                outer_key,
                inner_key,
                value,
            } => {
                Self::check_structs(outer_key, symbols)?;
                Self::check_structs(inner_key, symbols)?;
                Self::check_structs(value, symbols)
            }
            _ => Ok(()),
        }
    }

    /// Byte width a field of this type takes inside a struct, word aligned.
    pub fn field_width(ty: &Type, symbols: &SymbolTable) -> Result<u32, TransformError> {
        match ty {
            Type::Struct(name) => symbols
                .struct_def(name)
                .map(|def| def.size.max(WORD_SIZE))
                .ok_or_else(|| TransformError::UnknownType(name.clone())),
            Type::Array {
                element,
                length: Some(n),
            } => Self::field_width(element, symbols)?
                .checked_mul((*n).max(1))
                .ok_or_else(|| TransformError::LayoutOverflow(ty.to_string())),
            _ => Ok(WORD_SIZE),
        }
    }

    /// Return type of `method` invoked on a value of type `receiver`.
    ///
    /// Unknown pairs fall back to name conventions and then to the receiver type itself.
    pub fn method_return_type(receiver: &Type, method: &str) -> Type {
        match Self::known_method(receiver, method) {
            Some(ty) => ty,
            None => {
                debug!(%receiver, method, "no return type entry, falling back to receiver type");
                Self::by_convention(receiver, method)
            }
        }
    }

    pub fn factory_return_type(factory: Factory, method: &str) -> Type {
        match (factory, method) {
            (Factory::Str, "length") => Type::Uint256,
            _ => Self::by_convention(&factory.produces(), method),
        }
    }

    fn by_convention(receiver: &Type, method: &str) -> Type {
        match method {
            "toString" => Type::String,
            "toU256" => Type::Uint256,
            "toI256" => Type::Int256,
            m if m.starts_with("from") || m.starts_with("create") => receiver.clone(),
            _ => {
                debug!(%receiver, method, "unknown method, assuming it returns the receiver type");
                receiver.clone()
            }
        }
    }

    fn known_method(receiver: &Type, method: &str) -> Option<Type> {
        const COMPARISONS: &[&str] = &[
            "lessThan",
            "greaterThan",
            "lessThanOrEqual",
            "greaterThanOrEqual",
            "equals",
            "notEqual",
            "isZero",
        ];

        if COMPARISONS.contains(&method) && !matches!(receiver, Type::Array { .. }) {
            return Some(Type::Bool);
        }

        let ty = match (receiver, method) {
            (Type::Uint256, "add" | "sub" | "mul" | "div" | "mod" | "pow" | "copy") => Type::Uint256,
            (Type::Uint256, "toString") => Type::String,
            (Type::Uint256, "toI256") => Type::Int256,

            (Type::Int256, "add" | "sub" | "mul" | "div" | "mod" | "negate" | "copy") => {
                Type::Int256
            }
            (Type::Int256, "abs") => Type::Uint256,
            (Type::Int256, "toU256") => Type::Uint256,
            (Type::Int256, "isNegative") => Type::Bool,
            (Type::Int256, "toString") => Type::String,

            (Type::Address, "toString") => Type::String,
            (Type::Address, "hasCode") => Type::Bool,

            (Type::String, "length") => Type::Uint256,
            (Type::String, "slice" | "concat") => Type::String,

            (Type::Bool, "toString") => Type::String,

            (Type::Array { .. }, "length") => Type::Uint256,
            (Type::Array { .. }, "push") => Type::Void,
            (Type::Array { element, .. }, "pop" | "get") => (**element).clone(),
            (Type::Array { .. }, "set") => Type::Void,

            (Type::Mapping { value, .. } | Type::MappingNested { value, .. }, "get") => {
                (**value).clone()
            }
            (Type::Mapping { .. } | Type::MappingNested { .. }, "set") => Type::Void,

            _ => return None,
        };
        Some(ty)
    }
}
