use super::context::BodyContext;
use super::errors::TransformError;
use super::statement_transformer::StatementTransformer;
use super::type_resolver::TypeResolver;
use super::validation::{method_mutability, method_visibility};
use sluice_core::{
    decl::PropertyDecl, ClassDecl, DeclRole, ErrorManager, FunctionSignature, IRError,
    IRErrorField, IREvent, IREventField, IRMethod, IRStruct, IRStructField, IRVariable, Location,
    MethodDecl, Parameter, SlotManager, SlotRange, SlotRequest, StateMutability, SymbolTable,
    Type, VariableKind, Visibility,
};
use tracing::debug;

pub struct DeclarationBuilder;

impl DeclarationBuilder {
    fn field_type(
        property: &PropertyDecl,
        symbols: &SymbolTable,
    ) -> Result<Type, TransformError> {
        let type_name = property
            .type_name
            .as_deref()
            .ok_or_else(|| TransformError::MissingTypeAnnotation(property.name.clone()))?;
        TypeResolver::resolve(type_name, symbols)
    }

    /// Lays out a struct: each field starts at the word-aligned end of the previous one.
    pub fn build_struct(class: &ClassDecl, symbols: &SymbolTable) -> Result<IRStruct, TransformError> {
        let mut fields = Vec::new();
        let mut offset = 0u32;
        for property in class.properties() {
            let ty = Self::field_type(property, symbols)?;
            let width = TypeResolver::field_width(&ty, symbols)?;
            fields.push(IRStructField {
                name: property.name.clone(),
                ty,
                offset,
            });
            offset = offset
                .checked_add(width)
                .ok_or_else(|| TransformError::LayoutOverflow(class.name.clone()))?;
        }
        debug!(name = %class.name, size = offset, "built struct layout");
        Ok(IRStruct {
            name: class.name.clone(),
            fields,
            size: offset,
        })
    }

    pub fn build_event(class: &ClassDecl, symbols: &SymbolTable) -> Result<IREvent, TransformError> {
        let fields = class
            .properties()
            .map(|property| {
                Ok(IREventField {
                    name: property.name.clone(),
                    ty: Self::field_type(property, symbols)?,
                    indexed: property.has_role(DeclRole::Indexed),
                })
            })
            .collect::<Result<Vec<_>, TransformError>>()?;
        Ok(IREvent {
            name: class.name.clone(),
            fields,
        })
    }

    pub fn build_error(class: &ClassDecl, symbols: &SymbolTable) -> Result<IRError, TransformError> {
        let fields = class
            .properties()
            .map(|property| {
                Ok(IRErrorField {
                    name: property.name.clone(),
                    ty: Self::field_type(property, symbols)?,
                })
            })
            .collect::<Result<Vec<_>, TransformError>>()?;
        Ok(IRError {
            name: class.name.clone(),
            fields,
        })
    }

    /// Allocates and registers every property of a contract class as a storage field.
    ///
    /// Field-level defects are reported and the field skipped; a slot collision aborts.
    pub fn build_storage(
        class: &ClassDecl,
        slots: &mut SlotManager,
        symbols: &mut SymbolTable,
        errors: &mut ErrorManager,
    ) -> sluice_core::Result<Vec<IRVariable>> {
        let mut storage = Vec::new();
        for property in class.properties() {
            let location = Location::member(&class.name, &property.name);
            let ty = match Self::field_type(property, symbols) {
                Ok(ty) => ty,
                Err(err) => {
                    errors.report(err.into_diagnostic(location));
                    continue;
                }
            };
            if symbols.variable(&property.name).is_some() {
                errors.error(
                    sluice_core::ErrorCode::DuplicateStorageField,
                    format!("storage field `{}` is already declared", property.name),
                    location,
                );
                continue;
            }

            let template = ty.struct_name().and_then(|name| symbols.struct_def(name)).cloned();
            let (slot, count) = match template {
                Some(template) => (
                    slots.allocate_struct_slots(&property.name, &ty, &template)?,
                    template.slot_count(),
                ),
                None => {
                    let request = SlotRequest::new(&ty);
                    (slots.allocate_slot(&property.name, request)?, request.slot_count())
                }
            };

            symbols.declare_variable(property.name.clone(), ty.clone());
            storage.push(Self::variable(
                &property.name,
                ty,
                SlotRange { start: slot, count },
            ));
        }
        Ok(storage)
    }

    pub fn variable(name: &str, ty: Type, range: SlotRange) -> IRVariable {
        let length = match &ty {
            Type::Array { length, .. } => *length,
            _ => None,
        };
        IRVariable {
            name: name.to_string(),
            kind: VariableKind::of(&ty),
            slot: range.start,
            slot_count: range.count,
            length,
            original_struct_name: ty.struct_name().map(str::to_string),
            ty,
        }
    }

    pub fn build_signature(
        method: &MethodDecl,
        symbols: &SymbolTable,
    ) -> Result<FunctionSignature, TransformError> {
        let params = method
            .params
            .iter()
            .map(|param| TypeResolver::resolve(&param.type_name, symbols))
            .collect::<Result<Vec<_>, _>>()?;
        let return_type = match method.return_type.as_deref() {
            None => Type::Void,
            Some(name) => TypeResolver::resolve(name, symbols).map_err(|_| {
                TransformError::UnresolvableReturnType(format!("{}: {}", method.name, name))
            })?,
        };
        Ok(FunctionSignature {
            name: method.name.clone(),
            params,
            return_type,
            visibility: method_visibility(method),
            mutability: method_mutability(method),
        })
    }

    pub fn build_constructor_signature(
        ctor: &MethodDecl,
        symbols: &SymbolTable,
    ) -> Result<FunctionSignature, TransformError> {
        let mut signature = Self::build_signature(ctor, symbols)?;
        signature.name = "constructor".to_string();
        signature.return_type = Type::Void;
        signature.visibility = Visibility::Public;
        signature.mutability = if ctor.roles.contains(&DeclRole::Payable) {
            StateMutability::Payable
        } else {
            StateMutability::Nonpayable
        };
        Ok(signature)
    }

    /// Lowers a method body against a finished registry and slot layout.
    pub fn build_method(
        class_name: &str,
        method: &MethodDecl,
        signature: &FunctionSignature,
        symbols: &SymbolTable,
        slots: &SlotManager,
        errors: &mut ErrorManager,
    ) -> IRMethod {
        let location = Location::member(class_name, &signature.name);
        let mut ctx = BodyContext::new(symbols, slots, errors, location);

        let inputs: Vec<Parameter> = method
            .params
            .iter()
            .zip(&signature.params)
            .map(|(param, ty)| Parameter::new(param.name.clone(), ty.clone()))
            .collect();
        for input in &inputs {
            ctx.declare_local(input.name.clone(), input.ty.clone());
        }

        let body = StatementTransformer::transform_block(&method.body, &mut ctx);
        debug!(class = class_name, method = %signature.name, statements = body.len(), "lowered method");

        IRMethod {
            name: signature.name.clone(),
            visibility: signature.visibility,
            state_mutability: signature.mutability,
            inputs,
            output_type: signature.return_type.clone(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{decl::ParamDecl, ClassMember, Modifier};

    fn property(name: &str, type_name: Option<&str>, roles: Vec<DeclRole>) -> ClassMember {
        ClassMember::Property(PropertyDecl {
            name: name.into(),
            type_name: type_name.map(str::to_string),
            roles,
            modifiers: vec![Modifier::Public],
        })
    }

    fn class(name: &str, role: DeclRole, members: Vec<ClassMember>) -> ClassDecl {
        ClassDecl {
            name: name.into(),
            roles: vec![role],
            extends: None,
            members,
        }
    }

    #[test]
    fn test_struct_offsets_are_cumulative() {
        let mut symbols = SymbolTable::new();
        let inner = class(
            "Inner",
            DeclRole::Struct,
            vec![
                property("x", Some("U256"), vec![]),
                property("y", Some("U256"), vec![]),
            ],
        );
        let inner = DeclarationBuilder::build_struct(&inner, &symbols).unwrap();
        assert_eq!(inner.size, 64);
        symbols.declare_struct(inner);

        let outer = class(
            "Outer",
            DeclRole::Struct,
            vec![
                property("flag", Some("boolean"), vec![]),
                property("inner", Some("Inner"), vec![]),
                property("owner", Some("Address"), vec![]),
            ],
        );
        let outer = DeclarationBuilder::build_struct(&outer, &symbols).unwrap();
        let offsets: Vec<u32> = outer.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 32, 96]);
        assert_eq!(outer.size, 128);
        assert_eq!(outer.slot_count(), 4);
    }

    #[test]
    fn test_event_indexed_flags() {
        let event = class(
            "Transfer",
            DeclRole::Event,
            vec![
                property("from", Some("Address"), vec![DeclRole::Indexed]),
                property("to", Some("Address"), vec![DeclRole::Indexed]),
                property("amount", Some("U256"), vec![]),
            ],
        );
        let event = DeclarationBuilder::build_event(&event, &SymbolTable::new()).unwrap();
        let flags: Vec<bool> = event.fields.iter().map(|f| f.indexed).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_storage_reports_and_skips_bad_fields() {
        let contract = class(
            "Vault",
            DeclRole::Contract,
            vec![
                property("total", Some("U256"), vec![DeclRole::Storage]),
                property("untyped", None, vec![]),
                property("total", Some("Address"), vec![]),
                property("ghost", Some("Missing"), vec![]),
                property("owner", Some("Address"), vec![]),
            ],
        );
        let mut slots = SlotManager::new();
        let mut symbols = SymbolTable::new();
        let mut errors = ErrorManager::new();

        let storage =
            DeclarationBuilder::build_storage(&contract, &mut slots, &mut symbols, &mut errors)
                .unwrap();

        assert_eq!(errors.codes(), vec!["S002", "E008", "E007"]);
        let layout: Vec<(&str, u64)> = storage.iter().map(|v| (v.name.as_str(), v.slot)).collect();
        assert_eq!(layout, vec![("total", 0), ("owner", 1)]);
    }

    #[test]
    fn test_signature_resolution() {
        let method = MethodDecl {
            name: "balanceOf".into(),
            roles: vec![DeclRole::External, DeclRole::View],
            modifiers: vec![],
            params: vec![ParamDecl {
                name: "who".into(),
                type_name: "Address".into(),
            }],
            return_type: Some("U256".into()),
            body: vec![],
        };
        let signature = DeclarationBuilder::build_signature(&method, &SymbolTable::new()).unwrap();
        assert_eq!(signature.params, vec![Type::Address]);
        assert_eq!(signature.return_type, Type::Uint256);
        assert_eq!(signature.visibility, Visibility::External);
        assert_eq!(signature.mutability, StateMutability::View);

        let broken = MethodDecl {
            return_type: Some("Nope".into()),
            ..method
        };
        assert_eq!(
            DeclarationBuilder::build_signature(&broken, &SymbolTable::new()),
            Err(TransformError::UnresolvableReturnType("balanceOf: Nope".into()))
        );
    }
}
