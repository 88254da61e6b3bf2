/*! Declaration-level checks.
 *
 * Every rule here reports into the error manager and keeps going, so one pass over a class
 * surfaces all of its defects. Lowering continues afterwards with the resolved fallbacks
 * below; the caller decides what to do with a contract that has diagnostics.
 */

use sluice_core::{
    ClassDecl, DeclRole, ErrorCode, ErrorManager, Location, MethodDecl, Modifier,
    StateMutability, Visibility,
};
use std::collections::HashSet;

const CLASS_ROLES: &[DeclRole] = &[
    DeclRole::Contract,
    DeclRole::Event,
    DeclRole::Error,
    DeclRole::Struct,
];

pub fn validate_contract(class: &ClassDecl, errors: &mut ErrorManager) {
    validate_class_roles(class, errors);

    let constructors: Vec<&MethodDecl> = class.constructors().collect();
    if constructors.len() > 1 {
        errors.error(
            ErrorCode::MultipleConstructors,
            format!(
                "contract declares {} constructors, at most one is allowed",
                constructors.len()
            ),
            Location::member(&class.name, "constructor"),
        );
    }
    for ctor in &constructors {
        if ctor.has_modifier(Modifier::Private) || ctor.has_modifier(Modifier::Protected) {
            errors.error(
                ErrorCode::ConstructorNotPublic,
                "constructor must not be private or protected",
                Location::member(&class.name, "constructor"),
            );
        }
        check_method_roles(class, ctor, false, errors);
    }

    let mut seen = HashSet::new();
    for method in class.methods() {
        let location = Location::member(&class.name, &method.name);
        if !seen.insert(method.name.as_str()) {
            errors.error(
                ErrorCode::DuplicateMethod,
                format!("method `{}` is declared more than once", method.name),
                location.clone(),
            );
        }

        match method.roles.iter().filter(|role| role.is_visibility()).count() {
            0 => errors.error(
                ErrorCode::MissingVisibility,
                "method needs one of @External, @Public or @Internal",
                location.clone(),
            ),
            1 => {}
            n => errors.error(
                ErrorCode::ConflictingVisibility,
                format!("method has {} visibility annotations", n),
                location.clone(),
            ),
        }

        // no annotation is accepted and means @Nonpayable, see method_mutability
        let mutability = method.roles.iter().filter(|role| role.is_mutability()).count();
        if mutability > 1 {
            errors.error(
                ErrorCode::ConflictingMutability,
                format!("method has {} state-mutability annotations", mutability),
                location,
            );
        }

        check_method_roles(class, method, true, errors);
    }

    for property in class.properties() {
        for role in &property.roles {
            if *role != DeclRole::Storage {
                errors.error(
                    ErrorCode::InvalidDecoratorTarget,
                    format!("@{:?} cannot decorate a storage field", role),
                    Location::member(&class.name, &property.name),
                );
            }
        }
    }
}

/// Checks a struct, event or error class. These only carry data fields.
pub fn validate_data_class(class: &ClassDecl, errors: &mut ErrorManager) {
    validate_class_roles(class, errors);

    for method in class.methods().chain(class.constructors()) {
        errors.error(
            ErrorCode::InvalidDecoratorTarget,
            format!("{} classes cannot declare methods", class_kind(class)),
            Location::member(&class.name, &method.name),
        );
    }

    let allows_indexed = class.has_role(DeclRole::Event);
    for property in class.properties() {
        for role in &property.roles {
            if !(allows_indexed && *role == DeclRole::Indexed) {
                errors.error(
                    ErrorCode::InvalidDecoratorTarget,
                    format!("@{:?} cannot decorate a {} field", role, class_kind(class)),
                    Location::member(&class.name, &property.name),
                );
            }
        }
    }
}

fn validate_class_roles(class: &ClassDecl, errors: &mut ErrorManager) {
    let kinds = class
        .roles
        .iter()
        .filter(|role| CLASS_ROLES.contains(*role))
        .count();
    if kinds > 1 {
        errors.error(
            ErrorCode::InvalidDecoratorTarget,
            "a class can only be one of contract, struct, event or error",
            Location::class(&class.name),
        );
    }
    for role in &class.roles {
        if !CLASS_ROLES.contains(role) {
            errors.error(
                ErrorCode::InvalidDecoratorTarget,
                format!("@{:?} cannot decorate a class", role),
                Location::class(&class.name),
            );
        }
    }
}

fn check_method_roles(
    class: &ClassDecl,
    method: &MethodDecl,
    allow_visibility: bool,
    errors: &mut ErrorManager,
) {
    for role in &method.roles {
        let allowed = role.is_mutability() || (allow_visibility && role.is_visibility());
        if !allowed {
            errors.error(
                ErrorCode::InvalidDecoratorTarget,
                format!("@{:?} cannot decorate a method", role),
                Location::member(&class.name, &method.name),
            );
        }
    }
}

fn class_kind(class: &ClassDecl) -> &'static str {
    if class.has_role(DeclRole::Struct) {
        "struct"
    } else if class.has_role(DeclRole::Event) {
        "event"
    } else {
        "error"
    }
}

/// First visibility annotation, `Public` when there is none.
pub fn method_visibility(method: &MethodDecl) -> Visibility {
    method
        .roles
        .iter()
        .find_map(|role| match role {
            DeclRole::External => Some(Visibility::External),
            DeclRole::Public => Some(Visibility::Public),
            DeclRole::Internal => Some(Visibility::Internal),
            _ => None,
        })
        .unwrap_or(Visibility::Public)
}

/// First state-mutability annotation, `Nonpayable` when there is none.
pub fn method_mutability(method: &MethodDecl) -> StateMutability {
    method
        .roles
        .iter()
        .find_map(|role| match role {
            DeclRole::View => Some(StateMutability::View),
            DeclRole::Pure => Some(StateMutability::Pure),
            DeclRole::Payable => Some(StateMutability::Payable),
            DeclRole::Nonpayable => Some(StateMutability::Nonpayable),
            _ => None,
        })
        // a bare method is a plain state-changing call, not a missing-annotation error
        .unwrap_or(StateMutability::Nonpayable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::ClassMember;

    fn method(name: &str, roles: Vec<DeclRole>) -> ClassMember {
        ClassMember::Method(MethodDecl {
            name: name.into(),
            roles,
            modifiers: vec![],
            params: vec![],
            return_type: None,
            body: vec![],
        })
    }

    fn contract(members: Vec<ClassMember>) -> ClassDecl {
        ClassDecl {
            name: "Token".into(),
            roles: vec![DeclRole::Contract],
            extends: None,
            members,
        }
    }

    #[test]
    fn test_visibility_rules() {
        let class = contract(vec![
            method("a", vec![]),
            method("b", vec![DeclRole::Public, DeclRole::External]),
            method("c", vec![DeclRole::External, DeclRole::View, DeclRole::Pure]),
            method("d", vec![DeclRole::External, DeclRole::View]),
        ]);
        let mut errors = ErrorManager::new();
        validate_contract(&class, &mut errors);
        assert_eq!(errors.codes(), vec!["E004", "E003", "E005"]);
    }

    #[test]
    fn test_invalid_decorator_targets() {
        let class = contract(vec![method("a", vec![DeclRole::External, DeclRole::Indexed])]);
        let mut errors = ErrorManager::new();
        validate_contract(&class, &mut errors);
        assert_eq!(errors.codes(), vec!["S003"]);

        let event = ClassDecl {
            name: "Transfer".into(),
            roles: vec![DeclRole::Event],
            extends: None,
            members: vec![method("nope", vec![])],
        };
        let mut errors = ErrorManager::new();
        validate_data_class(&event, &mut errors);
        assert_eq!(errors.codes(), vec!["S003"]);
    }

    #[test]
    fn test_fallback_annotations() {
        let annotated = MethodDecl {
            name: "m".into(),
            roles: vec![DeclRole::Internal, DeclRole::View],
            modifiers: vec![],
            params: vec![],
            return_type: None,
            body: vec![],
        };
        assert_eq!(method_visibility(&annotated), Visibility::Internal);
        assert_eq!(method_mutability(&annotated), StateMutability::View);

        let bare = MethodDecl {
            roles: vec![],
            ..annotated
        };
        assert_eq!(method_visibility(&bare), Visibility::Public);
        assert_eq!(method_mutability(&bare), StateMutability::Nonpayable);
    }
}
