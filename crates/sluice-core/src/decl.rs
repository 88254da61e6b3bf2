/*! Parsed declaration tree handed over by the front-end.
 *
 * The parser is an external collaborator: it resolves decorators into [`DeclRole`]s and
 * hands the compiler classes, members and expression trees in source order. Everything
 * here is plain data and deserializes from JSON so any front-end can produce it.
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    #[serde(default)]
    pub file: Option<String>,
    pub classes: Vec<ClassDecl>,
}

impl SourceUnit {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|class| class.name == name)
    }
}

/// Declaration roles, resolved from decorators by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclRole {
    Contract,
    Storage,
    External,
    Public,
    Internal,
    View,
    Pure,
    Payable,
    Nonpayable,
    Event,
    Error,
    Struct,
    Indexed,
}

impl DeclRole {
    pub fn is_visibility(self) -> bool {
        matches!(self, DeclRole::External | DeclRole::Public | DeclRole::Internal)
    }

    pub fn is_mutability(self) -> bool {
        matches!(
            self,
            DeclRole::View | DeclRole::Pure | DeclRole::Payable | DeclRole::Nonpayable
        )
    }
}

/// Language-level member modifiers (as opposed to decorator roles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Readonly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<DeclRole>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub members: Vec<ClassMember>,
}

impl ClassDecl {
    pub fn has_role(&self, role: DeclRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Property(prop) => Some(prop),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Constructor(ctor) => Some(ctor),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "snake_case")]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
    Constructor(MethodDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<DeclRole>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl PropertyDecl {
    pub fn has_role(&self, role: DeclRole) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<DeclRole>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl MethodDecl {
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Let {
        name: String,
        #[serde(default)]
        type_name: Option<String>,
        #[serde(default)]
        init: Option<Expr>,
    },
    Expr {
        expr: Expr,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    Block {
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Identifier {
        name: String,
    },
    This,
    Number {
        value: String,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Property {
        object: Box<Expr>,
        name: String,
    },
    Element {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Array {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Paren {
        inner: Box<Expr>,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Identifier { name: name.into() }
    }

    pub fn number(value: impl Into<String>) -> Expr {
        Expr::Number {
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Expr {
        Expr::Str {
            value: value.into(),
        }
    }

    pub fn property(object: Expr, name: impl Into<String>) -> Expr {
        Expr::Property {
            object: Box::new(object),
            name: name.into(),
        }
    }

    /// `this.<name>`
    pub fn field(name: impl Into<String>) -> Expr {
        Expr::property(Expr::This, name)
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `<receiver>.<method>(args)`
    pub fn method(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::property(receiver, method), args)
    }

    pub fn binary(op: impl Into<String>, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn element(object: Expr, index: Expr) -> Expr {
        Expr::Element {
            object: Box::new(object),
            index: Box::new(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unit_from_json() {
        let json = r#"{
            "classes": [{
                "name": "Counter",
                "roles": ["Contract"],
                "members": [
                    { "member": "property", "name": "count", "type_name": "U256", "roles": ["Storage"] },
                    { "member": "method", "name": "get", "roles": ["External", "View"],
                      "return_type": "U256",
                      "body": [{ "kind": "return", "value": {
                          "kind": "property", "object": { "kind": "this" }, "name": "count" } }] }
                ]
            }]
        }"#;

        let unit = SourceUnit::from_json(json).unwrap();
        let class = unit.class("Counter").unwrap();
        assert!(class.has_role(DeclRole::Contract));
        assert_eq!(class.properties().count(), 1);

        let method = class.methods().next().unwrap();
        assert_eq!(
            method.body,
            vec![Stmt::Return {
                value: Some(Expr::field("count"))
            }]
        );
    }
}
