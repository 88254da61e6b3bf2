/*! Language-agnostic expression and statement IR.
 *
 * Method bodies are lowered into these trees before any code is generated. Every node
 * carries its semantic type, and calls carry an explicit [`Callee`] instead of a target
 * name, so code generation never has to classify anything by looking at strings.
 */

use crate::types::{Factory, Type};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Number(BigUint),
    Str(String),
    Bool(bool),
}

/// Where a value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Storage,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    MsgSender,
    MsgValue,
    BlockTimestamp,
    BlockNumber,
    ContractAddress,
}

impl Builtin {
    pub fn resolve(object: &str, property: &str) -> Option<Builtin> {
        match (object, property) {
            ("msg", "sender") => Some(Builtin::MsgSender),
            ("msg", "value") => Some(Builtin::MsgValue),
            ("block", "timestamp") => Some(Builtin::BlockTimestamp),
            ("block", "number") => Some(Builtin::BlockNumber),
            ("contract", "address") => Some(Builtin::ContractAddress),
            _ => None,
        }
    }

    pub fn ty(self) -> Type {
        match self {
            Builtin::MsgSender | Builtin::ContractAddress => Type::Address,
            Builtin::MsgValue | Builtin::BlockTimestamp | Builtin::BlockNumber => Type::Uint256,
        }
    }
}

/// The operation a call performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    /// `receiver.method(args)` on a value of the receiver's semantic type.
    Method { name: String },
    /// `U256Factory.create()`, `AddressFactory.fromString(..)`, ...
    Factory { factory: Factory, method: String },
    /// `this.helper(args)`
    Internal { name: String },
    Builtin(Builtin),
    /// `Transfer.emit(from, to, amount)`
    EmitEvent { event: String },
    /// `InsufficientBalance.revert(needed)`
    RevertError { error: String },
    /// `Info.create()` for a transient struct instance.
    StructCreate { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<BinaryOp> {
        Some(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" | "===" => BinaryOp::Eq,
            "!=" | "!==" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Runtime method implementing the operator on wide integers.
    pub fn method_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "equals",
            BinaryOp::Ne => "notEqual",
            BinaryOp::Lt => "lessThan",
            BinaryOp::Le => "lessThanOrEqual",
            BinaryOp::Gt => "greaterThan",
            BinaryOp::Ge => "greaterThanOrEqual",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IRExpression {
    Literal {
        value: Literal,
        ty: Type,
    },
    Var {
        name: String,
        scope: Scope,
        ty: Type,
    },
    Member {
        object: Box<IRExpression>,
        property: String,
        ty: Type,
    },
    Call {
        callee: Callee,
        receiver: Option<Box<IRExpression>>,
        args: Vec<IRExpression>,
        return_type: Type,
        scope: Scope,
    },
    Binary {
        op: BinaryOp,
        left: Box<IRExpression>,
        right: Box<IRExpression>,
        ty: Type,
    },
    Unary {
        op: UnaryOp,
        operand: Box<IRExpression>,
        ty: Type,
    },
    ArrayAccess {
        array: Box<IRExpression>,
        index: Box<IRExpression>,
        ty: Type,
    },
    ArrayLiteral {
        elements: Vec<IRExpression>,
        ty: Type,
    },
    MapGet {
        mapping: String,
        slot: u64,
        key: Box<IRExpression>,
        value_type: Type,
    },
    MapSet {
        mapping: String,
        slot: u64,
        key: Box<IRExpression>,
        value: Box<IRExpression>,
        value_type: Type,
    },
    MapGet2 {
        mapping: String,
        slot: u64,
        outer_key: Box<IRExpression>,
        inner_key: Box<IRExpression>,
        value_type: Type,
    },
    MapSet2 {
        mapping: String,
        slot: u64,
        outer_key: Box<IRExpression>,
        inner_key: Box<IRExpression>,
        value: Box<IRExpression>,
        value_type: Type,
    },
}

impl IRExpression {
    pub fn ty(&self) -> Type {
        match self {
            IRExpression::Literal { ty, .. }
            | IRExpression::Var { ty, .. }
            | IRExpression::Member { ty, .. }
            | IRExpression::Binary { ty, .. }
            | IRExpression::Unary { ty, .. }
            | IRExpression::ArrayAccess { ty, .. }
            | IRExpression::ArrayLiteral { ty, .. } => ty.clone(),
            IRExpression::Call { return_type, .. } => return_type.clone(),
            IRExpression::MapGet { value_type, .. } | IRExpression::MapGet2 { value_type, .. } => {
                value_type.clone()
            }
            IRExpression::MapSet { .. } | IRExpression::MapSet2 { .. } => Type::Void,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            IRExpression::Literal { .. } => "literal",
            IRExpression::Var { .. } => "var",
            IRExpression::Member { .. } => "member",
            IRExpression::Call { .. } => "call",
            IRExpression::Binary { .. } => "binary",
            IRExpression::Unary { .. } => "unary",
            IRExpression::ArrayAccess { .. } => "array_access",
            IRExpression::ArrayLiteral { .. } => "array_literal",
            IRExpression::MapGet { .. } => "map_get",
            IRExpression::MapSet { .. } => "map_set",
            IRExpression::MapGet2 { .. } => "map_get2",
            IRExpression::MapSet2 { .. } => "map_set2",
        }
    }

    pub fn number(value: u64) -> IRExpression {
        IRExpression::Literal {
            value: Literal::Number(BigUint::from(value)),
            ty: Type::Uint256,
        }
    }

    pub fn string(value: impl Into<String>) -> IRExpression {
        IRExpression::Literal {
            value: Literal::Str(value.into()),
            ty: Type::String,
        }
    }

    pub fn boolean(value: bool) -> IRExpression {
        IRExpression::Literal {
            value: Literal::Bool(value),
            ty: Type::Bool,
        }
    }

    pub fn local(name: impl Into<String>, ty: Type) -> IRExpression {
        IRExpression::Var {
            name: name.into(),
            scope: Scope::Memory,
            ty,
        }
    }

    pub fn storage(name: impl Into<String>, ty: Type) -> IRExpression {
        IRExpression::Var {
            name: name.into(),
            scope: Scope::Storage,
            ty,
        }
    }

    /// True when evaluating the expression writes persistent storage.
    pub fn writes_storage(&self) -> bool {
        match self {
            IRExpression::MapSet { .. } | IRExpression::MapSet2 { .. } => true,
            IRExpression::Call {
                callee,
                receiver,
                args,
                ..
            } => {
                let mutating_receiver = matches!(callee, Callee::Method { name } if name == "push" || name == "pop")
                    && receiver
                        .as_deref()
                        .map_or(false, |recv| matches!(recv, IRExpression::Var { scope: Scope::Storage, .. }));
                mutating_receiver
                    || receiver.as_deref().map_or(false, IRExpression::writes_storage)
                    || args.iter().any(IRExpression::writes_storage)
            }
            IRExpression::Member { object, .. } => object.writes_storage(),
            IRExpression::Binary { left, right, .. } => {
                left.writes_storage() || right.writes_storage()
            }
            IRExpression::Unary { operand, .. } => operand.writes_storage(),
            IRExpression::ArrayAccess { array, index, .. } => {
                array.writes_storage() || index.writes_storage()
            }
            IRExpression::ArrayLiteral { elements, .. } => {
                elements.iter().any(IRExpression::writes_storage)
            }
            IRExpression::MapGet { key, .. } => key.writes_storage(),
            IRExpression::MapGet2 {
                outer_key,
                inner_key,
                ..
            } => outer_key.writes_storage() || inner_key.writes_storage(),
            IRExpression::Literal { .. } | IRExpression::Var { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IRStatement {
    Let {
        name: String,
        ty: Type,
        init: Option<IRExpression>,
    },
    Expr {
        expr: IRExpression,
    },
    Return {
        value: Option<IRExpression>,
    },
    If {
        condition: IRExpression,
        then_branch: Vec<IRStatement>,
        else_branch: Vec<IRStatement>,
    },
    Block {
        body: Vec<IRStatement>,
    },
    Assign {
        target: IRExpression,
        value: IRExpression,
    },
}

impl IRStatement {
    /// True when the statement, or anything nested in it, writes persistent storage.
    pub fn writes_storage(&self) -> bool {
        match self {
            IRStatement::Let { init, .. } => init.as_ref().map_or(false, IRExpression::writes_storage),
            IRStatement::Expr { expr } => expr.writes_storage(),
            IRStatement::Return { value } => value.as_ref().map_or(false, IRExpression::writes_storage),
            IRStatement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.writes_storage()
                    || then_branch.iter().any(IRStatement::writes_storage)
                    || else_branch.iter().any(IRStatement::writes_storage)
            }
            IRStatement::Block { body } => body.iter().any(IRStatement::writes_storage),
            IRStatement::Assign { target, value } => {
                assigns_storage(target) || value.writes_storage()
            }
        }
    }
}

fn assigns_storage(target: &IRExpression) -> bool {
    match target {
        IRExpression::Var { scope, .. } => *scope == Scope::Storage,
        IRExpression::Member { object, .. } => assigns_storage(object),
        IRExpression::ArrayAccess { array, .. } => assigns_storage(array),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_types() {
        let call = IRExpression::Call {
            callee: Callee::Method {
                name: "lessThan".into(),
            },
            receiver: Some(Box::new(IRExpression::local("a", Type::Uint256))),
            args: vec![IRExpression::number(3)],
            return_type: Type::Bool,
            scope: Scope::Memory,
        };
        assert_eq!(call.ty(), Type::Bool);
        assert_eq!(call.kind_name(), "call");

        let set = IRExpression::MapSet {
            mapping: "balances".into(),
            slot: 0,
            key: Box::new(IRExpression::local("who", Type::Address)),
            value: Box::new(IRExpression::number(1)),
            value_type: Type::Uint256,
        };
        assert_eq!(set.ty(), Type::Void);
        assert!(set.writes_storage());
    }

    #[test]
    fn test_storage_assignment_detection() {
        let write = IRStatement::Assign {
            target: IRExpression::Member {
                object: Box::new(IRExpression::storage("info", Type::Struct("Info".into()))),
                property: "a".into(),
                ty: Type::Uint256,
            },
            value: IRExpression::number(1),
        };
        assert!(write.writes_storage());

        let local = IRStatement::Assign {
            target: IRExpression::local("x", Type::Uint256),
            value: IRExpression::number(1),
        };
        assert!(!local.writes_storage());

        let nested = IRStatement::If {
            condition: IRExpression::boolean(true),
            then_branch: vec![],
            else_branch: vec![write],
        };
        assert!(nested.writes_storage());
    }

    #[test]
    fn test_binary_op_tokens() {
        assert_eq!(BinaryOp::from_token("==="), Some(BinaryOp::Eq));
        assert_eq!(BinaryOp::from_token("<="), Some(BinaryOp::Le));
        assert_eq!(BinaryOp::from_token("**"), None);
        assert!(BinaryOp::Ge.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }
}
