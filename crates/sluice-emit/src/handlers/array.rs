use super::{receiver_type, storage_var};
use crate::dispatch::{ExprEmitter, ExpressionHandler, TypeTransformer};
use crate::error::{EmitError, EmitOutcome};
use crate::result::EmitResult;
use crate::storage::StoragePrimitive;
use sluice_core::{Callee, IRExpression, Type};

pub fn transformer() -> TypeTransformer {
    TypeTransformer::new("array")
        .with_handler(LiteralHandler)
        .with_handler(StorageIndexHandler)
        .with_handler(MemoryIndexHandler)
        .with_handler(LengthHandler)
        .with_handler(StorageMethodHandler)
        .with_handler(MemoryMethodHandler)
}

fn is_array(ty: &Type) -> bool {
    matches!(ty, Type::Array { .. })
}

/// Storage arrays with an accessor set, as `(name, element type)`.
fn storage_array<'e>(expr: &'e IRExpression, emitter: &ExprEmitter<'_>) -> Option<(&'e str, Type)> {
    let (name, ty) = storage_var(expr)?;
    let element = ty.array_element()?;
    StoragePrimitive::for_type(element)?;
    emitter.layout.entry(name)?;
    Some((name, element.clone()))
}

/// Memory arrays hold one machine word per element; booleans are stored as 0 or 1.
pub(crate) fn to_slot(value: &str, ty: &Type) -> String {
    match ty {
        Type::Bool => format!("{} ? 1 : 0", value),
        _ => value.to_string(),
    }
}

fn from_slot(value: String, ty: &Type) -> String {
    match ty {
        Type::Bool => format!("{} != 0", value),
        _ => value,
    }
}

pub(crate) fn index_u64(value: &str) -> String {
    format!("U256.toU64({})", value)
}

struct LiteralHandler;

impl ExpressionHandler for LiteralHandler {
    fn name(&self) -> &'static str {
        "array_literal"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(expr, IRExpression::ArrayLiteral { .. })
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::ArrayLiteral { elements, ty } = expr else {
            return Err(EmitError::Unsupported("array literal".into()));
        };
        let element_type = ty.array_element().cloned().unwrap_or(Type::Uint256);
        let (mut setup, values) = emitter.emit_operands(elements)?;
        let temp = emitter.temp();
        setup.push(format!("const {} = Array.alloc({});", temp, values.len()));
        for (index, value) in values.iter().enumerate() {
            setup.push(format!(
                "Array.set({}, {}, {});",
                temp,
                index,
                to_slot(value, &element_type)
            ));
        }
        Ok(EmitResult::value(temp, ty.clone()).with_setup(setup))
    }
}

/// `this.items[i]` through `load_items(index)`.
struct StorageIndexHandler;

impl ExpressionHandler for StorageIndexHandler {
    fn name(&self) -> &'static str {
        "array_storage_index"
    }

    fn can_handle(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::ArrayAccess { array, .. } if storage_array(array, emitter).is_some()
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::ArrayAccess { array, index, ty } = expr else {
            return Err(EmitError::Unsupported("array index".into()));
        };
        let (name, _) = storage_array(array, emitter)
            .ok_or_else(|| EmitError::UnresolvedAccessor(array.kind_name().to_string()))?;
        let index = emitter.emit_value(index)?;
        let call = format!("load_{}({})", name, index_u64(&index.value_expr));
        Ok(emitter.bind(index.setup_lines, call, ty.clone()))
    }
}

struct MemoryIndexHandler;

impl ExpressionHandler for MemoryIndexHandler {
    fn name(&self) -> &'static str {
        "array_memory_index"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::ArrayAccess { array, .. }
                if is_array(&array.ty()) && storage_var(array).is_none()
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::ArrayAccess { array, index, ty } = expr else {
            return Err(EmitError::Unsupported("array index".into()));
        };
        let (setup, values) = emitter.emit_operands([array.as_ref(), index.as_ref()])?;
        let call = format!("Array.get({}, {})", values[0], index_u64(&values[1]));
        Ok(emitter.bind(setup, from_slot(call, ty), ty.clone()))
    }
}

/// `items.length` read as a property.
struct LengthHandler;

impl ExpressionHandler for LengthHandler {
    fn name(&self) -> &'static str {
        "array_length"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Member { object, property, .. }
                if property == "length" && is_array(&object.ty())
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Member { object, .. } = expr else {
            return Err(EmitError::Unsupported("array length".into()));
        };
        if let Some((name, _)) = storage_array(object, emitter) {
            return Ok(emitter.bind(Vec::new(), format!("length_{}()", name), Type::Uint256));
        }
        if storage_var(object).is_some() {
            return Err(EmitError::UnresolvedAccessor(format!("length of {}", object.ty())));
        }
        let array = emitter.emit_value(object)?;
        let call = format!("U256.fromU64(Array.length({}))", array.value_expr);
        Ok(emitter.bind(array.setup_lines, call, Type::Uint256))
    }
}

/// `push`, `pop`, `length`, `get` and `set` on a storage array.
struct StorageMethodHandler;

impl ExpressionHandler for StorageMethodHandler {
    fn name(&self) -> &'static str {
        "array_storage_method"
    }

    fn can_handle(&self, expr: &IRExpression, emitter: &ExprEmitter<'_>) -> bool {
        matches!(
            expr,
            IRExpression::Call {
                callee: Callee::Method { .. },
                receiver: Some(receiver),
                ..
            } if storage_array(receiver, emitter).is_some()
        )
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::Method { name: method },
            receiver: Some(receiver),
            args,
            return_type,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("array method".into()));
        };
        let (name, _) = storage_array(receiver, emitter)
            .ok_or_else(|| EmitError::UnresolvedAccessor(method.clone()))?;
        let dynamic = matches!(receiver.ty(), Type::Array { length: None, .. });
        let (setup, values) = emitter.emit_operands(args)?;

        let call = match (method.as_str(), values.as_slice()) {
            ("length", []) => format!("length_{}()", name),
            ("get", [index]) => format!("load_{}({})", name, index_u64(index)),
            ("set", [index, value]) => format!("store_{}({}, {})", name, index_u64(index), value),
            ("push", [value]) if dynamic => format!("push_{}({})", name, value),
            ("pop", []) if dynamic => format!("pop_{}()", name),
            _ => {
                return Err(EmitError::Unsupported(format!(
                    "`{}` with {} argument(s) on storage array `{}`",
                    method,
                    values.len(),
                    name
                )))
            }
        };
        Ok(emitter.call(setup, call, return_type.clone()))
    }
}

struct MemoryMethodHandler;

impl ExpressionHandler for MemoryMethodHandler {
    fn name(&self) -> &'static str {
        "array_memory_method"
    }

    fn can_handle(&self, expr: &IRExpression, _emitter: &ExprEmitter<'_>) -> bool {
        receiver_type(expr).is_some_and(|ty| is_array(&ty))
    }

    fn handle(&self, expr: &IRExpression, emitter: &mut ExprEmitter<'_>) -> EmitOutcome<EmitResult> {
        let IRExpression::Call {
            callee: Callee::Method { name: method },
            receiver: Some(receiver),
            args,
            return_type,
            ..
        } = expr
        else {
            return Err(EmitError::Unsupported("array method".into()));
        };
        if storage_var(receiver).is_some() {
            return Err(EmitError::UnresolvedAccessor(format!("{} on {}", method, receiver.ty())));
        }
        let receiver_type = receiver.ty();
        let element = receiver_type.array_element().cloned().unwrap_or(Type::Uint256);
        let (setup, values) =
            emitter.emit_operands(std::iter::once(receiver.as_ref()).chain(args))?;

        let call = match (method.as_str(), values.as_slice()) {
            ("length", [array]) => format!("U256.fromU64(Array.length({}))", array),
            ("get", [array, index]) => {
                from_slot(format!("Array.get({}, {})", array, index_u64(index)), &element)
            }
            ("set", [array, index, value]) => format!(
                "Array.set({}, {}, {})",
                array,
                index_u64(index),
                to_slot(value, &element)
            ),
            ("push", [array, value]) => format!("Array.push({}, {})", array, to_slot(value, &element)),
            ("pop", [array]) => from_slot(format!("Array.pop({})", array), &element),
            _ => {
                return Err(EmitError::Unsupported(format!(
                    "`{}` on a memory array",
                    method
                )))
            }
        };
        Ok(emitter.call(setup, call, return_type.clone()))
    }
}
