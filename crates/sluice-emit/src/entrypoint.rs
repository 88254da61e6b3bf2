/*! Calldata router.
 *
 * `user_entrypoint` reads the call arguments, matches the leading 4-byte selector against the
 * public methods and calls the matching one with its 32-byte argument words. Only methods whose
 * parameters and result fit in a single word are routable.
 */

use crate::emitter::{EmitContext, EmitHelper, WriteResult};
use crate::error::{EmitError, EmitOutcome};
use crate::selector::{canonical_signature, selector_u32};
use sluice_core::{IRContract, IRMethod, StateMutability, Type};
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, warn};

pub const ENTRYPOINT: &str = "user_entrypoint";

/// A method the router can dispatch to.
#[derive(Debug, Clone)]
pub struct Route<'a> {
    pub method: &'a IRMethod,
    pub signature: String,
    pub selector: u32,
}

fn word_sized(ty: &Type) -> bool {
    matches!(ty, Type::Uint256 | Type::Int256 | Type::Address | Type::Bool)
}

fn route<'a>(method: &'a IRMethod, contract: &IRContract) -> EmitOutcome<Route<'a>> {
    if let Some(param) = method.inputs.iter().find(|param| !word_sized(&param.ty)) {
        return Err(EmitError::Unsupported(format!(
            "routing parameter `{}` of type {}",
            param.name, param.ty
        )));
    }
    if !(word_sized(&method.output_type) || method.output_type == Type::Void) {
        return Err(EmitError::Unsupported(format!(
            "routing a {} result",
            method.output_type
        )));
    }
    let signature = canonical_signature(
        &method.name,
        method.inputs.iter().map(|param| &param.ty),
        &contract.symbol_table,
    )?;
    Ok(Route {
        method,
        selector: selector_u32(&signature),
        signature,
    })
}

/// Routes for every public method, plus the messages for those left out.
pub fn collect_routes(contract: &IRContract) -> (Vec<Route<'_>>, Vec<String>) {
    let mut routes = Vec::new();
    let mut skipped = Vec::new();
    let mut seen: HashMap<u32, String> = HashMap::new();

    for method in contract.public_methods() {
        let route = match route(method, contract) {
            Ok(route) => route,
            Err(err) => {
                skipped.push(format!("`{}` is not routed: {}", method.name, err));
                continue;
            }
        };
        if let Some(existing) = seen.get(&route.selector) {
            skipped.push(format!(
                "`{}` is not routed: selector 0x{:08x} collides with {}",
                route.signature, route.selector, existing
            ));
            continue;
        }
        seen.insert(route.selector, route.signature.clone());
        routes.push(route);
    }
    (routes, skipped)
}

fn argument(index: usize, ty: &Type) -> String {
    let offset = 4 + 32 * index;
    match ty {
        Type::Bool => format!("load<u8>(input + {}) != 0", offset + 31),
        _ => format!("input + {}", offset),
    }
}

fn write_route<W: Write>(route: &Route<'_>, writer: &mut W, ctx: &mut EmitContext) -> WriteResult {
    let method = route.method;
    let length = 4 + 32 * method.inputs.len();
    EmitHelper::write_comment(writer, ctx, &route.signature)?;
    EmitHelper::write_block(
        writer,
        ctx,
        &format!("if (selector == 0x{:08x})", route.selector),
        |w, c| {
            EmitHelper::write_block(w, c, &format!("if (len < {})", length), |w, c| {
                EmitHelper::write_line(w, c, "return 1;")
            })?;
            if method.state_mutability != StateMutability::Payable {
                EmitHelper::write_line(w, c, "const value = malloc(32);")?;
                EmitHelper::write_line(w, c, "msg_value(value);")?;
                EmitHelper::write_block(w, c, "if (!U256.isZero(value))", |w, c| {
                    EmitHelper::write_line(w, c, "return 1;")
                })?;
            }
            let args = method
                .inputs
                .iter()
                .enumerate()
                .map(|(index, param)| argument(index, &param.ty))
                .collect::<Vec<_>>()
                .join(", ");
            let call = format!("{}({})", method.name, args);
            match method.output_type {
                Type::Void => EmitHelper::write_line(w, c, &format!("{};", call))?,
                Type::Bool => {
                    EmitHelper::write_line(w, c, &format!("const result = {};", call))?;
                    EmitHelper::write_line(w, c, "const out = malloc(32);")?;
                    EmitHelper::write_line(w, c, "store<u8>(out + 31, result ? 1 : 0);")?;
                    EmitHelper::write_line(w, c, "write_result(out, 32);")?;
                }
                _ => {
                    EmitHelper::write_line(w, c, &format!("const result = {};", call))?;
                    EmitHelper::write_line(w, c, "write_result(result, 32);")?;
                }
            }
            EmitHelper::write_line(w, c, "return 0;")
        },
    )
}

pub fn write_entrypoint<W: Write>(
    contract: &IRContract,
    writer: &mut W,
    ctx: &mut EmitContext,
) -> WriteResult {
    let (routes, skipped) = collect_routes(contract);
    debug!(contract = %contract.name, routes = routes.len(), "emitting entrypoint");
    for message in skipped {
        warn!(contract = %contract.name, %message, "method left out of the router");
        EmitHelper::write_error(writer, ctx, &message)?;
        ctx.report(message);
    }

    let header = format!("export function {}(len: i32): i32", ENTRYPOINT);
    EmitHelper::write_block(writer, ctx, &header, |w, c| {
        EmitHelper::write_block(w, c, "if (len < 4)", |w, c| {
            EmitHelper::write_line(w, c, "return 1;")
        })?;
        EmitHelper::write_line(w, c, "const input = malloc(<usize>len);")?;
        EmitHelper::write_line(w, c, "read_args(input);")?;
        EmitHelper::write_line(w, c, "const selector = bswap<u32>(load<u32>(input));")?;
        for route in &routes {
            write_route(route, w, c)?;
        }
        EmitHelper::write_line(w, c, "return 1;")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::{Parameter, Visibility};

    fn method(name: &str, mutability: StateMutability, inputs: Vec<Parameter>, output: Type) -> IRMethod {
        IRMethod {
            name: name.into(),
            visibility: Visibility::Public,
            state_mutability: mutability,
            inputs,
            output_type: output,
            body: vec![],
        }
    }

    #[test]
    fn test_routes_word_methods_by_selector() {
        let mut contract = IRContract::new("Token");
        contract.methods.push(method(
            "balanceOf",
            StateMutability::View,
            vec![Parameter::new("who", Type::Address)],
            Type::Uint256,
        ));

        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        write_entrypoint(&contract, &mut buffer, &mut ctx).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("  if (selector == 0x70a08231) {"));
        assert!(output.contains("    if (len < 36) {"));
        assert!(output.contains("    const result = balanceOf(input + 4);"));
        assert!(output.trim_end().ends_with("  return 1;\n}"));
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_payable_methods_skip_value_check() {
        let mut contract = IRContract::new("Vault");
        contract
            .methods
            .push(method("deposit", StateMutability::Payable, vec![], Type::Void));
        contract
            .methods
            .push(method("poke", StateMutability::Nonpayable, vec![], Type::Void));

        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        write_entrypoint(&contract, &mut buffer, &mut ctx).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert_eq!(output.matches("msg_value(value);").count(), 1);
        assert!(output.contains("    deposit();"));
    }

    #[test]
    fn test_bool_arguments_read_the_low_byte() {
        assert_eq!(argument(1, &Type::Bool), "load<u8>(input + 67) != 0");
        assert_eq!(argument(1, &Type::Uint256), "input + 36");
    }

    #[test]
    fn test_string_methods_are_left_out_with_a_diagnostic() {
        let mut contract = IRContract::new("Named");
        contract
            .methods
            .push(method("name", StateMutability::View, vec![], Type::String));

        let (routes, skipped) = collect_routes(&contract);
        assert!(routes.is_empty());
        assert_eq!(skipped, vec!["`name` is not routed: unsupported routing a Str result"]);
    }
}
