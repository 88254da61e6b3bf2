use pretty_assertions::assert_eq;
use sluice_core::decl::{ParamDecl, PropertyDecl};
use sluice_core::{
    ClassDecl, ClassMember, CompileContext, DeclRole, Expr, IRContract, MethodDecl, SourceUnit,
    Stmt,
};
use sluice_emit::{build_abi, selector_u32, ContractEmitter, EmitterConfig};
use sluice_transform::transform_to_ir;

fn field(name: &str, type_name: &str) -> ClassMember {
    ClassMember::Property(PropertyDecl {
        name: name.into(),
        type_name: Some(type_name.into()),
        roles: vec![],
        modifiers: vec![],
    })
}

fn method(
    name: &str,
    roles: Vec<DeclRole>,
    params: &[(&str, &str)],
    ret: Option<&str>,
    body: Vec<Stmt>,
) -> ClassMember {
    ClassMember::Method(MethodDecl {
        name: name.into(),
        roles,
        modifiers: vec![],
        params: params
            .iter()
            .map(|(name, ty)| ParamDecl {
                name: name.to_string(),
                type_name: ty.to_string(),
            })
            .collect(),
        return_type: ret.map(str::to_string),
        body,
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

fn compile(classes: Vec<ClassDecl>) -> IRContract {
    let unit = SourceUnit {
        file: None,
        classes,
    };
    let mut ctx = CompileContext::new();
    let mut contracts = transform_to_ir(&unit, &mut ctx).expect("transform");
    assert!(!ctx.errors.has_errors(), "{}", ctx.errors.render(false));
    contracts.remove(0)
}

fn registry() -> IRContract {
    compile(vec![
        class(
            "Info",
            DeclRole::Struct,
            vec![field("a", "U256"), field("b", "boolean")],
        ),
        class(
            "Registry",
            DeclRole::Contract,
            vec![
                field("balance", "U256"),
                field("info", "Info"),
                method(
                    "deposit",
                    vec![DeclRole::External],
                    &[("amount", "U256")],
                    None,
                    vec![Stmt::Expr {
                        expr: Expr::assign(
                            Expr::field("balance"),
                            Expr::binary("+", Expr::field("balance"), Expr::ident("amount")),
                        ),
                    }],
                ),
                method(
                    "first",
                    vec![DeclRole::External, DeclRole::View],
                    &[],
                    Some("U256"),
                    vec![Stmt::Return {
                        value: Some(Expr::property(Expr::field("info"), "a")),
                    }],
                ),
                method(
                    "flag",
                    vec![DeclRole::External, DeclRole::View],
                    &[],
                    Some("boolean"),
                    vec![
                        Stmt::Let {
                            name: "current".into(),
                            type_name: None,
                            init: Some(Expr::field("info")),
                        },
                        Stmt::Return {
                            value: Some(Expr::property(Expr::ident("current"), "b")),
                        },
                    ],
                ),
            ],
        ),
    ])
}

/// The text of the generated function whose header starts with `header`.
fn function<'a>(source: &'a str, header: &str) -> &'a str {
    let start = source
        .find(header)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", header, source));
    let end = source[start..].find("\n}\n").expect("unterminated function");
    &source[start..start + end + 2]
}

#[test]
fn test_storage_and_struct_accessors_share_slot_constants() {
    let module = ContractEmitter::default().emit_module(&registry()).unwrap();
    let source = &module.source;

    assert!(source.contains("const __SLOT00: u64 = 0; // balance: U256"));
    assert!(source.contains("const __SLOT01: u64 = 1; // info: Info"));
    assert!(function(source, "function load_balance()").contains("slot_key(__SLOT00)"));
    assert!(function(source, "function store_balance(").contains("slot_key(__SLOT00)"));
    assert!(function(source, "function Info_get_a()").contains("slot_at(__SLOT01, 0)"));
    assert!(function(source, "function Info_get_b()").contains("slot_at(__SLOT01, 1)"));
    assert!(function(source, "function load_info()").contains("Info_load(__SLOT01)"));
    assert!(module.diagnostics.is_empty(), "{:?}", module.diagnostics);
}

#[test]
fn test_method_bodies_use_generated_accessors() {
    let source = ContractEmitter::default().emit_module(&registry()).unwrap().source;

    assert_eq!(
        function(&source, "function deposit("),
        [
            "function deposit(amount: usize): void {",
            "  const __t0 = load_balance();",
            "  const __t1 = U256.add(__t0, amount);",
            "  store_balance(__t1);",
            "}",
        ]
        .join("\n")
    );
    assert!(function(&source, "function first(").contains("const __t0 = Info_get_a();"));
    let flag = function(&source, "function flag(");
    assert!(flag.contains("let current: usize = __t0;"));
    assert!(flag.contains("Info_memory_get_b(current)"));
}

#[test]
fn test_emission_is_deterministic() {
    let emitter = ContractEmitter::default();
    let first = emitter.emit_module(&registry()).unwrap();
    let second = emitter.emit_module(&registry()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_router_and_abi_agree_on_selectors() {
    let contract = registry();
    let source = ContractEmitter::default().emit_module(&contract).unwrap().source;

    for signature in ["deposit(uint256)", "first()", "flag()"] {
        let line = format!("if (selector == 0x{:08x}) {{", selector_u32(signature));
        assert!(source.contains(&line), "missing route for {}", signature);
    }
    let names: Vec<String> = build_abi(&contract)
        .unwrap()
        .into_iter()
        .map(|entry| serde_json::to_value(entry).unwrap()["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["deposit", "first", "flag"]);
}

#[test]
fn test_chained_factory_calls_run_setup_in_order() {
    let two = Expr::method(Expr::ident("U256Factory"), "fromString", vec![Expr::string("2")]);
    let three = Expr::method(Expr::ident("U256Factory"), "fromString", vec![Expr::string("3")]);
    let contract = compile(vec![class(
        "Math",
        DeclRole::Contract,
        vec![method(
            "five",
            vec![DeclRole::External, DeclRole::Pure],
            &[],
            Some("U256"),
            vec![Stmt::Return {
                value: Some(Expr::method(two, "add", vec![three])),
            }],
        )],
    )]);

    let config = EmitterConfig {
        emit_entrypoint: false,
        ..EmitterConfig::default()
    };
    let source = ContractEmitter::new(config).emit_module(&contract).unwrap().source;
    assert_eq!(
        function(&source, "function five("),
        [
            "function five(): usize {",
            "  const __t0 = Str.fromString(\"2\");",
            "  const __t1 = U256.fromString(__t0);",
            "  const __t2 = Str.fromString(\"3\");",
            "  const __t3 = U256.fromString(__t2);",
            "  const __t4 = U256.add(__t1, __t3);",
            "  return __t4;",
            "}",
        ]
        .join("\n")
    );
}
