//! End-to-end compilation tests: AST in, instruction vectors, errors, and
//! warnings out.

use helm_asm::Instr;
use helm_core::ast::{
    Argument, AssetScript, AssignmentTarget, BinaryOperator, Contract, ContractCallExpr,
    ContractInterface, Declaration, Expr, ExprKind, FuncDef, Inheritance, InterfaceInheritance,
    MultiContract, Statement, TxScript, UnrolledLoop, VarDeclaration,
};
use helm_core::{compile_asset_script, CompilerConfig};
use helm_types::{FuncId, Ident, Type, TypeId};

fn config() -> CompilerConfig {
    CompilerConfig::default()
}

fn asset_script(funcs: Vec<FuncDef>) -> AssetScript {
    AssetScript {
        id: TypeId::new("Foo"),
        template_vars: vec![],
        funcs,
    }
}

fn simple_contract(name: &str, funcs: Vec<FuncDef>) -> Contract {
    Contract::new(false, name, vec![], vec![], funcs, vec![], vec![], vec![], vec![])
}

fn contract_handle_field(name: &str, contract: &str) -> Argument {
    Argument::new(name, Type::Contract(TypeId::new(contract)))
}

#[test]
fn asset_script_arithmetic() {
    let func = FuncDef::new(
        "bar",
        true,
        vec![Argument::new("a", Type::U256), Argument::new("b", Type::U256)],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::binary(
            BinaryOperator::Add,
            Expr::variable("a"),
            Expr::variable("b"),
        )])],
    );
    let compiled = compile_asset_script(&asset_script(vec![func]), &config()).unwrap();
    assert_eq!(compiled.script.methods.len(), 1);
    let method = &compiled.script.methods[0];
    assert_eq!(
        method.instrs,
        vec![
            Instr::LoadLocal(0),
            Instr::LoadLocal(1),
            Instr::U256Add,
            Instr::Return,
        ]
    );
    assert_eq!(method.args_length, 2);
    assert_eq!(method.locals_length, 2);
    assert_eq!(method.return_length, 1);
    assert!(compiled.warnings.is_empty());
}

#[test]
fn recursive_fibonacci_compiles_to_self_calls() {
    let n = || Expr::variable("n");
    let fib_minus = |offset: u64| {
        Expr::call(
            "fib",
            vec![Expr::binary(BinaryOperator::Sub, n(), Expr::u256(offset))],
        )
    };
    let func = FuncDef::new(
        "fib",
        true,
        vec![Argument::new("n", Type::U256)],
        vec![Type::U256],
        vec![Statement::IfElse {
            condition: Expr::binary(BinaryOperator::Lt, n(), Expr::u256(2)),
            if_branch: vec![Statement::ret(vec![n()])],
            else_branch: vec![Statement::ret(vec![Expr::binary(
                BinaryOperator::Add,
                fib_minus(1),
                fib_minus(2),
            )])],
        }],
    );
    let compiled = compile_asset_script(&asset_script(vec![func]), &config()).unwrap();
    let method = &compiled.script.methods[0];
    assert_eq!(method.args_length, 1);
    assert_eq!(method.return_length, 1);
    let self_calls = method
        .instrs
        .iter()
        .filter(|instr| **instr == Instr::CallLocal(0))
        .count();
    assert_eq!(self_calls, 2);
}

#[test]
fn assignment_to_immutable_variable_is_rejected() {
    let bar = FuncDef::new(
        "bar",
        false,
        vec![],
        vec![Type::U256, Type::U256],
        vec![Statement::ret(vec![Expr::u256(0), Expr::u256(1)])],
    );
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![
            Statement::let_var("a", false, Expr::u256(0)),
            Statement::let_var("b", false, Expr::u256(1)),
            Statement::Assign {
                targets: vec![AssignmentTarget::var("a"), AssignmentTarget::var("b")],
                value: Expr::call("bar", vec![]),
            },
        ],
    );
    let err = compile_asset_script(&asset_script(vec![bar, main]), &config()).unwrap_err();
    assert_eq!(err.to_string(), "Assign to immutable variable: b");
}

#[test]
fn array_literal_lowering_is_cell_exact() {
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![
            Statement::let_var(
                "x",
                true,
                Expr::array(vec![
                    Expr::u256(1),
                    Expr::u256(2),
                    Expr::u256(3),
                    Expr::u256(4),
                ]),
            ),
            Statement::let_var("y", false, Expr::index(Expr::variable("x"), vec![Expr::u256(0)])),
        ],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let method = &compiled.script.methods[0];
    assert_eq!(
        method.instrs[..10],
        [
            Instr::U256Const1,
            Instr::U256Const2,
            Instr::U256Const3,
            Instr::U256Const4,
            Instr::StoreLocal(3),
            Instr::StoreLocal(2),
            Instr::StoreLocal(1),
            Instr::StoreLocal(0),
            Instr::LoadLocal(0),
            Instr::StoreLocal(4),
        ]
    );
    assert_eq!(method.locals_length, 5);
    // y is never read.
    assert_eq!(compiled.warnings.len(), 1);
    assert!(compiled.warnings[0].contains("Found unused variables in Foo: main.y"));
}

fn loop_script() -> AssetScript {
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![
            Statement::let_var(
                "x",
                true,
                Expr::array(vec![Expr::u256(0), Expr::u256(0), Expr::u256(0)]),
            ),
            Statement::Loop(UnrolledLoop::new(
                Expr::u256(0),
                Expr::u256(3),
                Expr::u256(1),
                Statement::Assign {
                    targets: vec![AssignmentTarget::ArrayElement {
                        ident: Ident::new("x"),
                        indexes: vec![Expr::placeholder()],
                    }],
                    value: Expr::placeholder(),
                },
            )),
        ],
    );
    asset_script(vec![main])
}

#[test]
fn loop_unrolls_within_the_configured_limit() {
    let compiled =
        compile_asset_script(&loop_script(), &CompilerConfig::new(5).unwrap()).unwrap();
    let method = &compiled.script.methods[0];
    // Three iterations: x[0] = 0; x[1] = 1; x[2] = 2.
    assert_eq!(
        method.instrs[6..12],
        [
            Instr::U256Const0,
            Instr::StoreLocal(0),
            Instr::U256Const1,
            Instr::StoreLocal(1),
            Instr::U256Const2,
            Instr::StoreLocal(2),
        ]
    );
}

#[test]
fn loop_range_beyond_the_limit_is_rejected() {
    let err =
        compile_asset_script(&loop_script(), &CompilerConfig::new(2).unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "loop range too large");
}

#[test]
fn cyclic_inheritance_fails_compilation() {
    let chain = |name: &str, parent: &str| {
        let mut contract = simple_contract(
            name,
            vec![FuncDef::new("f", true, vec![], vec![], vec![Statement::ret(vec![])])],
        );
        contract.funcs[0].id = FuncId::new(format!("f{}", name));
        contract.inheritances = vec![Inheritance::Contract(
            helm_core::ast::ContractInheritance {
                parent: TypeId::new(parent),
                idents: vec![],
            },
        )];
        Declaration::Contract(contract)
    };
    let multi =
        MultiContract::new(vec![chain("A", "B"), chain("B", "C"), chain("C", "A")]).unwrap();
    let err = multi.compile_contract(0, &config()).unwrap_err();
    assert!(err.to_string().contains("Cyclic inheritance detected"));
}

fn external_call(obj: &str, func: &str) -> Statement {
    Statement::ContractCall(ContractCallExpr::new(
        Expr::variable(obj),
        FuncId::new(func),
        vec![],
    ))
}

#[test]
fn missing_callee_permission_check_warns_once() {
    let bar = simple_contract(
        "Bar",
        vec![FuncDef::new("stuff", true, vec![], vec![], vec![Statement::ret(vec![])])],
    );
    let mut foo = simple_contract(
        "Foo",
        vec![FuncDef::new(
            "doIt",
            true,
            vec![],
            vec![],
            vec![external_call("bar", "stuff")],
        )],
    );
    foo.fields = vec![contract_handle_field("bar", "Bar")];

    let multi = MultiContract::new(vec![
        Declaration::Contract(bar),
        Declaration::Contract(foo),
    ])
    .unwrap();
    let compiled = multi.compile_contract(1, &config()).unwrap();
    assert_eq!(compiled.warnings.len(), 1);
    assert!(compiled.warnings[0].contains("No permission check for function: Bar.stuff"));
    assert_eq!(compiled.contract.field_length, 1);
}

#[test]
fn transitive_private_checks_silence_the_warning() {
    // entry() -> checked() -> checkPermission!: entry counts as checked.
    let checked = FuncDef::new(
        "checked",
        false,
        vec![],
        vec![],
        vec![Statement::FuncCall(helm_core::ast::CallExpr::new(
            FuncId::built_in("checkPermission"),
            vec![Expr::boolean(true)],
        ))],
    );
    let entry = FuncDef::new(
        "entry",
        true,
        vec![],
        vec![],
        vec![Statement::FuncCall(helm_core::ast::CallExpr::new(
            FuncId::new("checked"),
            vec![],
        ))],
    );
    let inner = simple_contract("Inner", vec![checked, entry]);
    let mut outer = simple_contract(
        "Outer",
        vec![FuncDef::new(
            "run",
            true,
            vec![],
            vec![],
            vec![external_call("inner", "entry")],
        )],
    );
    outer.fields = vec![contract_handle_field("inner", "Inner")];

    let multi = MultiContract::new(vec![
        Declaration::Contract(inner),
        Declaration::Contract(outer),
    ])
    .unwrap();
    let compiled = multi.compile_contract(1, &config()).unwrap();
    assert!(compiled.warnings.is_empty());
}

#[test]
fn interface_callees_are_presumed_checked() {
    let abstract_act = FuncDef {
        body: None,
        ..FuncDef::new("act", true, vec![], vec![], vec![])
    };
    let iface = ContractInterface {
        id: TypeId::new("Actor"),
        funcs: vec![abstract_act],
        events: vec![],
        inheritances: vec![],
    };
    let mut caller = simple_contract(
        "Caller",
        vec![FuncDef::new(
            "run",
            true,
            vec![],
            vec![],
            vec![external_call("actor", "act")],
        )],
    );
    caller.fields = vec![contract_handle_field("actor", "Actor")];

    let multi = MultiContract::new(vec![
        Declaration::Interface(iface),
        Declaration::Contract(caller),
    ])
    .unwrap();
    let compiled = multi.compile_contract(1, &config()).unwrap();
    assert!(compiled.warnings.is_empty());
}

#[test]
fn interface_method_without_permission_check_is_an_error() {
    let abstract_act = FuncDef {
        body: None,
        ..FuncDef::new("act", true, vec![], vec![], vec![])
    };
    let iface = ContractInterface {
        id: TypeId::new("Actor"),
        funcs: vec![abstract_act],
        events: vec![],
        inheritances: vec![],
    };
    let mut implementor = simple_contract(
        "Impl",
        vec![FuncDef::new("act", true, vec![], vec![], vec![Statement::ret(vec![])])],
    );
    implementor.inheritances = vec![Inheritance::Interface(InterfaceInheritance {
        parent: TypeId::new("Actor"),
    })];

    let multi = MultiContract::new(vec![
        Declaration::Interface(iface),
        Declaration::Contract(implementor),
    ])
    .unwrap();
    let err = multi.compile_contract(1, &config()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "No permission check for function: Impl.act"
    );
}

#[test]
fn interface_method_with_permission_check_compiles() {
    let abstract_act = FuncDef {
        body: None,
        ..FuncDef::new("act", true, vec![], vec![], vec![])
    };
    let iface = ContractInterface {
        id: TypeId::new("Actor"),
        funcs: vec![abstract_act],
        events: vec![],
        inheritances: vec![],
    };
    let act = FuncDef::new(
        "act",
        true,
        vec![],
        vec![],
        vec![Statement::FuncCall(helm_core::ast::CallExpr::new(
            FuncId::built_in("checkPermission"),
            vec![Expr::boolean(true)],
        ))],
    );
    let mut implementor = simple_contract("Impl", vec![act]);
    implementor.inheritances = vec![Inheritance::Interface(InterfaceInheritance {
        parent: TypeId::new("Actor"),
    })];

    let multi = MultiContract::new(vec![
        Declaration::Interface(iface),
        Declaration::Contract(implementor),
    ])
    .unwrap();
    let compiled = multi.compile_contract(1, &config()).unwrap();
    let method = &compiled.contract.methods[0];
    assert!(method.instrs.contains(&Instr::CheckPermission));
}

#[test]
fn tx_script_requires_public_entry() {
    let script = TxScript {
        id: TypeId::new("Run"),
        template_vars: vec![],
        funcs: vec![FuncDef::new("main", false, vec![], vec![], vec![])],
    };
    let multi = MultiContract::new(vec![Declaration::TxScript(script)]).unwrap();
    let err = multi.compile_script(0, &config()).unwrap_err();
    assert!(err.to_string().contains("Expect the first method"));
}

#[test]
fn tx_script_calls_contracts_through_templates() {
    let counter = simple_contract(
        "Counter",
        vec![FuncDef::new(
            "bump",
            true,
            vec![],
            vec![Type::U256],
            vec![Statement::ret(vec![Expr::u256(1)])],
        )],
    );
    let script = TxScript {
        id: TypeId::new("Run"),
        template_vars: vec![Argument::new(
            "counter",
            Type::Contract(TypeId::new("Counter")),
        )],
        funcs: vec![FuncDef::new(
            "main",
            true,
            vec![],
            vec![],
            vec![external_call("counter", "bump")],
        )],
    };
    let multi = MultiContract::new(vec![
        Declaration::Contract(counter),
        Declaration::TxScript(script),
    ])
    .unwrap();
    let compiled = multi.compile_script(1, &config()).unwrap();
    let method = &compiled.script.methods[0];
    assert_eq!(
        method.instrs,
        vec![
            // flattened argument and return lengths, then the handle.
            Instr::U256Const0,
            Instr::U256Const1,
            Instr::LoadTemplate(0),
            Instr::CallExternal(0),
            Instr::Pop,
            Instr::Return,
        ]
    );
    // The callee never checks permission.
    assert_eq!(compiled.warnings.len(), 1);
}

#[test]
fn branch_offsets_stay_inside_the_method() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::mutable("n", Type::U256)],
        vec![Type::U256],
        vec![
            Statement::While {
                condition: Expr::binary(BinaryOperator::Gt, Expr::variable("n"), Expr::u256(0)),
                body: vec![Statement::assign(
                    "n",
                    Expr::binary(BinaryOperator::Sub, Expr::variable("n"), Expr::u256(1)),
                )],
            },
            Statement::IfElse {
                condition: Expr::binary(BinaryOperator::Eq, Expr::variable("n"), Expr::u256(0)),
                if_branch: vec![Statement::ret(vec![Expr::u256(1)])],
                else_branch: vec![Statement::ret(vec![Expr::u256(0)])],
            },
        ],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let instrs = &compiled.script.methods[0].instrs;
    for (position, instr) in instrs.iter().enumerate() {
        if let Some(offset) = instr.branch_offset() {
            let target = position as i64 + 1 + offset as i64;
            assert!(
                target >= 0 && target <= instrs.len() as i64,
                "branch at {} escapes the method: {:?}",
                position,
                instr
            );
        }
    }
}

#[test]
fn negated_conditions_use_the_inverted_branch() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("flag", Type::Bool)],
        vec![],
        vec![Statement::While {
            condition: Expr::not(Expr::variable("flag")),
            body: vec![Statement::FuncCall(helm_core::ast::CallExpr::new(
                FuncId::built_in("panic"),
                vec![],
            ))],
        }],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let instrs = &compiled.script.methods[0].instrs;
    assert_eq!(
        instrs,
        &vec![
            Instr::LoadLocal(0),
            Instr::IfTrue(2),
            Instr::Panic,
            Instr::Jump(-4),
            Instr::Return,
        ]
    );
}

#[test]
fn oversized_branches_are_rejected() {
    let padding: Vec<Statement> = (0..130)
        .map(|_| Statement::assign("x", Expr::u256(7)))
        .collect();
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![
            Statement::let_var("x", true, Expr::u256(0)),
            Statement::IfElse {
                condition: Expr::boolean(true),
                if_branch: padding,
                else_branch: vec![],
            },
        ],
    );
    let err = compile_asset_script(&asset_script(vec![main]), &config()).unwrap_err();
    assert_eq!(err.to_string(), "Too many instrs for if-else branches");
}

#[test]
fn anonymous_bindings_pop_their_cells() {
    let pair = FuncDef::new(
        "pair",
        false,
        vec![],
        vec![Type::U256, Type::U256],
        vec![Statement::ret(vec![Expr::u256(1), Expr::u256(2)])],
    );
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![Type::U256],
        vec![
            Statement::VarDef {
                declarations: vec![
                    VarDeclaration::named("kept", false),
                    VarDeclaration::Anonymous,
                ],
                value: Expr::call("pair", vec![]),
            },
            Statement::ret(vec![Expr::variable("kept")]),
        ],
    );
    let compiled = compile_asset_script(&asset_script(vec![pair, main]), &config()).unwrap();
    let method = &compiled.script.methods[1];
    assert_eq!(
        method.instrs,
        vec![
            Instr::CallLocal(0),
            Instr::Pop,
            Instr::StoreLocal(0),
            Instr::LoadLocal(0),
            Instr::Return,
        ]
    );
}

#[test]
fn dynamic_array_indexes_use_runtime_addressing() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("i", Type::U256)],
        vec![Type::U256],
        vec![
            Statement::let_var(
                "x",
                true,
                Expr::array(vec![Expr::u256(1), Expr::u256(2)]),
            ),
            Statement::ret(vec![Expr::index(
                Expr::variable("x"),
                vec![Expr::variable("i")],
            )]),
        ],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let instrs = &compiled.script.methods[0].instrs;
    assert!(instrs.contains(&Instr::LoadLocalByIndex));
}

#[test]
fn expression_types_are_memoised() {
    use helm_core::semantic_analysis::{CompilerState, ContractRegistry};
    use helm_types::ContractKind;

    let cfg = config();
    let registry = ContractRegistry::empty();
    let mut state = CompilerState::new(
        TypeId::new("Foo"),
        ContractKind::AssetScript,
        &cfg,
        &registry,
    );
    let expr = Expr::binary(BinaryOperator::Add, Expr::u256(1), Expr::u256(2));
    let first = expr.get_type(&mut state).unwrap();
    let second = expr.get_type(&mut state).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, vec![Type::U256]);
}

#[test]
fn stack_deltas_balance_for_call_free_methods() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("a", Type::U256), Argument::new("b", Type::U256)],
        vec![Type::U256, Type::U256],
        vec![Statement::ret(vec![
            Expr::binary(BinaryOperator::Add, Expr::variable("a"), Expr::variable("b")),
            Expr::binary(BinaryOperator::Mul, Expr::variable("a"), Expr::variable("b")),
        ])],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let method = &compiled.script.methods[0];
    let delta: i32 = method
        .instrs
        .iter()
        .filter(|instr| **instr != Instr::Return)
        .map(|instr| instr.stack_delta().expect("call-free method"))
        .sum();
    assert_eq!(delta, method.return_length as i32);
}

#[test]
fn locals_length_is_tight() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("a", Type::U256)],
        vec![],
        vec![
            Statement::let_var("b", false, Expr::variable("a")),
            Statement::let_var("c", false, Expr::variable("b")),
            Statement::FuncCall(helm_core::ast::CallExpr::new(
                FuncId::built_in("checkPermission"),
                vec![Expr::binary(
                    BinaryOperator::Eq,
                    Expr::variable("c"),
                    Expr::u256(0),
                )],
            )),
        ],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let method = &compiled.script.methods[0];
    let highest_slot = method
        .instrs
        .iter()
        .filter_map(|instr| match instr {
            Instr::LoadLocal(index) | Instr::StoreLocal(index) => Some(*index as usize),
            _ => None,
        })
        .max()
        .unwrap();
    assert_eq!(method.locals_length, highest_slot + 1);
}

#[test]
fn placeholders_outside_loops_are_rejected() {
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![Statement::let_var("x", false, Expr::placeholder())],
    );
    let err = compile_asset_script(&asset_script(vec![main]), &config()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Placeholder is only allowed inside a loop body"
    );
}

#[test]
fn destructuring_arity_must_match() {
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![Statement::VarDef {
            declarations: vec![
                VarDeclaration::named("a", false),
                VarDeclaration::named("b", false),
            ],
            value: Expr::u256(1),
        }],
    );
    let err = compile_asset_script(&asset_script(vec![main]), &config()).unwrap_err();
    assert!(err.to_string().contains("expect 2 values, got 1"));
}

#[test]
fn repeated_array_expression_expands_per_cell() {
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![],
        vec![Statement::let_var(
            "x",
            true,
            Expr::new(ExprKind::RepeatArray {
                element: Box::new(Expr::u256(9)),
                count: 3,
            }),
        )],
    );
    let compiled = compile_asset_script(&asset_script(vec![main]), &config()).unwrap();
    let instrs = &compiled.script.methods[0].instrs;
    assert_eq!(
        instrs[..3],
        [
            Instr::U256Const(helm_types::U256::from(9u64)),
            Instr::U256Const(helm_types::U256::from(9u64)),
            Instr::U256Const(helm_types::U256::from(9u64)),
        ]
    );
}
