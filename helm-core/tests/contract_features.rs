//! Contract-level features: fields, events, enums and constants,
//! inheritance, statement lowering inside stateful units.

use helm_asm::Instr;
use helm_core::ast::{
    Argument, AssetScript, BinaryOperator, ConstantVarDef, Contract, ContractInheritance,
    Declaration, EnumDef, EnumField, EventDef, Expr, ExprKind, FuncDef, Inheritance,
    MultiContract, Statement, TxScript,
};
use helm_core::{compile_asset_script, CompileError, CompilerConfig};
use helm_types::{Ident, Type, TypeId, Val};

fn config() -> CompilerConfig {
    CompilerConfig::default()
}

fn one_contract(contract: Contract) -> MultiContract {
    MultiContract::new(vec![Declaration::Contract(contract)]).unwrap()
}

#[test]
fn mutable_fields_load_and_store_by_field_index() {
    let bump = FuncDef::new(
        "bump",
        true,
        vec![],
        vec![Type::U256],
        vec![
            Statement::assign(
                "total",
                Expr::binary(BinaryOperator::Add, Expr::variable("total"), Expr::u256(1)),
            ),
            Statement::ret(vec![Expr::variable("total")]),
        ],
    );
    let contract = Contract::new(
        false,
        "Counter",
        vec![],
        vec![Argument::mutable("total", Type::U256)],
        vec![bump],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let compiled = one_contract(contract).compile_contract(0, &config()).unwrap();
    assert_eq!(compiled.contract.field_length, 1);
    assert_eq!(
        compiled.contract.methods[0].instrs,
        vec![
            Instr::LoadField(0),
            Instr::U256Const1,
            Instr::U256Add,
            Instr::StoreField(0),
            Instr::LoadField(0),
            Instr::Return,
        ]
    );
}

#[test]
fn immutable_fields_use_the_imm_load() {
    let read = FuncDef::new(
        "read",
        true,
        vec![],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::variable("limit")])],
    );
    let contract = Contract::new(
        false,
        "Capped",
        vec![],
        vec![Argument::new("limit", Type::U256)],
        vec![read],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let compiled = one_contract(contract).compile_contract(0, &config()).unwrap();
    assert_eq!(
        compiled.contract.methods[0].instrs,
        vec![Instr::LoadImmField(0), Instr::Return]
    );
}

#[test]
fn events_emit_their_index_and_fields() {
    let notify = FuncDef::new(
        "notify",
        true,
        vec![],
        vec![],
        vec![Statement::EmitEvent {
            id: TypeId::new("Moved"),
            args: vec![Expr::u256(1), Expr::u256(2)],
        }],
    );
    let contract = Contract::new(
        false,
        "Mover",
        vec![],
        vec![],
        vec![notify],
        vec![
            EventDef::new("Ignored", vec![("a", Type::U256)]),
            EventDef::new("Moved", vec![("from", Type::U256), ("to", Type::U256)]),
        ],
        vec![],
        vec![],
        vec![],
    );
    let compiled = one_contract(contract).compile_contract(0, &config()).unwrap();
    assert_eq!(
        compiled.contract.methods[0].instrs,
        vec![
            Instr::U256Const1, // event index: second declared event
            Instr::U256Const1,
            Instr::U256Const2,
            Instr::Log3,
            Instr::Return,
        ]
    );
}

#[test]
fn array_typed_event_fields_are_rejected() {
    let contract = Contract::new(
        false,
        "Mover",
        vec![],
        vec![],
        vec![FuncDef::new("noop", true, vec![], vec![], vec![])],
        vec![EventDef::new("Bad", vec![("xs", Type::array(Type::U256, 2))])],
        vec![],
        vec![],
        vec![],
    );
    let err = one_contract(contract).compile_contract(0, &config()).unwrap_err();
    assert_eq!(err.to_string(), "Array type not supported for event Bad");
}

#[test]
fn duplicate_events_are_reported_together() {
    let contract = Contract::new(
        false,
        "Mover",
        vec![],
        vec![],
        vec![FuncDef::new("noop", true, vec![], vec![], vec![])],
        vec![
            EventDef::new("E", vec![("a", Type::U256)]),
            EventDef::new("E", vec![("a", Type::U256)]),
        ],
        vec![],
        vec![],
        vec![],
    );
    let err = one_contract(contract).compile_contract(0, &config()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "These events are defined multiple times: E"
    );
}

#[test]
fn constants_and_enum_fields_materialise_as_const_instrs() {
    let act = FuncDef::new(
        "act",
        true,
        vec![],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::binary(
            BinaryOperator::Add,
            Expr::new(ExprKind::EnumField {
                enum_id: TypeId::new("Color"),
                field: Ident::new("Blue"),
            }),
            Expr::variable("LIMIT"),
        )])],
    );
    let contract = Contract::new(
        false,
        "Palette",
        vec![],
        vec![],
        vec![act],
        vec![],
        vec![ConstantVarDef {
            ident: Ident::new("LIMIT"),
            value: Val::u256(5),
        }],
        vec![EnumDef {
            id: TypeId::new("Color"),
            fields: vec![
                EnumField {
                    ident: Ident::new("Red"),
                    value: Val::u256(0),
                },
                EnumField {
                    ident: Ident::new("Blue"),
                    value: Val::u256(1),
                },
            ],
        }],
        vec![],
    );
    let compiled = one_contract(contract).compile_contract(0, &config()).unwrap();
    assert_eq!(
        compiled.contract.methods[0].instrs,
        vec![
            Instr::U256Const1,
            Instr::U256Const5,
            Instr::U256Add,
            Instr::Return,
        ]
    );
}

#[test]
fn for_loops_lower_to_the_while_shape_with_scoped_init() {
    let sum = FuncDef::new(
        "sum",
        true,
        vec![],
        vec![Type::U256],
        vec![
            Statement::let_var("acc", true, Expr::u256(0)),
            Statement::For {
                init: Box::new(Statement::let_var("i", true, Expr::u256(0))),
                condition: Expr::binary(BinaryOperator::Lt, Expr::variable("i"), Expr::u256(3)),
                update: Box::new(Statement::assign(
                    "i",
                    Expr::binary(BinaryOperator::Add, Expr::variable("i"), Expr::u256(1)),
                )),
                body: vec![Statement::assign(
                    "acc",
                    Expr::binary(BinaryOperator::Add, Expr::variable("acc"), Expr::variable("i")),
                )],
            },
            Statement::ret(vec![Expr::variable("acc")]),
        ],
    );
    let compiled = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Sum"),
            template_vars: vec![],
            funcs: vec![sum],
        },
        &config(),
    )
    .unwrap();
    let instrs = &compiled.script.methods[0].instrs;
    assert_eq!(
        instrs,
        &vec![
            // acc = 0
            Instr::U256Const0,
            Instr::StoreLocal(0),
            // i = 0
            Instr::U256Const0,
            Instr::StoreLocal(1),
            // while i < 3
            Instr::LoadLocal(1),
            Instr::U256Const3,
            Instr::U256Lt,
            Instr::IfFalse(9),
            // acc = acc + i
            Instr::LoadLocal(0),
            Instr::LoadLocal(1),
            Instr::U256Add,
            Instr::StoreLocal(0),
            // i = i + 1
            Instr::LoadLocal(1),
            Instr::U256Const1,
            Instr::U256Add,
            Instr::StoreLocal(1),
            Instr::Jump(-13),
            Instr::LoadLocal(0),
            Instr::Return,
        ]
    );
}

#[test]
fn sequential_for_loops_may_reuse_the_init_name() {
    let body = |target: &str| Statement::For {
        init: Box::new(Statement::let_var("i", true, Expr::u256(0))),
        condition: Expr::binary(BinaryOperator::Lt, Expr::variable("i"), Expr::u256(1)),
        update: Box::new(Statement::assign(
            "i",
            Expr::binary(BinaryOperator::Add, Expr::variable("i"), Expr::u256(1)),
        )),
        body: vec![Statement::assign(
            target,
            Expr::binary(BinaryOperator::Add, Expr::variable(target), Expr::variable("i")),
        )],
    };
    let main = FuncDef::new(
        "main",
        true,
        vec![],
        vec![Type::U256],
        vec![
            Statement::let_var("acc", true, Expr::u256(0)),
            body("acc"),
            body("acc"),
            Statement::ret(vec![Expr::variable("acc")]),
        ],
    );
    let compiled = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Sum"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap();
    // acc + two loop counters, each in its own sub-scope and slot.
    assert_eq!(compiled.script.methods[0].locals_length, 3);
}

#[test]
fn inherited_contract_methods_operate_on_forwarded_fields() {
    let base = Contract::new(
        true,
        "Base",
        vec![],
        vec![Argument::mutable("value", Type::U256)],
        vec![FuncDef::new(
            "get",
            true,
            vec![],
            vec![Type::U256],
            vec![Statement::ret(vec![Expr::variable("value")])],
        )],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let mut child = Contract::new(
        false,
        "Child",
        vec![],
        vec![Argument::mutable("value", Type::U256)],
        vec![FuncDef::new(
            "set",
            true,
            vec![Argument::new("v", Type::U256)],
            vec![],
            vec![Statement::assign("value", Expr::variable("v"))],
        )],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    child.inheritances = vec![Inheritance::Contract(ContractInheritance {
        parent: TypeId::new("Base"),
        idents: vec![Ident::new("value")],
    })];

    let multi = MultiContract::new(vec![
        Declaration::Contract(base),
        Declaration::Contract(child),
    ])
    .unwrap();
    let compiled = multi.compile_contract(1, &config()).unwrap();
    // Parent method first, then the child's own.
    assert_eq!(compiled.contract.methods.len(), 2);
    assert_eq!(
        compiled.contract.methods[0].instrs,
        vec![Instr::LoadField(0), Instr::Return]
    );
    assert_eq!(
        compiled.contract.methods[1].instrs,
        vec![Instr::LoadLocal(0), Instr::StoreField(0), Instr::Return]
    );
}

#[test]
fn abstract_contracts_cannot_be_compiled_directly() {
    let base = Contract::new(
        true,
        "Base",
        vec![],
        vec![],
        vec![FuncDef {
            body: None,
            ..FuncDef::new("f", true, vec![], vec![], vec![])
        }],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let err = one_contract(base).compile_contract(0, &config()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Abstract contract Base can not be compiled into bytecode"
    );
}

#[test]
fn contract_conversions_are_stateless_script_errors() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("addr", Type::ByteVec)],
        vec![],
        vec![Statement::let_var(
            "c",
            false,
            Expr::new(ExprKind::ContractConv {
                contract_type: TypeId::new("Counter"),
                address: Box::new(Expr::variable("addr")),
            }),
        )],
    );
    let err = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Foo"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::ExternalCallInStatelessContext
    );
}

#[test]
fn template_variables_are_immutable() {
    let script = TxScript {
        id: TypeId::new("Run"),
        template_vars: vec![Argument::new("amount", Type::U256)],
        funcs: vec![FuncDef::new(
            "main",
            true,
            vec![],
            vec![],
            vec![Statement::assign("amount", Expr::u256(3))],
        )],
    };
    let multi = MultiContract::new(vec![Declaration::TxScript(script)]).unwrap();
    let err = multi.compile_script(0, &config()).unwrap_err();
    assert_eq!(err.to_string(), "Assign to immutable variable: amount");
}

#[test]
fn unused_fields_warn_by_name() {
    let contract = Contract::new(
        false,
        "Sleepy",
        vec![],
        vec![
            Argument::new("seen", Type::U256),
            Argument::new("ignored", Type::U256),
        ],
        vec![FuncDef::new(
            "peek",
            true,
            vec![],
            vec![Type::U256],
            vec![Statement::ret(vec![Expr::variable("seen")])],
        )],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let compiled = one_contract(contract).compile_contract(0, &config()).unwrap();
    assert_eq!(
        compiled.warnings,
        vec!["Found unused fields in Sleepy: ignored".to_string()]
    );
}

#[test]
fn array_arguments_count_flattened_cells() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("xs", Type::array(Type::U256, 3))],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::index(
            Expr::variable("xs"),
            vec![Expr::u256(2)],
        )])],
    );
    let compiled = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Foo"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap();
    let method = &compiled.script.methods[0];
    assert_eq!(method.args_length, 3);
    assert_eq!(method.locals_length, 3);
    assert_eq!(method.instrs, vec![Instr::LoadLocal(2), Instr::Return]);
}

#[test]
fn out_of_bounds_constant_indexes_are_rejected() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("xs", Type::array(Type::U256, 3))],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::index(
            Expr::variable("xs"),
            vec![Expr::u256(3)],
        )])],
    );
    let err = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Foo"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid array index 3");
}

#[test]
fn nested_arrays_flatten_row_major() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("m", Type::array(Type::array(Type::U256, 2), 2))],
        vec![Type::U256],
        vec![Statement::ret(vec![Expr::index(
            Expr::variable("m"),
            vec![Expr::u256(1), Expr::u256(0)],
        )])],
    );
    let compiled = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Foo"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap();
    // m[1][0] is the third flattened cell.
    assert_eq!(
        compiled.script.methods[0].instrs,
        vec![Instr::LoadLocal(2), Instr::Return]
    );
}

#[test]
fn sub_array_access_loads_every_cell_in_order() {
    let main = FuncDef::new(
        "main",
        true,
        vec![Argument::new("m", Type::array(Type::array(Type::U256, 2), 2))],
        vec![Type::array(Type::U256, 2)],
        vec![Statement::ret(vec![Expr::index(
            Expr::variable("m"),
            vec![Expr::u256(1)],
        )])],
    );
    let compiled = compile_asset_script(
        &AssetScript {
            id: TypeId::new("Foo"),
            template_vars: vec![],
            funcs: vec![main],
        },
        &config(),
    )
    .unwrap();
    let method = &compiled.script.methods[0];
    assert_eq!(method.return_length, 2);
    assert_eq!(
        method.instrs,
        vec![Instr::LoadLocal(2), Instr::LoadLocal(3), Instr::Return]
    );
}
