//! The semantic pass: declaration registration, type checking, scope and
//! mutability rules, and the call-graph recording the permission analysis
//! consumes. Expressions memoise their computed types on first query, so the
//! later generation pass never re-infers.

pub(crate) mod array_ref;
pub(crate) mod built_in;
mod compiler_state;
pub(crate) mod permission;

pub use compiler_state::{CompilerState, ContractRegistry};
pub(crate) use compiler_state::VarInfo;

use crate::ast::expression::check_array_indexes;
use crate::ast::{
    ApproveAsset, AssetScript, AssignmentTarget, CallExpr, Contract, ContractCallExpr, Expr,
    FuncDef, Statement, TxScript, VarDeclaration,
};
use built_in::{get_built_in, CHECK_PERMISSION, PANIC};
use helm_error::{CompileError, CompileResult};
use helm_types::{format_types, Type};

/// Sequence equality between produced and expected argument types.
pub(crate) fn check_arguments(got: &[Type], expect: &[Type]) -> CompileResult<()> {
    if got != expect {
        return Err(CompileError::InvalidArgsType {
            got: format_types(got),
            expect: format_types(expect),
        });
    }
    Ok(())
}

fn check_single_expected(state: &mut CompilerState, expr: &Expr, expect: Type) -> CompileResult<()> {
    let tpe = expr.single_type(state)?;
    check_arguments(&[tpe], &[expect])
}

pub(crate) fn check_approve_assets(
    state: &mut CompilerState,
    assets: &[ApproveAsset],
) -> CompileResult<()> {
    for asset in assets {
        check_single_expected(state, &asset.address, Type::Address)?;
        if let Some(amount) = &asset.alph_amount {
            check_single_expected(state, amount, Type::U256)?;
        }
        for (token_id, amount) in &asset.tokens {
            check_single_expected(state, token_id, Type::ByteVec)?;
            check_single_expected(state, amount, Type::U256)?;
        }
    }
    Ok(())
}

fn arg_types_of(state: &mut CompilerState, args: &[Expr]) -> CompileResult<Vec<Type>> {
    let mut types = Vec::new();
    for arg in args {
        types.extend(arg.get_type(state)?);
    }
    Ok(types)
}

/// Types and records a call to a built-in or a function of the current unit.
pub(crate) fn infer_call_type(
    state: &mut CompilerState,
    call: &CallExpr,
) -> CompileResult<Vec<Type>> {
    check_approve_assets(state, &call.approve_assets)?;
    let arg_types = arg_types_of(state, &call.args)?;
    if call.id.is_built_in {
        let built_in = get_built_in(&call.id)?;
        check_arguments(&arg_types, &built_in.arg_types)?;
        if call.id.name == CHECK_PERMISSION {
            state.mark_permission_check()?;
        }
        Ok(built_in.return_types.clone())
    } else {
        let info = state.get_func(&call.id)?;
        check_arguments(&arg_types, &info.arg_types)?;
        state.add_internal_call(call.id.clone())?;
        Ok(info.return_types)
    }
}

/// Types and records a call through a contract handle. Only permitted in
/// stateful units.
pub(crate) fn infer_contract_call_type(
    state: &mut CompilerState,
    call: &ContractCallExpr,
) -> CompileResult<Vec<Type>> {
    if !state.kind().is_stateful() {
        return Err(CompileError::ExternalCallInStatelessContext);
    }
    check_approve_assets(state, &call.approve_assets)?;
    let arg_types = arg_types_of(state, &call.args)?;
    let obj_type = call.obj.single_type(state)?;
    let type_id = match obj_type {
        Type::Contract(type_id) => type_id,
        _ => {
            return Err(CompileError::ExpectContract {
                func: call.func.name.clone(),
                obj: call.obj.brief(),
            })
        }
    };
    let meta = state.registry().get(&type_id)?;
    let info = meta
        .funcs
        .get(&call.func.name)
        .ok_or_else(|| CompileError::ExternalFunctionNotFound {
            type_id: type_id.to_string(),
            func: call.func.name.clone(),
        })?;
    if !info.is_public {
        return Err(CompileError::CallPrivateExternal {
            type_id: type_id.to_string(),
            func: call.func.name.clone(),
        });
    }
    check_arguments(&arg_types, &info.arg_types)?;
    let return_types = info.return_types.clone();
    state.add_external_call(type_id, call.func.clone())?;
    Ok(return_types)
}

fn check_condition(state: &mut CompilerState, condition: &Expr) -> CompileResult<()> {
    let types = condition.get_type(state)?;
    if types != [Type::Bool] {
        return Err(CompileError::InvalidConditionType {
            found: format_types(&types),
        });
    }
    Ok(())
}

fn assignment_target_type(
    state: &mut CompilerState,
    target: &AssignmentTarget,
) -> CompileResult<Type> {
    match target {
        AssignmentTarget::Var(ident) => Ok(state.get_variable(ident)?.tpe().clone()),
        AssignmentTarget::ArrayElement { ident, indexes } => {
            let tpe = state.get_variable(ident)?.tpe().clone();
            check_array_indexes(state, &tpe, indexes)?;
            let elem = tpe
                .element_type(indexes.len())
                .ok_or_else(|| CompileError::ExpectArrayType {
                    found: tpe.to_string(),
                })?;
            Ok(elem.clone())
        }
    }
}

fn check_statement(
    state: &mut CompilerState,
    func: &FuncDef,
    statement: &Statement,
) -> CompileResult<()> {
    match statement {
        Statement::VarDef {
            declarations,
            value,
        } => {
            let types = value.get_type(state)?;
            if types.len() != declarations.len() {
                return Err(CompileError::InvalidDestructuring {
                    expected: declarations.len(),
                    got: types.len(),
                });
            }
            for (declaration, tpe) in declarations.iter().zip(types.iter()) {
                match declaration {
                    VarDeclaration::Named {
                        ident,
                        is_mutable,
                        is_unused,
                    } => {
                        state.add_local_variable(ident, tpe, *is_mutable, *is_unused, false)?;
                    }
                    VarDeclaration::Anonymous => {}
                }
            }
            Ok(())
        }
        Statement::Assign { targets, value } => {
            let rhs_types = value.get_type(state)?;
            let mut target_types = Vec::with_capacity(targets.len());
            for target in targets {
                target_types.push(assignment_target_type(state, target)?);
            }
            if rhs_types != target_types {
                return Err(CompileError::AssignmentTypeMismatch {
                    rhs: format_types(&rhs_types),
                    lhs: format_types(&target_types),
                });
            }
            // Stores are emitted in reverse target order, so mutability
            // violations surface in the same order.
            for target in targets.iter().rev() {
                let info = state.get_variable(target.ident())?;
                if !info.is_mutable() {
                    return Err(CompileError::AssignToImmutable {
                        name: target.ident().to_string(),
                    });
                }
            }
            Ok(())
        }
        Statement::FuncCall(call) => {
            infer_call_type(state, call)?;
            Ok(())
        }
        Statement::ContractCall(call) => {
            infer_contract_call_type(state, call)?;
            Ok(())
        }
        Statement::IfElse {
            condition,
            if_branch,
            else_branch,
        } => {
            check_condition(state, condition)?;
            check_statements(state, func, if_branch)?;
            check_statements(state, func, else_branch)
        }
        Statement::While { condition, body } => {
            check_condition(state, condition)?;
            check_statements(state, func, body)
        }
        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            state.enter_for_scope()?;
            check_statement(state, func, init)?;
            check_condition(state, condition)?;
            check_statement(state, func, update)?;
            check_statements(state, func, body)?;
            state.exit_for_scope()
        }
        Statement::Loop(unrolled) => {
            let limit = state.config.loop_unrolling_limit;
            for statement in unrolled.expanded(limit)? {
                check_statement(state, func, statement)?;
            }
            Ok(())
        }
        Statement::Return(exprs) => {
            let mut types = Vec::new();
            for expr in exprs {
                types.extend(expr.get_type(state)?);
            }
            if types != func.return_types {
                return Err(CompileError::InvalidReturnTypes {
                    func: func.id.to_string(),
                    got: format_types(&types),
                    expect: format_types(&func.return_types),
                });
            }
            Ok(())
        }
        Statement::EmitEvent { id, args } => {
            let field_types = state.get_event(id)?.field_types.clone();
            let mut arg_types = Vec::with_capacity(args.len());
            for arg in args {
                let tpe = arg.single_type(state)?;
                if tpe.is_array() {
                    return Err(CompileError::EventArrayField {
                        name: id.to_string(),
                    });
                }
                arg_types.push(tpe);
            }
            check_arguments(&arg_types, &field_types)
        }
    }
}

fn check_statements(
    state: &mut CompilerState,
    func: &FuncDef,
    statements: &[Statement],
) -> CompileResult<()> {
    for statement in statements {
        check_statement(state, func, statement)?;
    }
    Ok(())
}

/// Whether every control path through `statement` ends in `return` or a call
/// to the `panic!` built-in.
fn is_terminal(statement: &Statement) -> bool {
    match statement {
        Statement::Return(_) => true,
        Statement::FuncCall(call) => call.id.is_built_in && call.id.name == PANIC,
        Statement::IfElse {
            if_branch,
            else_branch,
            ..
        } => {
            if_branch.last().map_or(false, is_terminal)
                && else_branch.last().map_or(false, is_terminal)
        }
        _ => false,
    }
}

fn check_return_paths(func: &FuncDef, body: &[Statement]) -> CompileResult<()> {
    if func.return_types.is_empty() {
        return Ok(());
    }
    if !body.last().map_or(false, is_terminal) {
        return Err(CompileError::ExpectReturnStatement {
            func: func.id.to_string(),
        });
    }
    Ok(())
}

fn check_func_body(
    state: &mut CompilerState,
    func: &FuncDef,
    body: &[Statement],
) -> CompileResult<()> {
    state.set_func_scope(&func.id);
    for arg in &func.args {
        state.add_local_variable(&arg.ident, &arg.tpe, arg.is_mutable, arg.is_unused, false)?;
    }
    check_statements(state, func, body)?;
    check_return_paths(func, body)
}

fn check_funcs(state: &mut CompilerState, funcs: &[FuncDef]) -> CompileResult<()> {
    for func in funcs {
        if let Some(body) = &func.body {
            check_func_body(state, func, body)?;
        }
    }
    Ok(())
}

fn reject_abstract_funcs(state: &CompilerState, funcs: &[FuncDef]) -> CompileResult<()> {
    let unimplemented: Vec<&str> = funcs
        .iter()
        .filter(|func| func.is_abstract())
        .map(|func| func.id.name.as_str())
        .collect();
    if !unimplemented.is_empty() {
        return Err(CompileError::UnimplementedMethods {
            name: state.type_id().to_string(),
            methods: unimplemented.join(", "),
        });
    }
    Ok(())
}

/// Registers and checks an (inheritance-expanded) contract. Abstract
/// contracts are checked too so their call graphs feed the permission
/// analysis; their abstract functions are simply skipped.
pub(crate) fn check_contract(state: &mut CompilerState, contract: &Contract) -> CompileResult<()> {
    for var in &contract.template_vars {
        state.add_template_variable(&var.ident, &var.tpe)?;
    }
    for field in &contract.fields {
        state.add_field_variable(&field.ident, &field.tpe, field.is_mutable, field.is_unused)?;
    }
    for constant in &contract.constants {
        state.add_constant_variable(&constant.ident, &constant.value)?;
    }
    for enum_def in &contract.enums {
        state.add_enum_def(enum_def)?;
    }
    state.add_event_defs(&contract.events)?;
    state.add_func_defs(&contract.funcs)?;
    if !contract.is_abstract {
        reject_abstract_funcs(state, &contract.funcs)?;
    }
    check_funcs(state, &contract.funcs)?;
    state.check_unused_local_vars();
    state.check_unused_fields();
    Ok(())
}

pub(crate) fn check_tx_script(state: &mut CompilerState, script: &TxScript) -> CompileResult<()> {
    for var in &script.template_vars {
        state.add_template_variable(&var.ident, &var.tpe)?;
    }
    state.add_func_defs(&script.funcs)?;
    reject_abstract_funcs(state, &script.funcs)?;
    check_funcs(state, &script.funcs)?;
    state.check_unused_local_vars();
    Ok(())
}

pub(crate) fn check_asset_script(
    state: &mut CompilerState,
    script: &AssetScript,
) -> CompileResult<()> {
    for var in &script.template_vars {
        state.add_template_variable(&var.ident, &var.tpe)?;
    }
    state.add_func_defs(&script.funcs)?;
    reject_abstract_funcs(state, &script.funcs)?;
    check_funcs(state, &script.funcs)?;
    state.check_unused_local_vars();
    Ok(())
}
