use crate::ast::{CallExpr, ContractCallExpr, Expr, ExprKind, UnaryOperator};
use crate::codegen::{fold_offset, gen_array_loads, gen_load_code, get_or_create_array_ref};
use crate::semantic_analysis::array_ref::{ArrayOffset, ArrayRef};
use crate::semantic_analysis::built_in::get_built_in;
use crate::semantic_analysis::CompilerState;
use helm_asm::{Instr, ToConstInstr};
use helm_error::{CompileError, CompileResult};
use helm_types::{flattened_types_length, Ident, Type, Val};

/// Largest forward or backward skip a branch instruction may take.
pub(crate) const MAX_BRANCH_OFFSET: usize = u8::MAX as usize;

pub(crate) fn gen_expression(state: &mut CompilerState, expr: &Expr) -> CompileResult<Vec<Instr>> {
    match &expr.kind {
        ExprKind::Const(value) => Ok(vec![value.to_const_instr()]),
        ExprKind::CreateArray(elements) => {
            let mut out = Vec::new();
            for element in elements {
                out.extend(gen_expression(state, element)?);
            }
            Ok(out)
        }
        // The element emission is repeated per cell group; side effects in
        // the element execute once per iteration.
        ExprKind::RepeatArray { element, count } => {
            let element_code = gen_expression(state, element)?;
            let mut out = Vec::with_capacity(element_code.len() * count);
            for _ in 0..*count {
                out.extend(element_code.iter().cloned());
            }
            Ok(out)
        }
        ExprKind::ArrayElement { array, indexes } => {
            gen_array_element(state, array, indexes)
        }
        ExprKind::Variable(ident) => gen_load_code(state, ident),
        ExprKind::EnumField { enum_id, field } => {
            let key = Ident::new(format!("{}.{}", enum_id, field));
            gen_load_code(state, &key)
        }
        ExprKind::UnaryOp { op, expr } => {
            let mut out = gen_expression(state, expr)?;
            match op {
                UnaryOperator::Not => out.push(Instr::Not),
            }
            Ok(out)
        }
        ExprKind::BinaryOp { op, left, right } => {
            let operand_type = left.single_type(state)?;
            let mut out = gen_expression(state, left)?;
            out.extend(gen_expression(state, right)?);
            let instr = op
                .to_instr(&operand_type)
                .ok_or(CompileError::Internal("no opcode for checked operator"))?;
            out.push(instr);
            Ok(out)
        }
        // The handle is the byte-vector address at runtime; the conversion
        // is purely type-level.
        ExprKind::ContractConv { address, .. } => gen_expression(state, address),
        ExprKind::Call(call) => gen_call(state, call),
        ExprKind::ContractCall(call) => gen_contract_call(state, call),
        ExprKind::Paren(inner) => gen_expression(state, inner),
        ExprKind::IfElse {
            condition,
            if_expr,
            else_expr,
        } => {
            let cond = gen_condition(state, condition)?;
            let if_code = gen_expression(state, if_expr)?;
            let else_code = gen_expression(state, else_expr)?;
            assemble_branches(cond, if_code, else_code)
        }
        ExprKind::Placeholder => Err(CompileError::PlaceholderOutsideLoop),
    }
}

fn gen_array_element(
    state: &mut CompilerState,
    array: &Expr,
    indexes: &[Expr],
) -> CompileResult<Vec<Instr>> {
    let (mut out, base) = get_or_create_array_ref(state, array)?;
    let (offset, tpe) = fold_offset(state, &base, indexes)?;
    if tpe.is_array() {
        let sub = ArrayRef {
            is_local: base.is_local,
            is_mutable: base.is_mutable,
            tpe,
            offset,
        };
        out.extend(gen_array_loads(state, &sub)?);
    } else {
        match offset {
            ArrayOffset::Constant(cell) => out.push(super::static_load(&base, cell)?),
            ArrayOffset::Runtime(code) => {
                out.extend(code);
                out.push(super::by_index_load(&base));
            }
        }
    }
    Ok(out)
}

pub(crate) fn gen_approve_assets(
    state: &mut CompilerState,
    assets: &[crate::ast::ApproveAsset],
) -> CompileResult<Vec<Instr>> {
    let mut out = Vec::new();
    for asset in assets {
        if let Some(amount) = &asset.alph_amount {
            out.extend(gen_expression(state, &asset.address)?);
            out.extend(gen_expression(state, amount)?);
            out.push(Instr::ApproveAlph);
        }
        for (token_id, amount) in &asset.tokens {
            out.extend(gen_expression(state, &asset.address)?);
            out.extend(gen_expression(state, token_id)?);
            out.extend(gen_expression(state, amount)?);
            out.push(Instr::ApproveToken);
        }
    }
    Ok(out)
}

/// Approve-asset code, argument code, then the call sequence from the
/// function's descriptor (variadic built-ins also push their argument
/// count).
pub(crate) fn gen_call(state: &mut CompilerState, call: &CallExpr) -> CompileResult<Vec<Instr>> {
    let mut out = gen_approve_assets(state, &call.approve_assets)?;
    for arg in &call.args {
        out.extend(gen_expression(state, arg)?);
    }
    if call.id.is_built_in {
        let built_in = get_built_in(&call.id)?;
        if built_in.is_variadic {
            out.push(Val::u256(call.args.len() as u64).to_const_instr());
        }
        out.extend(built_in.instrs.iter().cloned());
    } else {
        let info = state.get_func(&call.id)?;
        out.push(Instr::CallLocal(info.index));
    }
    Ok(out)
}

/// Approve-asset code, argument code, the flattened argument and return
/// lengths, the contract handle, then the external call.
pub(crate) fn gen_contract_call(
    state: &mut CompilerState,
    call: &ContractCallExpr,
) -> CompileResult<Vec<Instr>> {
    let mut out = gen_approve_assets(state, &call.approve_assets)?;
    for arg in &call.args {
        out.extend(gen_expression(state, arg)?);
    }
    let type_id = match call.obj.single_type(state)? {
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
    let (index, args_len, return_len) = (
        info.index,
        flattened_types_length(&info.arg_types),
        flattened_types_length(&info.return_types),
    );
    out.push(Val::u256(args_len as u64).to_const_instr());
    out.push(Val::u256(return_len as u64).to_const_instr());
    out.extend(gen_expression(state, &call.obj)?);
    out.push(Instr::CallExternal(index));
    Ok(out)
}

/// The flattened return length of a call, used to pop ignored results in
/// statement position.
pub(crate) fn call_return_length(state: &mut CompilerState, call: &CallExpr) -> CompileResult<usize> {
    let return_types = if call.id.is_built_in {
        get_built_in(&call.id)?.return_types.clone()
    } else {
        state.get_func(&call.id)?.return_types
    };
    Ok(flattened_types_length(&return_types))
}

pub(crate) fn contract_call_return_length(
    state: &mut CompilerState,
    call: &ContractCallExpr,
) -> CompileResult<usize> {
    let type_id = match call.obj.single_type(state)? {
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
    Ok(flattened_types_length(&info.return_types))
}

/// Condition emission with the `IfFalse`/`IfTrue` peephole: a top-level
/// negation is folded into the branch instruction instead of a `Not`.
pub(crate) fn gen_condition(
    state: &mut CompilerState,
    condition: &Expr,
) -> CompileResult<(Vec<Instr>, bool)> {
    let mut current = condition;
    loop {
        match &current.kind {
            ExprKind::Paren(inner) => current = inner,
            ExprKind::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => return Ok((gen_expression(state, expr)?, true)),
            _ => return Ok((gen_expression(state, current)?, false)),
        }
    }
}

fn forward_offset(len: usize) -> CompileResult<i16> {
    if len > MAX_BRANCH_OFFSET {
        return Err(CompileError::TooManyIfElseInstrs);
    }
    Ok(len as i16)
}

/// Shared branch lowering for if-else statements and expressions. Offsets
/// are computed back-to-front: the else code length determines the jump at
/// the end of the then-branch, whose length in turn positions the
/// conditional skip.
pub(crate) fn assemble_branches(
    condition: (Vec<Instr>, bool),
    if_code: Vec<Instr>,
    else_code: Vec<Instr>,
) -> CompileResult<Vec<Instr>> {
    let (mut out, inverted) = condition;
    let branch = |offset: i16| {
        if inverted {
            Instr::IfTrue(offset)
        } else {
            Instr::IfFalse(offset)
        }
    };
    if else_code.is_empty() {
        out.push(branch(forward_offset(if_code.len())?));
        out.extend(if_code);
    } else {
        out.push(branch(forward_offset(if_code.len() + 1)?));
        out.extend(if_code);
        out.push(Instr::Jump(forward_offset(else_code.len())?));
        out.extend(else_code);
    }
    Ok(out)
}
