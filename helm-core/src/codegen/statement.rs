use crate::ast::{AssignmentTarget, Statement, VarDeclaration};
use crate::codegen::expression::{
    assemble_branches, call_return_length, contract_call_return_length, gen_call, gen_condition,
    gen_contract_call, gen_expression, MAX_BRANCH_OFFSET,
};
use crate::codegen::{by_index_store, fold_offset, gen_array_stores, gen_store_code, static_store};
use crate::semantic_analysis::array_ref::{ArrayOffset, ArrayRef};
use crate::semantic_analysis::{CompilerState, VarInfo};
use helm_asm::{Instr, ToConstInstr};
use helm_error::{CompileError, CompileResult};
use helm_types::Val;

pub(crate) fn gen_statement(
    state: &mut CompilerState,
    statement: &Statement,
) -> CompileResult<Vec<Instr>> {
    match statement {
        Statement::VarDef {
            declarations,
            value,
        } => {
            let mut out = gen_expression(state, value)?;
            let types = value.get_type(state)?;
            let mut blocks = Vec::with_capacity(declarations.len());
            for (declaration, tpe) in declarations.iter().zip(types.iter()) {
                match declaration {
                    VarDeclaration::Named { ident, .. } => {
                        blocks.push(gen_store_code(state, ident)?);
                    }
                    VarDeclaration::Anonymous => {
                        blocks.push((Vec::new(), vec![vec![Instr::Pop]; tpe.flattened_length()]));
                    }
                }
            }
            emit_store_blocks(&mut out, blocks);
            Ok(out)
        }
        Statement::Assign { targets, value } => {
            let mut out = gen_expression(state, value)?;
            let mut blocks = Vec::with_capacity(targets.len());
            for target in targets {
                blocks.push(gen_target_store(state, target)?);
            }
            emit_store_blocks(&mut out, blocks);
            Ok(out)
        }
        Statement::FuncCall(call) => {
            let mut out = gen_call(state, call)?;
            let pops = call_return_length(state, call)?;
            out.extend(std::iter::repeat(Instr::Pop).take(pops));
            Ok(out)
        }
        Statement::ContractCall(call) => {
            let mut out = gen_contract_call(state, call)?;
            let pops = contract_call_return_length(state, call)?;
            out.extend(std::iter::repeat(Instr::Pop).take(pops));
            Ok(out)
        }
        Statement::IfElse {
            condition,
            if_branch,
            else_branch,
        } => {
            let cond = gen_condition(state, condition)?;
            let if_code = gen_statements(state, if_branch)?;
            let else_code = gen_statements(state, else_branch)?;
            assemble_branches(cond, if_code, else_code)
        }
        Statement::While { condition, body } => {
            let cond = gen_condition(state, condition)?;
            let body_code = gen_statements(state, body)?;
            assemble_loop(cond, body_code)
        }
        // Sub-expressions are generated in the order the check pass visited
        // them (init, condition, update, body) so generated scope labels and
        // temporaries line up across the passes.
        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            state.enter_for_scope()?;
            let out_init = gen_statement(state, init)?;
            let cond = gen_condition(state, condition)?;
            let update_code = gen_statement(state, update)?;
            let mut body_code = gen_statements(state, body)?;
            state.exit_for_scope()?;
            body_code.extend(update_code);
            let mut out = out_init;
            out.extend(assemble_loop(cond, body_code)?);
            Ok(out)
        }
        Statement::Loop(unrolled) => {
            let limit = state.config.loop_unrolling_limit;
            let mut out = Vec::new();
            for statement in unrolled.expanded(limit)? {
                out.extend(gen_statement(state, statement)?);
            }
            Ok(out)
        }
        Statement::Return(exprs) => {
            let mut out = Vec::new();
            for expr in exprs {
                out.extend(gen_expression(state, expr)?);
            }
            out.push(Instr::Return);
            Ok(out)
        }
        Statement::EmitEvent { id, args } => {
            let index = state.get_event(id)?.index;
            let mut out = vec![Val::u256(index as u64).to_const_instr()];
            for arg in args {
                out.extend(gen_expression(state, arg)?);
            }
            let opcode = Instr::log(1 + args.len())
                .ok_or(CompileError::Internal("event arity survived checking"))?;
            out.push(opcode);
            Ok(out)
        }
    }
}

pub(crate) fn gen_statements(
    state: &mut CompilerState,
    statements: &[Statement],
) -> CompileResult<Vec<Instr>> {
    let mut out = Vec::new();
    for statement in statements {
        out.extend(gen_statement(state, statement)?);
    }
    Ok(out)
}

/// Emits the store blocks of a destructuring in reverse target order: the
/// stack top holds the last target's cells. Within a block, the prelude
/// (runtime offset computation) runs immediately before its reversed cell
/// stores so the scratch offset local is still live.
fn emit_store_blocks(out: &mut Vec<Instr>, blocks: Vec<(Vec<Instr>, Vec<Vec<Instr>>)>) {
    for (prelude, cells) in blocks.into_iter().rev() {
        out.extend(prelude);
        for cell in cells.into_iter().rev() {
            out.extend(cell);
        }
    }
}

fn gen_target_store(
    state: &mut CompilerState,
    target: &AssignmentTarget,
) -> CompileResult<(Vec<Instr>, Vec<Vec<Instr>>)> {
    match target {
        AssignmentTarget::Var(ident) => gen_store_code(state, ident),
        AssignmentTarget::ArrayElement { ident, indexes } => {
            let array = match state.get_variable(ident)? {
                VarInfo::Array { ref_, .. } => ref_,
                other => {
                    return Err(CompileError::ExpectArrayType {
                        found: other.tpe().to_string(),
                    })
                }
            };
            let (offset, tpe) = fold_offset(state, &array, indexes)?;
            if tpe.is_array() {
                let sub = ArrayRef {
                    is_local: array.is_local,
                    is_mutable: array.is_mutable,
                    tpe,
                    offset,
                };
                gen_array_stores(state, &sub)
            } else {
                match offset {
                    ArrayOffset::Constant(cell) => {
                        Ok((Vec::new(), vec![vec![static_store(&array, cell)?]]))
                    }
                    ArrayOffset::Runtime(mut code) => {
                        code.push(by_index_store(&array));
                        Ok((Vec::new(), vec![code]))
                    }
                }
            }
        }
    }
}

/// `condition; skip-over-body; body; jump-back`. Both the forward skip and
/// the backward jump must fit a single signed byte.
fn assemble_loop(condition: (Vec<Instr>, bool), body_code: Vec<Instr>) -> CompileResult<Vec<Instr>> {
    let (cond_code, inverted) = condition;
    let forward = body_code.len() + 1;
    let backward = cond_code.len() + body_code.len() + 2;
    if forward > MAX_BRANCH_OFFSET || backward > MAX_BRANCH_OFFSET {
        return Err(CompileError::TooManyWhileInstrs);
    }
    let mut out = cond_code;
    out.push(if inverted {
        Instr::IfTrue(forward as i16)
    } else {
        Instr::IfFalse(forward as i16)
    });
    out.extend(body_code);
    out.push(Instr::Jump(-(backward as i16)));
    Ok(out)
}
